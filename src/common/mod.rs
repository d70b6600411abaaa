// Collaborators shared by the ledger and the offer engine
pub mod clock;
pub mod events;
pub mod registry;

pub use clock::*;
pub use events::*;
pub use registry::*;
