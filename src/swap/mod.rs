// Peer-to-peer offer book and its settlement
pub mod engine;
pub mod offer;
pub mod service;

pub use engine::SwapEngine;
pub use offer::{Offer, OfferState, OfferTerms, TransferInstructions, TransferLeg};
pub use service::SwapService;
