// Deterministic fixtures shared by unit and integration tests
use ark_std::rand::rngs::StdRng;
use ark_std::rand::SeedableRng;

/// Seeded RNG usable wherever key generation needs `CryptoRng`
pub fn test_rng() -> StdRng {
    StdRng::seed_from_u64(7)
}
