// Additively homomorphic EC-ElGamal over BabyJubJub
use std::collections::HashMap;

use ark_ff::UniformRand;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::keys::{BaseField, Point, ScalarField, SecretKey};
use crate::primitives::Amount;

/// ElGamal ciphertext `(r*G, m*G + r*pk)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Egct {
    pub c1: Point,
    pub c2: Point,
}

impl Egct {
    /// Encryption of zero with zero randomness. Also the "no record" sentinel.
    pub fn zero() -> Self {
        Self {
            c1: Point::identity(),
            c2: Point::identity(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.c1.is_identity() && self.c2.is_identity()
    }

    /// Both components on the curve and in the prime-order subgroup
    pub fn is_well_formed(&self) -> bool {
        self.c1.is_valid() && self.c2.is_valid()
    }

    /// Homomorphic addition. Both operands must be under the same key.
    pub fn add(&self, other: &Egct) -> Egct {
        Egct {
            c1: self.c1.add(&other.c1),
            c2: self.c2.add(&other.c2),
        }
    }

    /// Homomorphic subtraction. Both operands must be under the same key.
    pub fn sub(&self, other: &Egct) -> Egct {
        Egct {
            c1: self.c1.sub(&other.c1),
            c2: self.c2.sub(&other.c2),
        }
    }

    pub fn to_fields(&self) -> [BaseField; 4] {
        [self.c1.x, self.c1.y, self.c2.x, self.c2.y]
    }

    pub fn from_fields(fields: &[BaseField]) -> Option<Self> {
        if fields.len() != 4 {
            return None;
        }
        Some(Egct {
            c1: Point::new(fields[0], fields[1]),
            c2: Point::new(fields[2], fields[3]),
        })
    }

    /// Canonical byte encoding, used when a ciphertext is stored as a commitment
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_fields()
            .iter()
            .flat_map(super::keys::field_serde::to_bytes)
            .collect()
    }

    /// Inverse of `to_bytes`. Does not check curve membership.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 128 {
            return None;
        }
        let mut fields = Vec::with_capacity(4);
        for chunk in bytes.chunks_exact(32) {
            let mut buf = [0u8; 32];
            buf.copy_from_slice(chunk);
            fields.push(super::keys::field_serde::from_bytes(&buf)?);
        }
        Self::from_fields(&fields)
    }
}

/// Fresh encryption randomness, uniform below the subgroup order
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> ScalarField {
    ScalarField::rand(rng)
}

/// `Enc_pk(m; r) = (r*G, m*G + r*pk)`.
///
/// Reusing `r` under the same key links the plaintexts; callers must draw
/// fresh randomness for every encryption.
pub fn encrypt(pk: &Point, amount: Amount, r: &ScalarField) -> Egct {
    let c1 = Point::generator().mul(r);
    let c2 = Point::from_amount(amount).add(&pk.mul(r));
    Egct { c1, c2 }
}

/// Returns `m*G`. Recovering `m` needs a bounded discrete-log search.
pub fn decrypt(sk: &SecretKey, ct: &Egct) -> Point {
    ct.c2.sub(&ct.c1.mul(&sk.0))
}

/// Decrypt and search `[0, bound)` for the plaintext
pub fn decrypt_amount(sk: &SecretKey, ct: &Egct, bound: u64) -> Option<u64> {
    discrete_log(&decrypt(sk, ct), bound)
}

/// Baby-step giant-step search for `m` with `m*G == target`, `m < bound`
pub fn discrete_log(target: &Point, bound: u64) -> Option<u64> {
    if bound == 0 {
        return None;
    }
    let step = (bound as f64).sqrt().ceil() as u64;
    let step = step.max(1);

    let generator = Point::generator();
    let mut baby_steps = HashMap::with_capacity(step as usize);
    let mut current = Point::identity();
    for j in 0..step {
        baby_steps.entry(current).or_insert(j);
        current = current.add(&generator);
    }

    // current == step * G here
    let giant = current;
    let mut gamma = *target;
    for i in 0..step {
        if let Some(j) = baby_steps.get(&gamma) {
            let candidate = i * step + j;
            return (candidate < bound).then_some(candidate);
        }
        gamma = gamma.sub(&giant);
    }
    None
}
