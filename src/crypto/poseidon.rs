// Poseidon sponge parameters and the Poseidon ciphertext (PCT)
// A PCT lets one designated viewer (spender, receiver or auditor) recover a
// plaintext amount from a Diffie-Hellman secret shared with the encryptor.

use std::sync::OnceLock;

use ark_crypto_primitives::sponge::{
    poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge, FieldBasedCryptographicSponge,
};
use ark_ff::{PrimeField, UniformRand, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::keys::{field_array_serde, field_serde, BaseField, Point, ScalarField, SecretKey};
use super::{CryptoError, Result};
use crate::primitives::Amount;

/// Number of message slots in a PCT
pub const PCT_MESSAGE_LEN: usize = 3;
/// Message slots plus the authentication tag
pub const PCT_CIPHERTEXT_LEN: usize = PCT_MESSAGE_LEN + 1;

/// Domain separators absorbed ahead of the key material
pub const KEYSTREAM_DOMAIN: u64 = 0x5043_5401;
pub const TAG_DOMAIN: u64 = 0x5043_5402;

const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const ALPHA: u64 = 5;
const RATE: usize = 2;
const CAPACITY: usize = 1;

static POSEIDON_CONFIG: OnceLock<PoseidonConfig<BaseField>> = OnceLock::new();

/// Poseidon parameters over the BN254 scalar field (width 3), with round
/// constants and MDS matrix from the Grain LFSR.
pub fn poseidon_config() -> &'static PoseidonConfig<BaseField> {
    POSEIDON_CONFIG.get_or_init(|| {
        let (ark, mds) = find_poseidon_ark_and_mds::<BaseField>(
            BaseField::MODULUS_BIT_SIZE as u64,
            RATE,
            FULL_ROUNDS as u64,
            PARTIAL_ROUNDS as u64,
            0,
        );
        PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, RATE, CAPACITY)
    })
}

/// Poseidon hash of a list of field elements
pub fn hash(inputs: &[BaseField]) -> BaseField {
    let mut sponge = PoseidonSponge::new(poseidon_config());
    for input in inputs {
        sponge.absorb(input);
    }
    sponge.squeeze_native_field_elements(1)[0]
}

/// Keystream derived from the shared secret and the message nonce
pub fn keystream(shared: &Point, nonce: &BaseField) -> Vec<BaseField> {
    let mut sponge = PoseidonSponge::new(poseidon_config());
    sponge.absorb(&BaseField::from(KEYSTREAM_DOMAIN));
    sponge.absorb(&shared.x);
    sponge.absorb(&shared.y);
    sponge.absorb(nonce);
    sponge.squeeze_native_field_elements(PCT_MESSAGE_LEN)
}

/// Authentication tag over the encrypted slots
pub fn tag(shared: &Point, nonce: &BaseField, body: &[BaseField]) -> BaseField {
    let mut inputs = vec![BaseField::from(TAG_DOMAIN), shared.x, shared.y, *nonce];
    inputs.extend_from_slice(body);
    hash(&inputs)
}

/// Poseidon ciphertext: `(ciphertext[4], authKey, nonce)`, seven field
/// elements when flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pct {
    #[serde(with = "field_array_serde")]
    pub ciphertext: [BaseField; PCT_CIPHERTEXT_LEN],
    /// `r*G`; the viewer recomputes the shared secret as `sk * authKey`
    pub auth_key: Point,
    #[serde(with = "field_serde")]
    pub nonce: BaseField,
}

impl Default for Pct {
    fn default() -> Self {
        Self {
            ciphertext: [BaseField::zero(); PCT_CIPHERTEXT_LEN],
            auth_key: Point::identity(),
            nonce: BaseField::zero(),
        }
    }
}

impl Pct {
    pub fn to_fields(&self) -> [BaseField; 7] {
        [
            self.ciphertext[0],
            self.ciphertext[1],
            self.ciphertext[2],
            self.ciphertext[3],
            self.auth_key.x,
            self.auth_key.y,
            self.nonce,
        ]
    }

    pub fn from_fields(fields: &[BaseField]) -> Option<Self> {
        if fields.len() != 7 {
            return None;
        }
        Some(Self {
            ciphertext: [fields[0], fields[1], fields[2], fields[3]],
            auth_key: Point::new(fields[4], fields[5]),
            nonce: fields[6],
        })
    }
}

fn seal(pk: &Point, message: [BaseField; PCT_MESSAGE_LEN], r: &ScalarField, nonce: BaseField) -> Pct {
    let shared = pk.mul(r);
    let auth_key = Point::generator().mul(r);
    let stream = keystream(&shared, &nonce);

    let mut ciphertext = [BaseField::zero(); PCT_CIPHERTEXT_LEN];
    for i in 0..PCT_MESSAGE_LEN {
        ciphertext[i] = message[i] + stream[i];
    }
    ciphertext[PCT_MESSAGE_LEN] = tag(&shared, &nonce, &ciphertext[..PCT_MESSAGE_LEN]);

    Pct {
        ciphertext,
        auth_key,
        nonce,
    }
}

/// Encrypt up to three field elements for the holder of `pk`
pub fn encrypt_values(
    pk: &Point,
    values: &[BaseField],
    r: &ScalarField,
    nonce: BaseField,
) -> Result<Pct> {
    if values.len() > PCT_MESSAGE_LEN {
        return Err(CryptoError::MessageTooLong(values.len()));
    }
    let mut message = [BaseField::zero(); PCT_MESSAGE_LEN];
    message[..values.len()].copy_from_slice(values);
    Ok(seal(pk, message, r, nonce))
}

/// Encrypt a single amount with fresh randomness and nonce
pub fn encrypt_amount<R: RngCore + CryptoRng>(
    pk: &Point,
    amount: Amount,
    rng: &mut R,
) -> (Pct, ScalarField) {
    let r = ScalarField::rand(rng);
    let nonce = random_nonce(rng);
    (encrypt_amount_with(pk, amount, &r, nonce), r)
}

/// 128-bit random PCT nonce
pub fn random_nonce<R: RngCore + CryptoRng>(rng: &mut R) -> BaseField {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    BaseField::from(u128::from_le_bytes(bytes))
}

/// Deterministic variant used by witness builders
pub fn encrypt_amount_with(pk: &Point, amount: Amount, r: &ScalarField, nonce: BaseField) -> Pct {
    let mut message = [BaseField::zero(); PCT_MESSAGE_LEN];
    message[0] = BaseField::from(amount);
    seal(pk, message, r, nonce)
}

/// Recover the message slots; fails if the tag does not authenticate
pub fn decrypt_values(sk: &SecretKey, pct: &Pct) -> Result<Vec<BaseField>> {
    let shared = pct.auth_key.mul(&sk.0);
    let expected = tag(&shared, &pct.nonce, &pct.ciphertext[..PCT_MESSAGE_LEN]);
    if expected != pct.ciphertext[PCT_MESSAGE_LEN] {
        return Err(CryptoError::TagMismatch);
    }
    let stream = keystream(&shared, &pct.nonce);
    Ok((0..PCT_MESSAGE_LEN)
        .map(|i| pct.ciphertext[i] - stream[i])
        .collect())
}

/// Recover a single amount from the first slot
pub fn decrypt_amount(sk: &SecretKey, pct: &Pct) -> Result<Amount> {
    let values = decrypt_values(sk, pct)?;
    field_to_amount(&values[0]).ok_or(CryptoError::AmountOutOfRange)
}

/// Field element to `u128`, if it fits
pub fn field_to_amount(value: &BaseField) -> Option<Amount> {
    let limbs = value.into_bigint().0;
    if limbs[2] != 0 || limbs[3] != 0 {
        return None;
    }
    Some((limbs[0] as u128) | ((limbs[1] as u128) << 64))
}
