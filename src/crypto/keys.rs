// BabyJubJub points and key management
// Keys and ciphertext components all live on the twisted Edwards curve
// embedded in the BN254 scalar field.

use ark_ec::{twisted_edwards::TECurveConfig, AffineRepr, CurveGroup, Group};
use ark_ed_on_bn254::{EdwardsAffine, EdwardsConfig, EdwardsProjective};
use ark_ff::{BigInteger, PrimeField, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::{CryptoError, Result};

/// Base field of BabyJubJub, identical to the BN254 scalar field
pub type BaseField = ark_ed_on_bn254::Fq;
/// Scalar field of the prime-order subgroup
pub type ScalarField = ark_ed_on_bn254::Fr;

/// Serde helpers encoding a field element as 32 canonical little-endian bytes
pub mod field_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn to_bytes(value: &BaseField) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        let repr = value.into_bigint().to_bytes_le();
        bytes[..repr.len()].copy_from_slice(&repr);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Option<BaseField> {
        BaseField::deserialize_compressed(&bytes[..]).ok()
    }

    pub fn serialize<S: Serializer>(value: &BaseField, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        to_bytes(value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<BaseField, D::Error> {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        from_bytes(&bytes).ok_or_else(|| serde::de::Error::custom("non-canonical field element"))
    }
}

/// Serde helpers for subgroup scalars, same 32-byte layout as field elements
pub mod scalar_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &ScalarField, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut bytes = [0u8; 32];
        let repr = value.into_bigint().to_bytes_le();
        bytes[..repr.len()].copy_from_slice(&repr);
        bytes.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<ScalarField, D::Error> {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        ScalarField::deserialize_compressed(&bytes[..])
            .map_err(|_| serde::de::Error::custom("non-canonical scalar"))
    }
}

/// Serde helpers for fixed-size arrays of field elements
pub mod field_array_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        values: &[BaseField; N],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let encoded: Vec<[u8; 32]> = values.iter().map(field_serde::to_bytes).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> std::result::Result<[BaseField; N], D::Error> {
        let encoded = <Vec<[u8; 32]>>::deserialize(deserializer)?;
        if encoded.len() != N {
            return Err(serde::de::Error::invalid_length(encoded.len(), &"fixed-size field array"));
        }
        let mut out = [BaseField::zero(); N];
        for (slot, bytes) in out.iter_mut().zip(encoded.iter()) {
            *slot = field_serde::from_bytes(bytes)
                .ok_or_else(|| serde::de::Error::custom("non-canonical field element"))?;
        }
        Ok(out)
    }
}

/// Affine point `(x, y)`. `(0, 1)` is the identity and doubles as the
/// "unset" sentinel in stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    #[serde(with = "field_serde")]
    pub x: BaseField,
    #[serde(with = "field_serde")]
    pub y: BaseField,
}

impl Point {
    pub fn new(x: BaseField, y: BaseField) -> Self {
        Self { x, y }
    }

    pub fn identity() -> Self {
        Self {
            x: BaseField::zero(),
            y: BaseField::from(1u64),
        }
    }

    pub fn generator() -> Self {
        EdwardsProjective::generator().into()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Curve equation plus prime-order subgroup membership
    pub fn is_valid(&self) -> bool {
        let affine = EdwardsAffine::new_unchecked(self.x, self.y);
        affine.is_on_curve() && affine.is_in_correct_subgroup_assuming_on_curve()
    }

    /// Checked conversion from raw coordinates
    pub fn from_coordinates(x: BaseField, y: BaseField) -> Result<Self> {
        let point = Self { x, y };
        if !point.is_valid() {
            return Err(CryptoError::InvalidPoint);
        }
        Ok(point)
    }

    pub fn to_affine(&self) -> EdwardsAffine {
        EdwardsAffine::new_unchecked(self.x, self.y)
    }

    pub fn to_projective(&self) -> EdwardsProjective {
        self.to_affine().into_group()
    }

    pub fn add(&self, other: &Point) -> Point {
        (self.to_projective() + other.to_projective()).into()
    }

    pub fn sub(&self, other: &Point) -> Point {
        (self.to_projective() - other.to_projective()).into()
    }

    pub fn mul(&self, scalar: &ScalarField) -> Point {
        (self.to_projective() * scalar).into()
    }

    /// `amount * G`
    pub fn from_amount(amount: u128) -> Point {
        Self::generator().mul(&ScalarField::from(amount))
    }

    pub fn to_fields(&self) -> [BaseField; 2] {
        [self.x, self.y]
    }

    pub fn to_hex(&self) -> String {
        format!(
            "{}{}",
            hex::encode(field_serde::to_bytes(&self.x)),
            hex::encode(field_serde::to_bytes(&self.y))
        )
    }

    /// Parse the 64-byte hex form produced by `to_hex`, checking the curve
    pub fn from_hex(s: &str) -> Result<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 64];
        hex::decode_to_slice(stripped, &mut bytes).map_err(|_| CryptoError::InvalidPoint)?;
        let mut x = [0u8; 32];
        let mut y = [0u8; 32];
        x.copy_from_slice(&bytes[..32]);
        y.copy_from_slice(&bytes[32..]);
        let x = field_serde::from_bytes(&x).ok_or(CryptoError::InvalidPoint)?;
        let y = field_serde::from_bytes(&y).ok_or(CryptoError::InvalidPoint)?;
        Self::from_coordinates(x, y)
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<EdwardsProjective> for Point {
    fn from(value: EdwardsProjective) -> Self {
        let affine = value.into_affine();
        // The affine form of the identity is (0, 1) on a twisted Edwards curve
        Point {
            x: affine.x,
            y: affine.y,
        }
    }
}

impl From<EdwardsAffine> for Point {
    fn from(value: EdwardsAffine) -> Self {
        Point {
            x: value.x,
            y: value.y,
        }
    }
}

/// BabyJubJub secret key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SecretKey(pub ScalarField);

impl SecretKey {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let scalar = ScalarField::rand(rng);
            if !scalar.is_zero() {
                return SecretKey(scalar);
            }
        }
    }

    pub fn public_key(&self) -> Point {
        Point::generator().mul(&self.0)
    }

    /// The key as a base-field element, used as a circuit witness.
    /// The subgroup order is below the base modulus so this never reduces.
    pub fn to_base_field(&self) -> BaseField {
        scalar_to_base(&self.0)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        let repr = self.0.into_bigint().to_bytes_le();
        bytes[..repr.len()].copy_from_slice(&repr);
        bytes
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let scalar = ScalarField::deserialize_compressed(&bytes[..])
            .map_err(|_| CryptoError::InvalidSecretKey)?;
        if scalar.is_zero() {
            return Err(CryptoError::InvalidSecretKey);
        }
        Ok(SecretKey(scalar))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(stripped, &mut bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey(..)")
    }
}

/// Key pair registered for an account
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: Point,
}

impl KeyPair {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret_key(SecretKey::generate(rng))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self {
            secret_key,
            public_key,
        }
    }
}

/// Lift a subgroup scalar into the base field without reduction
pub fn scalar_to_base(scalar: &ScalarField) -> BaseField {
    BaseField::from_le_bytes_mod_order(&scalar.into_bigint().to_bytes_le())
}

/// Curve coefficients `(a, d)` used by the in-circuit membership check
pub fn curve_coefficients() -> (BaseField, BaseField) {
    (EdwardsConfig::COEFF_A, EdwardsConfig::COEFF_D)
}
