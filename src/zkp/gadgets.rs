// R1CS gadgets shared by the swap and allowance circuits
use ark_crypto_primitives::sponge::{
    constraints::CryptographicSpongeVar,
    poseidon::{constraints::PoseidonSpongeVar, PoseidonConfig},
};
use ark_ec::Group;
use ark_ed_on_bn254::{constraints::EdwardsVar, EdwardsProjective};
use ark_r1cs_std::{fields::fp::FpVar, prelude::*};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::crypto::keys::curve_coefficients;
use crate::crypto::poseidon::{KEYSTREAM_DOMAIN, PCT_MESSAGE_LEN, TAG_DOMAIN};
use crate::crypto::{BaseField, Egct, Pct, Point};

pub type PointVar = EdwardsVar;

/// ElGamal ciphertext as circuit variables
#[derive(Clone)]
pub struct EgctVar {
    pub c1: PointVar,
    pub c2: PointVar,
}

/// Poseidon ciphertext as circuit variables
#[derive(Clone)]
pub struct PctVar {
    pub ciphertext: Vec<FpVar<BaseField>>,
    pub auth_key: PointVar,
    pub nonce: FpVar<BaseField>,
}

pub fn input_field(
    cs: ConstraintSystemRef<BaseField>,
    value: Option<BaseField>,
) -> Result<FpVar<BaseField>, SynthesisError> {
    FpVar::new_input(cs, || value.ok_or(SynthesisError::AssignmentMissing))
}

pub fn witness_field(
    cs: ConstraintSystemRef<BaseField>,
    value: Option<BaseField>,
) -> Result<FpVar<BaseField>, SynthesisError> {
    FpVar::new_witness(cs, || value.ok_or(SynthesisError::AssignmentMissing))
}

/// Allocates a public point as two raw coordinates and checks the curve
/// equation. The affine allocator is avoided on purpose: it would allocate
/// cofactor-cleared coordinates instead of the ones the verifier passes.
pub fn input_point(
    cs: ConstraintSystemRef<BaseField>,
    value: Option<Point>,
) -> Result<PointVar, SynthesisError> {
    let x = input_field(cs.clone(), value.map(|p| p.x))?;
    let y = input_field(cs, value.map(|p| p.y))?;
    enforce_on_curve(&x, &y)?;
    Ok(PointVar::new(x, y))
}

pub fn input_egct(
    cs: ConstraintSystemRef<BaseField>,
    value: Option<Egct>,
) -> Result<EgctVar, SynthesisError> {
    let c1 = input_point(cs.clone(), value.map(|ct| ct.c1))?;
    let c2 = input_point(cs, value.map(|ct| ct.c2))?;
    Ok(EgctVar { c1, c2 })
}

pub fn input_pct(
    cs: ConstraintSystemRef<BaseField>,
    value: Option<Pct>,
) -> Result<PctVar, SynthesisError> {
    let mut ciphertext = Vec::with_capacity(PCT_MESSAGE_LEN + 1);
    for i in 0..=PCT_MESSAGE_LEN {
        ciphertext.push(input_field(cs.clone(), value.map(|pct| pct.ciphertext[i]))?);
    }
    let auth_key = input_point(cs.clone(), value.map(|pct| pct.auth_key))?;
    let nonce = input_field(cs, value.map(|pct| pct.nonce))?;
    Ok(PctVar {
        ciphertext,
        auth_key,
        nonce,
    })
}

/// `a*x^2 + y^2 == 1 + d*x^2*y^2`
pub fn enforce_on_curve(x: &FpVar<BaseField>, y: &FpVar<BaseField>) -> Result<(), SynthesisError> {
    let (a, d) = curve_coefficients();
    let x2 = x.square()?;
    let y2 = y.square()?;
    let lhs = &x2 * a + &y2;
    let rhs = (&x2 * &y2) * d + BaseField::from(1u64);
    lhs.enforce_equal(&rhs)
}

pub fn generator() -> PointVar {
    PointVar::constant(EdwardsProjective::generator())
}

/// Forces `value < 2^bits` and returns its low `bits` bits, little-endian
pub fn range_bits(
    value: &FpVar<BaseField>,
    bits: usize,
) -> Result<Vec<Boolean<BaseField>>, SynthesisError> {
    let all = value.to_bits_le()?;
    for bit in &all[bits..] {
        bit.enforce_equal(&Boolean::FALSE)?;
    }
    Ok(all[..bits].to_vec())
}

/// `lhs <= rhs` for operands already known to fit in `bits` bits.
/// Returns the bits of `rhs - lhs`.
pub fn enforce_le(
    lhs: &FpVar<BaseField>,
    rhs: &FpVar<BaseField>,
    bits: usize,
) -> Result<Vec<Boolean<BaseField>>, SynthesisError> {
    let diff = rhs - lhs;
    range_bits(&diff, bits)
}

pub fn fixed_base_mul(bits: &[Boolean<BaseField>]) -> Result<PointVar, SynthesisError> {
    generator().scalar_mul_le(bits.iter())
}

/// `pk == sk*G`
pub fn enforce_key_ownership(
    pk: &PointVar,
    sk_bits: &[Boolean<BaseField>],
) -> Result<(), SynthesisError> {
    fixed_base_mul(sk_bits)?.enforce_equal(pk)
}

/// `ct == (r*G, m*G + r*pk)`
pub fn enforce_elgamal_encryption(
    pk: &PointVar,
    amount_bits: &[Boolean<BaseField>],
    r_bits: &[Boolean<BaseField>],
    ct: &EgctVar,
) -> Result<(), SynthesisError> {
    fixed_base_mul(r_bits)?.enforce_equal(&ct.c1)?;
    let masked = fixed_base_mul(amount_bits)? + pk.scalar_mul_le(r_bits.iter())?;
    masked.enforce_equal(&ct.c2)
}

/// `ct.c2 == m*G + sk*ct.c1`, i.e. `ct` decrypts to `m` under `sk`
pub fn enforce_elgamal_decryption(
    sk_bits: &[Boolean<BaseField>],
    amount_bits: &[Boolean<BaseField>],
    ct: &EgctVar,
) -> Result<(), SynthesisError> {
    let expected = fixed_base_mul(amount_bits)? + ct.c1.scalar_mul_le(sk_bits.iter())?;
    expected.enforce_equal(&ct.c2)
}

fn poseidon_keystream(
    cs: ConstraintSystemRef<BaseField>,
    params: &PoseidonConfig<BaseField>,
    shared: &PointVar,
    nonce: &FpVar<BaseField>,
) -> Result<Vec<FpVar<BaseField>>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, params);
    sponge.absorb(&FpVar::constant(BaseField::from(KEYSTREAM_DOMAIN)))?;
    sponge.absorb(&shared.x)?;
    sponge.absorb(&shared.y)?;
    sponge.absorb(nonce)?;
    sponge.squeeze_field_elements(PCT_MESSAGE_LEN)
}

fn poseidon_tag(
    cs: ConstraintSystemRef<BaseField>,
    params: &PoseidonConfig<BaseField>,
    shared: &PointVar,
    nonce: &FpVar<BaseField>,
    body: &[FpVar<BaseField>],
) -> Result<FpVar<BaseField>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, params);
    sponge.absorb(&FpVar::constant(BaseField::from(TAG_DOMAIN)))?;
    sponge.absorb(&shared.x)?;
    sponge.absorb(&shared.y)?;
    sponge.absorb(nonce)?;
    for element in body {
        sponge.absorb(element)?;
    }
    let mut out = sponge.squeeze_field_elements(1)?;
    out.pop().ok_or(SynthesisError::Unsatisfiable)
}

/// The PCT carries `amount` in its first slot for the holder of `pk`,
/// with empty remaining slots and a valid tag.
pub fn enforce_pct_encryption(
    cs: ConstraintSystemRef<BaseField>,
    params: &PoseidonConfig<BaseField>,
    pk: &PointVar,
    amount: &FpVar<BaseField>,
    r_bits: &[Boolean<BaseField>],
    pct: &PctVar,
) -> Result<(), SynthesisError> {
    fixed_base_mul(r_bits)?.enforce_equal(&pct.auth_key)?;
    let shared = pk.scalar_mul_le(r_bits.iter())?;

    let stream = poseidon_keystream(cs.clone(), params, &shared, &pct.nonce)?;
    let mut message = vec![FpVar::zero(); PCT_MESSAGE_LEN];
    message[0] = amount.clone();
    for i in 0..PCT_MESSAGE_LEN {
        (&message[i] + &stream[i]).enforce_equal(&pct.ciphertext[i])?;
    }

    let tag = poseidon_tag(cs, params, &shared, &pct.nonce, &pct.ciphertext[..PCT_MESSAGE_LEN])?;
    tag.enforce_equal(&pct.ciphertext[PCT_MESSAGE_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::scalar_to_base;
    use crate::crypto::poseidon::{encrypt_amount, poseidon_config};
    use crate::crypto::{encrypt, random_scalar, KeyPair};
    use ark_relations::r1cs::ConstraintSystem;
    use crate::test_helpers::test_rng;

    #[test]
    fn test_range_bits_accepts_and_rejects() {
        let cs = ConstraintSystem::<BaseField>::new_ref();
        let small = witness_field(cs.clone(), Some(BaseField::from(255u64))).unwrap();
        range_bits(&small, 8).unwrap();
        assert!(cs.is_satisfied().unwrap());

        let cs = ConstraintSystem::<BaseField>::new_ref();
        let large = witness_field(cs.clone(), Some(BaseField::from(256u64))).unwrap();
        range_bits(&large, 8).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_enforce_le_rejects_wraparound() {
        let cs = ConstraintSystem::<BaseField>::new_ref();
        let a = witness_field(cs.clone(), Some(BaseField::from(300u64))).unwrap();
        let b = witness_field(cs.clone(), Some(BaseField::from(200u64))).unwrap();
        enforce_le(&a, &b, 128).unwrap();
        assert!(!cs.is_satisfied().unwrap());

        let cs = ConstraintSystem::<BaseField>::new_ref();
        let a = witness_field(cs.clone(), Some(BaseField::from(200u64))).unwrap();
        let b = witness_field(cs.clone(), Some(BaseField::from(200u64))).unwrap();
        enforce_le(&a, &b, 128).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_off_curve_input_unsatisfied() {
        let cs = ConstraintSystem::<BaseField>::new_ref();
        let bogus = Point::new(BaseField::from(3u64), BaseField::from(5u64));
        input_point(cs.clone(), Some(bogus)).unwrap();
        assert!(!cs.is_satisfied().unwrap());

        let cs = ConstraintSystem::<BaseField>::new_ref();
        input_point(cs.clone(), Some(Point::generator())).unwrap();
        input_point(cs.clone(), Some(Point::identity())).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_elgamal_gadgets_match_native() {
        let mut rng = test_rng();
        let pair = KeyPair::generate(&mut rng);
        let r = random_scalar(&mut rng);
        let ct = encrypt(&pair.public_key, 4242, &r);

        let cs = ConstraintSystem::<BaseField>::new_ref();
        let pk = input_point(cs.clone(), Some(pair.public_key)).unwrap();
        let ct_var = input_egct(cs.clone(), Some(ct)).unwrap();
        let amount = witness_field(cs.clone(), Some(BaseField::from(4242u64))).unwrap();
        let r_var = witness_field(cs.clone(), Some(scalar_to_base(&r))).unwrap();
        let sk_var = witness_field(cs.clone(), Some(pair.secret_key.to_base_field())).unwrap();

        let amount_bits = range_bits(&amount, 128).unwrap();
        let r_bits = r_var.to_bits_le().unwrap();
        let sk_bits = sk_var.to_bits_le().unwrap();
        enforce_key_ownership(&pk, &sk_bits).unwrap();
        enforce_elgamal_encryption(&pk, &amount_bits, &r_bits, &ct_var).unwrap();
        enforce_elgamal_decryption(&sk_bits, &amount_bits, &ct_var).unwrap();

        assert!(cs.is_satisfied().unwrap());
        println!("✅ ElGamal gadgets: {} constraints", cs.num_constraints());
    }

    #[test]
    fn test_pct_gadget_matches_native() {
        let mut rng = test_rng();
        let viewer = KeyPair::generate(&mut rng);
        let (pct, r) = encrypt_amount(&viewer.public_key, 777, &mut rng);

        let cs = ConstraintSystem::<BaseField>::new_ref();
        let pk = input_point(cs.clone(), Some(viewer.public_key)).unwrap();
        let pct_var = input_pct(cs.clone(), Some(pct)).unwrap();
        let amount = witness_field(cs.clone(), Some(BaseField::from(777u64))).unwrap();
        let r_bits = witness_field(cs.clone(), Some(scalar_to_base(&r)))
            .unwrap()
            .to_bits_le()
            .unwrap();

        enforce_pct_encryption(cs.clone(), poseidon_config(), &pk, &amount, &r_bits, &pct_var).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_pct_gadget_rejects_wrong_amount() {
        let mut rng = test_rng();
        let viewer = KeyPair::generate(&mut rng);
        let (pct, r) = encrypt_amount(&viewer.public_key, 777, &mut rng);

        let cs = ConstraintSystem::<BaseField>::new_ref();
        let pk = input_point(cs.clone(), Some(viewer.public_key)).unwrap();
        let pct_var = input_pct(cs.clone(), Some(pct)).unwrap();
        let amount = witness_field(cs.clone(), Some(BaseField::from(778u64))).unwrap();
        let r_bits = witness_field(cs.clone(), Some(scalar_to_base(&r)))
            .unwrap()
            .to_bits_le()
            .unwrap();

        enforce_pct_encryption(cs.clone(), poseidon_config(), &pk, &amount, &r_bits, &pct_var).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }
}
