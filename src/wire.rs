//! On-chain proof encoding for the wrapper curve (spec §3, §6).
//!
//! The uncompressed 256-byte layout and the 8-`uint256` on-chain tuple are
//! specific to C_W (BN254): they are the shape Ethereum's pairing precompile
//! (EIP-197) and a Solidity Groth16 verifier expect. Compressed (128-byte)
//! serialization uses `ark-serialize`'s canonical compressed form directly
//! and needs no bespoke layout.

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::Proof;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

use crate::error::WitnessError;

const LIMB: usize = 32;

fn fq_to_be(f: &Fq) -> [u8; LIMB] {
    let mut out = [0u8; LIMB];
    let be = f.into_bigint().to_bytes_be();
    out[LIMB - be.len()..].copy_from_slice(&be);
    out
}

fn fq_from_be(bytes: &[u8]) -> Fq {
    Fq::from_be_bytes_mod_order(bytes)
}

/// Serialize a BN254 Groth16 proof into the uncompressed 256-byte layout
/// `A.x(32) ‖ A.y(32) ‖ B.x0(32) ‖ B.x1(32) ‖ B.y0(32) ‖ B.y1(32) ‖ C.x(32) ‖ C.y(32)`.
pub fn proof_to_uncompressed_256(proof: &Proof<Bn254>) -> [u8; 256] {
    let mut out = [0u8; 256];
    let a = proof.a.xy().expect("proof.a is not the point at infinity");
    let b = proof.b.xy().expect("proof.b is not the point at infinity");
    let c = proof.c.xy().expect("proof.c is not the point at infinity");

    out[0..32].copy_from_slice(&fq_to_be(a.0));
    out[32..64].copy_from_slice(&fq_to_be(a.1));
    out[64..96].copy_from_slice(&fq_to_be(&b.0.c0));
    out[96..128].copy_from_slice(&fq_to_be(&b.0.c1));
    out[128..160].copy_from_slice(&fq_to_be(&b.1.c0));
    out[160..192].copy_from_slice(&fq_to_be(&b.1.c1));
    out[192..224].copy_from_slice(&fq_to_be(c.0));
    out[224..256].copy_from_slice(&fq_to_be(c.1));
    out
}

/// Parse the uncompressed 256-byte layout back into a BN254 Groth16 proof.
pub fn proof_from_uncompressed_256(bytes: &[u8; 256]) -> Result<Proof<Bn254>, WitnessError> {
    let ax = fq_from_be(&bytes[0..32]);
    let ay = fq_from_be(&bytes[32..64]);
    let bx0 = fq_from_be(&bytes[64..96]);
    let bx1 = fq_from_be(&bytes[96..128]);
    let by0 = fq_from_be(&bytes[128..160]);
    let by1 = fq_from_be(&bytes[160..192]);
    let cx = fq_from_be(&bytes[192..224]);
    let cy = fq_from_be(&bytes[224..256]);

    let a = G1Affine::new_unchecked(ax, ay);
    let b = G2Affine::new_unchecked(Fq2::new(bx0, bx1), Fq2::new(by0, by1));
    let c = G1Affine::new_unchecked(cx, cy);

    let valid = |p: &G1Affine| p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve();
    let valid_g2 = |p: &G2Affine| p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve();
    if !valid(&a) || !valid_g2(&b) || !valid(&c) {
        return Err(WitnessError::MalformedEncoding("proof point not on curve".into()));
    }
    Ok(Proof { a, b, c })
}

/// The eight 256-bit limbs of a wrapped proof, in the order
/// `[A.x, A.y, B.x0, B.x1, B.y0, B.y1, C.x, C.y]` (spec §3, §6).
pub fn proof_to_raw_array(proof: &Proof<Bn254>) -> [[u8; 32]; 8] {
    let bytes = proof_to_uncompressed_256(proof);
    let mut out = [[0u8; 32]; 8];
    for (i, chunk) in bytes.chunks_exact(32).enumerate() {
        out[i].copy_from_slice(chunk);
    }
    out
}

/// Serialize a BN254 Groth16 proof using `ark-serialize`'s canonical
/// compressed form (128 bytes on C_W).
pub fn proof_to_compressed(proof: &Proof<Bn254>) -> Vec<u8> {
    let mut out = Vec::with_capacity(128);
    proof
        .serialize_compressed(&mut out)
        .expect("serialization into a Vec cannot fail");
    out
}

/// Deserialize a compressed BN254 Groth16 proof.
pub fn proof_from_compressed(bytes: &[u8]) -> Result<Proof<Bn254>, WitnessError> {
    Proof::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| WitnessError::MalformedEncoding(format!("compressed proof: {e}")))
}

/// Encode a field element (little-endian scalar already reduced mod the
/// field's modulus) as a `0x`-prefixed 64-hex-digit string, as required for
/// the wrapped proof's public inputs.
pub fn field_to_hex<F: PrimeField>(f: &F) -> String {
    let be = f.into_bigint().to_bytes_be();
    let mut padded = vec![0u8; 32 - be.len()];
    padded.extend_from_slice(&be);
    format!("0x{}", hex::encode(padded))
}

/// Parse a `0x`-prefixed 64-hex-digit string back into a field element.
pub fn field_from_hex<F: PrimeField>(s: &str) -> Result<F, WitnessError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)
        .map_err(|e| WitnessError::InvalidValue { field: "hex".into(), value: e.to_string() })?;
    Ok(F::from_be_bytes_mod_order(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_ff::UniformRand;
    use ark_std::test_rng;

    fn arbitrary_proof(rng: &mut impl rand::RngCore) -> Proof<Bn254> {
        // Build a structurally valid (not necessarily "sound") proof by
        // scaling the generators, sufficient to exercise the wire format.
        let a = (G1Affine::generator() * Fr::rand(rng)).into();
        let b = (G2Affine::generator() * Fr::rand(rng)).into();
        let c = (G1Affine::generator() * Fr::rand(rng)).into();
        Proof { a, b, c }
    }

    #[test]
    fn uncompressed_round_trip_preserves_points() {
        let mut rng = test_rng();
        let proof = arbitrary_proof(&mut rng);
        let bytes = proof_to_uncompressed_256(&proof);
        let parsed = proof_from_uncompressed_256(&bytes).unwrap();
        assert_eq!(parsed.a, proof.a);
        assert_eq!(parsed.b, proof.b);
        assert_eq!(parsed.c, proof.c);
    }

    #[test]
    fn raw_array_matches_uncompressed_chunking() {
        let mut rng = test_rng();
        let proof = arbitrary_proof(&mut rng);
        let bytes = proof_to_uncompressed_256(&proof);
        let arr = proof_to_raw_array(&proof);
        for (i, chunk) in bytes.chunks_exact(32).enumerate() {
            assert_eq!(&arr[i][..], chunk);
        }
    }

    #[test]
    fn hex_round_trips() {
        let f = Fr::from(12345u64);
        let s = field_to_hex(&f);
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 66);
        let parsed: Fr = field_from_hex(&s).unwrap();
        assert_eq!(parsed, f);
    }
}
