//! Witness type and its stable binary layout (spec §3, §6).
//!
//! ```text
//! offset 0..3   : curve id      (uint32 little-endian)
//! offset 4..7   : #public       (uint32 little-endian)
//! offset 8..11  : #secret       (uint32 little-endian)
//! offset 12..   : field elements (32 bytes each, big-endian, left-padded)
//! ```
//!
//! The layout is curve-agnostic as long as the scalar field fits in 256 bits,
//! which holds for all three curves in this pipeline (BLS12-377 Fr, BW6-761
//! Fr, BN254 Fr are all well under 256 bits).

use ark_ff::{BigInteger, PrimeField};

use crate::curve::CurveId;
use crate::error::WitnessError;

const HEADER_LEN: usize = 12;
const ELEMENT_LEN: usize = 32;

/// A curve-specific assignment of field elements to all circuit variables,
/// split into the public and secret portions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Witness<F> {
    curve_id: CurveId,
    /// Public inputs, in circuit-declaration order (the constant `1` is
    /// implicit and not stored here).
    pub public: Vec<F>,
    /// Secret (auxiliary) assignment.
    pub secret: Vec<F>,
}

impl<F: PrimeField> Witness<F> {
    /// Build a witness for the given curve.
    pub fn new(curve_id: CurveId, public: Vec<F>, secret: Vec<F>) -> Self {
        Self { curve_id, public, secret }
    }

    /// The curve this witness was encoded for.
    pub fn curve_id(&self) -> CurveId {
        self.curve_id
    }

    /// The public sub-witness, as a standalone witness with no secret part.
    pub fn public_only(&self) -> Witness<F> {
        Witness { curve_id: self.curve_id, public: self.public.clone(), secret: Vec::new() }
    }

    /// Serialize to the stable 12-byte-header + 32-byte-element layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + (self.public.len() + self.secret.len()) * ELEMENT_LEN);
        out.extend_from_slice(&(self.curve_id as u32).to_le_bytes());
        out.extend_from_slice(&(self.public.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.secret.len() as u32).to_le_bytes());
        for e in self.public.iter().chain(self.secret.iter()) {
            let mut be = e.into_bigint().to_bytes_be();
            left_pad_into(&mut be, ELEMENT_LEN);
            out.extend_from_slice(&be);
        }
        out
    }

    /// Parse from the stable binary layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WitnessError> {
        if bytes.len() < HEADER_LEN {
            return Err(WitnessError::MalformedEncoding(format!(
                "witness buffer shorter than header ({} < {HEADER_LEN})",
                bytes.len()
            )));
        }
        let curve_id_raw = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let curve_id = CurveId::from_u32(curve_id_raw)
            .ok_or_else(|| WitnessError::MalformedEncoding(format!("unknown curve id {curve_id_raw}")))?;
        let n_public = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let n_secret = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;

        let expected_len = HEADER_LEN + (n_public + n_secret) * ELEMENT_LEN;
        if bytes.len() != expected_len {
            return Err(WitnessError::MalformedEncoding(format!(
                "witness buffer has {} bytes, expected {expected_len} for {n_public} public + {n_secret} secret elements",
                bytes.len()
            )));
        }

        let mut elems = Vec::with_capacity(n_public + n_secret);
        let mut offset = HEADER_LEN;
        for _ in 0..(n_public + n_secret) {
            let chunk = &bytes[offset..offset + ELEMENT_LEN];
            let f = F::from_be_bytes_mod_order(chunk);
            elems.push(f);
            offset += ELEMENT_LEN;
        }
        let secret = elems.split_off(n_public);
        Ok(Self { curve_id, public: elems, secret })
    }
}

fn left_pad_into(bytes: &mut Vec<u8>, len: usize) {
    if bytes.len() < len {
        let mut padded = vec![0u8; len - bytes.len()];
        padded.extend_from_slice(bytes);
        *bytes = padded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn witness_layout_round_trips() {
        let w = Witness::<Fr>::new(
            CurveId::Bn254,
            vec![Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)],
            vec![Fr::from(42u64)],
        );
        let bytes = w.to_bytes();
        assert_eq!(bytes.len(), 12 + 4 * 32);
        let parsed = Witness::<Fr>::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, w);
        assert_eq!(parsed.public, vec![Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)]);
    }

    #[test]
    fn truncated_buffer_is_malformed() {
        let err = Witness::<Fr>::from_bytes(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, WitnessError::MalformedEncoding(_)));
    }

    #[test]
    fn public_only_drops_secret() {
        let w = Witness::<Fr>::new(CurveId::Bn254, vec![Fr::from(7u64)], vec![Fr::from(9u64)]);
        let pub_only = w.public_only();
        assert!(pub_only.secret.is_empty());
        assert_eq!(pub_only.public, vec![Fr::from(7u64)]);
    }
}
