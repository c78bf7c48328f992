//! Curve Registry (spec §4.0 / §3 "Curve descriptor").
//!
//! Three curves participate in the pipeline, identified by role rather than
//! by arbitrary index. The scalar-field/base-field relationship between the
//! inner and aggregation curves is the entire reason recursive verification
//! is *native* at that boundary and must be emulated at the other.

use ark_ff::PrimeField;

/// The role a curve plays in the three-stage pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurveRole {
    /// Batch proofs are generated here (C_I).
    Inner,
    /// Inner proofs are recursively, natively verified here (C_A).
    Aggregation,
    /// The aggregation proof is verified here under field emulation, in a
    /// shape an Ethereum pairing precompile accepts (C_W).
    Wrapper,
}

/// Stable numeric identifier for a curve, used in the witness binary header
/// (spec §3, §6) so a deserialized witness is self-describing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CurveId {
    /// BLS12-377, the inner curve.
    Bls12_377 = 0,
    /// BW6-761, the aggregation curve. Its base field equals BLS12-377's
    /// scalar field, which is what makes inner verification native here.
    Bw6_761 = 1,
    /// BN254, the wrapper curve, chosen for its cheap Ethereum precompile.
    Bn254 = 2,
}

impl CurveId {
    /// Recover a `CurveId` from the little-endian `u32` stored in a witness
    /// header.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Bls12_377),
            1 => Some(Self::Bw6_761),
            2 => Some(Self::Bn254),
            _ => None,
        }
    }
}

/// Immutable descriptor for one curve's role in the pipeline.
#[derive(Clone, Debug)]
pub struct CurveDescriptor {
    /// Stable identifier, serialized into witness headers.
    pub id: CurveId,
    /// Human-readable name, used in logs and error messages.
    pub name: &'static str,
    /// Bit size of the curve's scalar field.
    pub scalar_field_bits: u32,
    /// The role this curve plays.
    pub role: CurveRole,
}

/// Descriptor for C_I (BLS12-377).
pub const INNER: CurveDescriptor = CurveDescriptor {
    id: CurveId::Bls12_377,
    name: "bls12-377",
    scalar_field_bits: <ark_bls12_377::Fr as PrimeField>::MODULUS_BIT_SIZE,
    role: CurveRole::Inner,
};

/// Descriptor for C_A (BW6-761).
pub const AGGREGATION: CurveDescriptor = CurveDescriptor {
    id: CurveId::Bw6_761,
    name: "bw6-761",
    scalar_field_bits: <ark_bw6_761::Fr as PrimeField>::MODULUS_BIT_SIZE,
    role: CurveRole::Aggregation,
};

/// Descriptor for C_W (BN254).
pub const WRAPPER: CurveDescriptor = CurveDescriptor {
    id: CurveId::Bn254,
    name: "bn254",
    scalar_field_bits: <ark_bn254::Fr as PrimeField>::MODULUS_BIT_SIZE,
    role: CurveRole::Wrapper,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_id_roundtrips() {
        for c in [CurveId::Bls12_377, CurveId::Bw6_761, CurveId::Bn254] {
            assert_eq!(CurveId::from_u32(c as u32), Some(c));
        }
        assert_eq!(CurveId::from_u32(99), None);
    }

    #[test]
    fn aggregation_scalar_field_matches_inner_base_field() {
        // scalar_field(C_A) must equal base_field(C_I): BW6-761's scalar
        // field and BLS12-377's base field are the same field, which is
        // the arithmetic fact that makes inner verification native inside
        // aggregation circuits.
        let inner_base_field_bits = <ark_bls12_377::Fq as PrimeField>::MODULUS_BIT_SIZE;
        assert_eq!(AGGREGATION.scalar_field_bits, inner_base_field_bits);
        // And C_A's scalar field is *not* related to C_W's in the same way.
        let wrapper_scalar_field_bits = WRAPPER.scalar_field_bits;
        assert_ne!(AGGREGATION.scalar_field_bits, wrapper_scalar_field_bits);
    }
}
