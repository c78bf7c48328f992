//! Deterministic Solidity verifier export (spec §4.1 `ExportVerifier`).
//!
//! Renders a fixed-shape Groth16 verifier contract, parameterized only by the
//! verifying key's field elements. Byte-identical input VKs always render
//! byte-identical Solidity, which is the "cache equivalence" property spec §8
//! tests against.

use ark_bn254::Bn254;
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::VerifyingKey;

/// Render a field element as a `0x`-prefixed hex literal — Solidity accepts
/// hex literals anywhere a `uint256` is expected, and hex avoids pulling in a
/// bignum-to-decimal dependency just for source generation.
fn fq_decimal<F: PrimeField>(f: &F) -> String {
    format!("0x{}", hex::encode(f.into_bigint().to_bytes_be()))
}

/// Render `vk` as a standalone Solidity Groth16 verifier, named after
/// `circuit_name` (sanitized to a valid Solidity identifier suffix).
///
/// This is specific to BN254 (C_W): it is the only curve in the pipeline
/// with a G2 extension-field shape (`Fq2`) that a Solidity verifier needs to
/// lay out, and the only curve this crate ever deploys on-chain.
pub fn render_verifier(circuit_name: &str, vk: &VerifyingKey<Bn254>) -> Result<String, String> {
    let ident: String = circuit_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let alpha = vk.alpha_g1;
    let beta = vk.beta_g2;
    let gamma = vk.gamma_g2;
    let delta = vk.delta_g2;

    let alpha_xy = alpha.xy().ok_or("alpha_g1 is the point at infinity")?;

    let mut ic = String::new();
    for (i, point) in vk.gamma_abc_g1.iter().enumerate() {
        let xy = point.xy().ok_or_else(|| format!("gamma_abc_g1[{i}] is the point at infinity"))?;
        ic.push_str(&format!(
            "        vk.IC[{i}] = Pairing.G1Point({}, {});\n",
            fq_decimal(xy.0),
            fq_decimal(xy.1)
        ));
    }

    let beta_xy = beta.xy().ok_or("beta_g2 is the point at infinity")?;
    let gamma_xy = gamma.xy().ok_or("gamma_g2 is the point at infinity")?;
    let delta_xy = delta.xy().ok_or("delta_g2 is the point at infinity")?;

    Ok(format!(
        r#"// SPDX-License-Identifier: MIT
// Auto-generated Groth16 verifier for circuit `{circuit_name}`. Do not edit by hand.
pragma solidity ^0.8.19;

library Pairing {{
    struct G1Point {{ uint256 X; uint256 Y; }}
    struct G2Point {{ uint256[2] X; uint256[2] Y; }}
}}

contract Verifier_{ident} {{
    struct VerifyingKey {{
        Pairing.G1Point alpha;
        Pairing.G2Point beta;
        Pairing.G2Point gamma;
        Pairing.G2Point delta;
        Pairing.G1Point[] IC;
    }}

    function verifyingKey() internal pure returns (VerifyingKey memory vk) {{
        vk.alpha = Pairing.G1Point({alpha_x}, {alpha_y});
        vk.beta = Pairing.G2Point([{beta_x0}, {beta_x1}], [{beta_y0}, {beta_y1}]);
        vk.gamma = Pairing.G2Point([{gamma_x0}, {gamma_x1}], [{gamma_y0}, {gamma_y1}]);
        vk.delta = Pairing.G2Point([{delta_x0}, {delta_x1}], [{delta_y0}, {delta_y1}]);
        vk.IC = new Pairing.G1Point[]({ic_len});
{ic}    }}
}}
"#,
        circuit_name = circuit_name,
        ident = ident,
        alpha_x = fq_decimal(alpha_xy.0),
        alpha_y = fq_decimal(alpha_xy.1),
        beta_x0 = fq_decimal(&beta_xy.0.c0),
        beta_x1 = fq_decimal(&beta_xy.0.c1),
        beta_y0 = fq_decimal(&beta_xy.1.c0),
        beta_y1 = fq_decimal(&beta_xy.1.c1),
        gamma_x0 = fq_decimal(&gamma_xy.0.c0),
        gamma_x1 = fq_decimal(&gamma_xy.0.c1),
        gamma_y0 = fq_decimal(&gamma_xy.1.c0),
        gamma_y1 = fq_decimal(&gamma_xy.1.c1),
        delta_x0 = fq_decimal(&delta_xy.0.c0),
        delta_x1 = fq_decimal(&delta_xy.0.c1),
        delta_y0 = fq_decimal(&delta_xy.1.c0),
        delta_y1 = fq_decimal(&delta_xy.1.c1),
        ic_len = vk.gamma_abc_g1.len(),
        ic = ic,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_groth16::Groth16;
    use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
    use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
    use ark_std::test_rng;

    #[derive(Clone)]
    struct AddCircuit {
        a: Option<ark_bn254::Fr>,
        b: Option<ark_bn254::Fr>,
        c: Option<ark_bn254::Fr>,
    }

    impl ConstraintSynthesizer<ark_bn254::Fr> for AddCircuit {
        fn generate_constraints(self, cs: ConstraintSystemRef<ark_bn254::Fr>) -> Result<(), SynthesisError> {
            let a = FpVar::new_witness(cs.clone(), || self.a.ok_or(SynthesisError::AssignmentMissing))?;
            let b = FpVar::new_witness(cs.clone(), || self.b.ok_or(SynthesisError::AssignmentMissing))?;
            let c = FpVar::new_input(cs.clone(), || self.c.ok_or(SynthesisError::AssignmentMissing))?;
            (&a + &b).enforce_equal(&c)?;
            Ok(())
        }
    }

    #[test]
    fn render_verifier_is_deterministic_and_names_the_contract() {
        let mut rng = test_rng();
        let (_pk, vk) = Groth16::<Bn254>::circuit_specific_setup(
            AddCircuit { a: None, b: None, c: None },
            &mut rng,
        )
        .unwrap();

        let first = render_verifier("my-circuit", &vk).unwrap();
        let second = render_verifier("my-circuit", &vk).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("contract Verifier_my_circuit"));
        assert!(first.contains(&format!("new Pairing.G1Point[]({})", vk.gamma_abc_g1.len())));
    }
}
