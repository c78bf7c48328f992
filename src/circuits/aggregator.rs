//! Aggregator Circuit (spec §4.3), runs on C_A = BW6-761.
//!
//! BW6-761's scalar field equals BLS12-377's base field, so a BLS12-377
//! Groth16 verification can be expressed with BW6-761's *native* field
//! arithmetic — no bit-decomposition of field elements across a curve
//! boundary is needed for the pairing itself. This is the standard
//! Zexe/arkworks recursive-SNARK curve pairing, and `ark-groth16`'s
//! `constraints` module (feature `r1cs`) ships the verifier gadget for
//! exactly this case: [`Groth16VerifierGadget`].
//!
//! Public inputs are still elements of BLS12-377's *scalar* field, a
//! strictly smaller field than BW6-761's scalar field, so they are carried
//! into the circuit as bit vectors ([`BooleanInputVar`]) and the chaining
//! equalities (§ below) are enforced over those same bit vectors converted
//! back to `FpVar<BW6Fr>` via `Boolean::le_bits_to_fp_var`.

use ark_bls12_377::{constraints::PairingVar as Bls12_377PairingVar, Bls12_377};
use ark_bw6_761::Fr as BW6Fr;
use ark_crypto_primitives::snark::constraints::{BooleanInputVar, SNARKGadget};
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{
    constraints::{Groth16VerifierGadget, ProofVar, VerifyingKeyVar},
    Proof, VerifyingKey,
};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

type InnerGroth16Gadget = Groth16VerifierGadget<Bls12_377, Bls12_377PairingVar>;
type InnerProofVar = ProofVar<Bls12_377, Bls12_377PairingVar>;
type InnerVkVar = VerifyingKeyVar<Bls12_377, Bls12_377PairingVar>;

/// One inner proof's public inputs, in the fixed order `[r_pre, r_post, aux, b]`
/// (spec §3 "Inner proof result").
pub type InnerPublicInputs = [ark_bls12_377::Fr; 4];

/// The aggregator circuit, parameterized by `N` — the number of inner proofs
/// it verifies and chains. Different `N` values are different circuits
/// (named `aggregator<N>` by convention, spec §4.3), so `N` is a const
/// generic rather than a runtime field: two `AggregatorCircuit<2>` and
/// `AggregatorCircuit<3>` instances are different Rust types, matching the
/// "different N ⇒ different compiled circuit" invariant exactly.
#[derive(Clone)]
pub struct AggregatorCircuit<const N: usize> {
    /// Shared verifying key for all N inner proofs — they must all be for
    /// the same inner circuit (spec §4.3).
    pub inner_vk: Option<VerifyingKey<Bls12_377>>,
    /// The N inner Groth16 proofs being aggregated.
    pub inner_proofs: Option<[Proof<Bls12_377>; N]>,
    /// The N inner public-input vectors, aligned with `inner_proofs`.
    pub inner_public_inputs: Option<[InnerPublicInputs; N]>,
    /// Public input: aggregated pre-state root (`R_pre`).
    pub r_pre: Option<ark_bls12_377::Fr>,
    /// Public input: aggregated final/post-state root (`R_final`).
    pub r_final: Option<ark_bls12_377::Fr>,
    /// Public input: first batch number in the range.
    pub b_start: Option<ark_bls12_377::Fr>,
    /// Public input: last batch number in the range.
    pub b_end: Option<ark_bls12_377::Fr>,
}

impl<const N: usize> AggregatorCircuit<N> {
    /// A "placeholder" circuit: the correct shape for compilation/setup, with
    /// no concrete witness. Setup only needs shapes, never values (spec §9 —
    /// "expose placeholder constructors that allocate the correct shape from
    /// a peer-stage CS so the outer circuit can be compiled without a
    /// concrete inner proof in hand").
    pub fn placeholder(inner_vk: VerifyingKey<Bls12_377>) -> Self {
        Self {
            inner_vk: Some(inner_vk),
            inner_proofs: None,
            inner_public_inputs: None,
            r_pre: None,
            r_final: None,
            b_start: None,
            b_end: None,
        }
    }

    /// A fully concrete assignment for proving.
    pub fn assignment(
        inner_vk: VerifyingKey<Bls12_377>,
        inner_proofs: [Proof<Bls12_377>; N],
        inner_public_inputs: [InnerPublicInputs; N],
    ) -> Self {
        assert!(N >= 1, "aggregator width N must be >= 1");
        let r_pre = inner_public_inputs[0][0];
        let r_final = inner_public_inputs[N - 1][1];
        let b_start = inner_public_inputs[0][3];
        let b_end = inner_public_inputs[N - 1][3];
        Self {
            inner_vk: Some(inner_vk),
            inner_proofs: Some(inner_proofs),
            inner_public_inputs: Some(inner_public_inputs),
            r_pre: Some(r_pre),
            r_final: Some(r_final),
            b_start: Some(b_start),
            b_end: Some(b_end),
        }
    }

    fn fq<T: Clone>(v: &Option<[T; N]>, i: usize) -> Option<T> {
        v.as_ref().map(|arr| arr[i].clone())
    }
}

impl<const N: usize> ConstraintSynthesizer<BW6Fr> for AggregatorCircuit<N> {
    fn generate_constraints(self, cs: ConstraintSystemRef<BW6Fr>) -> Result<(), SynthesisError> {
        assert!(N >= 1, "aggregator width N must be >= 1");

        // Public inputs, in declaration order [R_pre, R_final, b_start, b_end].
        let r_pre = FpVar::<BW6Fr>::new_input(cs.clone(), || {
            self.r_pre.map(field_switch).ok_or(SynthesisError::AssignmentMissing)
        })?;
        let r_final = FpVar::<BW6Fr>::new_input(cs.clone(), || {
            self.r_final.map(field_switch).ok_or(SynthesisError::AssignmentMissing)
        })?;
        let b_start = FpVar::<BW6Fr>::new_input(cs.clone(), || {
            self.b_start.map(field_switch).ok_or(SynthesisError::AssignmentMissing)
        })?;
        let b_end = FpVar::<BW6Fr>::new_input(cs.clone(), || {
            self.b_end.map(field_switch).ok_or(SynthesisError::AssignmentMissing)
        })?;

        // Shared inner VK, allocated once and reused for all N verifications.
        let vk_var = InnerVkVar::new_witness(cs.clone(), || {
            self.inner_vk.clone().ok_or(SynthesisError::AssignmentMissing)
        })?;
        let pvk_var = vk_var.prepare()?;

        let mut prev_post: Option<FpVar<BW6Fr>> = None;
        for i in 0..N {
            let proof_var = InnerProofVar::new_witness(cs.clone(), || {
                Self::fq(&self.inner_proofs, i).ok_or(SynthesisError::AssignmentMissing)
            })?;

            // Allocate each of the inner circuit's four public inputs as a
            // *native* field element here (they are elements of C_A's
            // scalar field exactly where they are used for the chain
            // equalities), and separately as bits for the recursive
            // pairing check, whose input representation is bit-oriented.
            let p: Vec<FpVar<BW6Fr>> = (0..4)
                .map(|j| {
                    FpVar::<BW6Fr>::new_witness(cs.clone(), || {
                        Self::fq(&self.inner_public_inputs, i)
                            .map(|arr| field_switch(arr[j]))
                            .ok_or(SynthesisError::AssignmentMissing)
                    })
                })
                .collect::<Result<_, _>>()?;

            let input_bits: Vec<Vec<Boolean<BW6Fr>>> = p
                .iter()
                .map(|fp| fp.to_bits_le())
                .collect::<Result<_, _>>()?;
            let input_var = BooleanInputVar::new(input_bits);

            // Constraint 1: native Groth16 verification of the i-th inner proof.
            let verified = InnerGroth16Gadget::verify_with_processed_vk(&pvk_var, &input_var, &proof_var)?;
            verified.enforce_equal(&Boolean::TRUE)?;

            // Constraint 2: chain. p_0[0] = R_pre; p_i[0] = p_{i-1}[1] for i>0;
            // p_{N-1}[1] = R_final. p_0[3] = b_start; p_i[3] = b_start + i.
            if i == 0 {
                p[0].enforce_equal(&r_pre)?;
            } else {
                let prev = prev_post.as_ref().expect("set on i>0 in previous iteration");
                p[0].enforce_equal(prev)?;
            }
            if i == N - 1 {
                p[1].enforce_equal(&r_final)?;
            }
            let expected_batch = &b_start + FpVar::constant(BW6Fr::from(i as u64));
            p[3].enforce_equal(&expected_batch)?;

            prev_post = Some(p[1].clone());
        }

        // b_end = b_start + (N - 1).
        let expected_b_end = &b_start + FpVar::constant(BW6Fr::from((N - 1) as u64));
        b_end.enforce_equal(&expected_b_end)?;

        Ok(())
    }
}

/// Reinterpret a BLS12-377 scalar-field element as a BW6-761 scalar-field
/// element via its canonical byte representation. This is *not* a generic
/// field embedding — it relies on BLS12-377's `Fr` and BW6-761's `Fr` both
/// being safely representable within BW6-761's (larger) modulus, which holds
/// because BLS12-377's scalar field is ~253 bits and BW6-761's is ~377 bits.
fn field_switch(f: ark_bls12_377::Fr) -> BW6Fr {
    BW6Fr::from_le_bytes_mod_order(&f.into_bigint().to_bytes_le())
}
