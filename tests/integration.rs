//! End-to-end scenarios spanning the inner/aggregation/wrapper boundary.
//!
//! Per-module unit tests already cover hash determinism, cache
//! hit/miss-on-change, wire and witness layout round trips, and pool
//! correlation; this file covers the multi-stage scenarios that only show
//! up once inner, aggregator and wrapper circuits are wired together.

use std::collections::HashMap;

use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar, fields::FieldVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_std::rand::{rngs::StdRng, SeedableRng};
use tokio_util::sync::CancellationToken;

use zk_agg_core::circuits::aggregator::{AggregatorCircuit, InnerPublicInputs};
use zk_agg_core::pipeline::{AggregationPipeline, InnerMetadata, PipelineConfig};
use zk_agg_core::prover::CurveProver;
use zk_agg_core::{CurveId, Witness};

type InnerFr = ark_bls12_377::Fr;

/// A minimal inner circuit with the public-input shape spec.md mandates
/// (`[r_pre, r_post, aux, batch]`) and a single real constraint, enough to
/// exercise aggregation without pulling in application semantics (the
/// application circuit is an external collaborator's concern).
#[derive(Clone)]
struct DummyInnerCircuit {
    r_pre: Option<InnerFr>,
    r_post: Option<InnerFr>,
    aux: Option<InnerFr>,
    batch: Option<InnerFr>,
}

impl ConstraintSynthesizer<InnerFr> for DummyInnerCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<InnerFr>) -> Result<(), SynthesisError> {
        let r_pre = FpVar::new_input(cs.clone(), || self.r_pre.ok_or(SynthesisError::AssignmentMissing))?;
        let r_post = FpVar::new_input(cs.clone(), || self.r_post.ok_or(SynthesisError::AssignmentMissing))?;
        let aux = FpVar::new_input(cs.clone(), || self.aux.ok_or(SynthesisError::AssignmentMissing))?;
        let batch = FpVar::new_input(cs.clone(), || self.batch.ok_or(SynthesisError::AssignmentMissing))?;
        // A real multiplication gate on `aux`, so the circuit isn't
        // constraint-free, without coupling `r_pre`/`r_post` (the
        // aggregator's own chain check owns that relationship, not this
        // inner circuit).
        (&aux + &aux).enforce_equal(&(&aux * FpVar::constant(InnerFr::from(2u64))))?;
        let _ = (r_pre, r_post, batch);
        Ok(())
    }
}

fn dummy_inner_prover_and_vk() -> (CurveProver<ark_bls12_377::Bls12_377>, ark_groth16::VerifyingKey<ark_bls12_377::Bls12_377>) {
    let prover = CurveProver::new(zk_agg_core::INNER);
    let mut rng = StdRng::seed_from_u64(0);
    prover
        .register_circuit("dummy-inner", DummyInnerCircuit { r_pre: None, r_post: None, aux: None, batch: None }, &mut rng)
        .unwrap();
    let vk = prover.verifying_key("dummy-inner").unwrap();
    (prover, vk)
}

fn prove_inner(
    prover: &CurveProver<ark_bls12_377::Bls12_377>,
    r_pre: u64,
    r_post: u64,
    batch: u64,
) -> (ark_groth16::Proof<ark_bls12_377::Bls12_377>, InnerPublicInputs) {
    let mut rng = StdRng::seed_from_u64(0);
    let assignment = DummyInnerCircuit {
        r_pre: Some(InnerFr::from(r_pre)),
        r_post: Some(InnerFr::from(r_post)),
        aux: Some(InnerFr::from(0u64)),
        batch: Some(InnerFr::from(batch)),
    };
    let (proof, witness) = prover.prove("dummy-inner", assignment, &mut rng).unwrap();
    let public: [InnerFr; 4] = witness.public.try_into().unwrap();
    (proof, public)
}

#[test]
fn two_batch_aggregation_chains_public_inputs() {
    let (inner_prover, inner_vk) = dummy_inner_prover_and_vk();
    let (proof0, p0) = prove_inner(&inner_prover, 7, 8, 7);
    let (proof1, p1) = prove_inner(&inner_prover, 8, 9, 8);

    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let aggregation_prover = CurveProver::new(zk_agg_core::AGGREGATION);
    aggregation_prover
        .load_or_compile("aggregator2", AggregatorCircuit::<2>::placeholder(inner_vk.clone()), dir.path(), &mut rng)
        .unwrap();

    let assignment = AggregatorCircuit::<2>::assignment(inner_vk, [proof0, proof1], [p0, p1]);
    let (_proof, witness) = aggregation_prover.prove("aggregator2", assignment, &mut rng).unwrap();

    assert_eq!(witness.public.len(), 4);
    assert_eq!(witness.public[0], field_switch(p0[0])); // R_pre
    assert_eq!(witness.public[1], field_switch(p1[1])); // R_final
    assert_eq!(witness.public[2], field_switch(InnerFr::from(7u64))); // b_start
    assert_eq!(witness.public[3], field_switch(InnerFr::from(8u64))); // b_end
}

fn field_switch(f: InnerFr) -> ark_bw6_761::Fr {
    use ark_ff::{BigInteger, PrimeField};
    ark_bw6_761::Fr::from_le_bytes_mod_order(&f.into_bigint().to_bytes_le())
}

#[test]
fn aggregator_rejects_batch_gap() {
    let (inner_prover, inner_vk) = dummy_inner_prover_and_vk();
    let (proof0, p0) = prove_inner(&inner_prover, 7, 8, 7);
    // Batch 9 instead of 8: a gap of two, violating `p_i[3] = b_start + i`.
    let (proof1, p1) = prove_inner(&inner_prover, 8, 9, 9);

    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let aggregation_prover = CurveProver::new(zk_agg_core::AGGREGATION);
    aggregation_prover
        .load_or_compile("aggregator2-gap", AggregatorCircuit::<2>::placeholder(inner_vk.clone()), dir.path(), &mut rng)
        .unwrap();

    let assignment = AggregatorCircuit::<2>::assignment(inner_vk, [proof0, proof1], [p0, p1]);
    let err = aggregation_prover.prove("aggregator2-gap", assignment, &mut rng).unwrap_err();
    assert!(matches!(err, zk_agg_core::ProveError::UnsatisfiableWitness(_)));
}

#[test]
fn aggregator_rejects_root_break() {
    let (inner_prover, inner_vk) = dummy_inner_prover_and_vk();
    let (proof0, p0) = prove_inner(&inner_prover, 7, 8, 7);
    // post-root of #0 is 8, but #1's pre-root is 9: broken chain.
    let (proof1, p1) = prove_inner(&inner_prover, 9, 10, 8);

    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let aggregation_prover = CurveProver::new(zk_agg_core::AGGREGATION);
    aggregation_prover
        .load_or_compile("aggregator2-break", AggregatorCircuit::<2>::placeholder(inner_vk.clone()), dir.path(), &mut rng)
        .unwrap();

    let assignment = AggregatorCircuit::<2>::assignment(inner_vk, [proof0, proof1], [p0, p1]);
    let err = aggregation_prover.prove("aggregator2-break", assignment, &mut rng).unwrap_err();
    assert!(matches!(err, zk_agg_core::ProveError::UnsatisfiableWitness(_)));
}

#[tokio::test]
async fn pipeline_full_aggregate_produces_consistent_wrapped_proof() {
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    let (inner_prover, inner_vk) = dummy_inner_prover_and_vk();
    let inner_prover = Arc::new(inner_prover);

    let pipeline = AggregationPipeline::<1>::new(
        PipelineConfig { inner_circuit_name: "dummy-inner".into(), key_cache_root: dir.path().into() },
        Arc::clone(&inner_prover),
        &mut rng,
    )
    .unwrap();

    let cancel = CancellationToken::new();
    let metadata = InnerMetadata {
        batch: 1,
        r_pre: InnerFr::from(1u64),
        r_post: InnerFr::from(2u64),
        aux: InnerFr::from(0u64),
    };
    let assignment = DummyInnerCircuit {
        r_pre: Some(metadata.r_pre),
        r_post: Some(metadata.r_post),
        aux: Some(metadata.aux),
        batch: Some(InnerFr::from(1u64)),
    };
    let inner = pipeline.prove_inner(assignment, metadata, StdRng::seed_from_u64(0), &cancel).await.unwrap();
    assert!(pipeline.add_pending(inner));
    let drained = pipeline.drain();

    let wrapped = pipeline.full_aggregate(inner_vk, drained, StdRng::seed_from_u64(0), &cancel).await.unwrap();
    assert_eq!(wrapped.num_aggregated, 1);
    assert_eq!(wrapped.public_inputs_hex.len(), 4);
    for hex_value in &wrapped.public_inputs_hex {
        assert!(hex_value.starts_with("0x"));
        assert_eq!(hex_value.len(), 66);
    }
    // Raw on-chain array uses the documented 8-limb ordering (spec §3/§6).
    assert_eq!(wrapped.raw.len(), 8);
}

#[test]
fn witness_curve_id_round_trips_through_binary_layout() {
    let w = Witness::<ark_bn254::Fr>::new(CurveId::Bn254, vec![ark_bn254::Fr::from(5u64)], vec![]);
    let bytes = w.to_bytes();
    let parsed = Witness::<ark_bn254::Fr>::from_bytes(&bytes).unwrap();
    assert_eq!(parsed.curve_id(), CurveId::Bn254);
    assert_eq!(parsed.public, vec![ark_bn254::Fr::from(5u64)]);
}

#[test]
fn witness_factory_boundary_rejects_malformed_map_value() {
    use zk_agg_core::service::{parse_field_value, require_field};
    let mut map = HashMap::new();
    map.insert("x".to_string(), "not-a-number".to_string());
    let err = require_field::<ark_bn254::Fr>(&map, "x").unwrap_err();
    assert!(matches!(err, zk_agg_core::WitnessError::InvalidValue { .. }));

    let ok: ark_bn254::Fr = parse_field_value("y", "0x10").unwrap();
    assert_eq!(ok, ark_bn254::Fr::from(16u64));
}
