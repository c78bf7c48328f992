//! Aggregation Pipeline (spec §4.5) — the orchestrator.
//!
//! Owns one prover per curve. The inner prover is supplied by the caller,
//! already carrying the registered inner circuit (the pipeline is agnostic
//! to what that circuit verifies); the aggregation and wrapper provers are
//! owned outright and eagerly compiled at construction time via
//! `LoadOrCompile` — generalizing the five-phase setup discipline the
//! teacher's scheduler used for a single proving curve to this crate's
//! three-curve pipeline.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use ark_bls12_377::Bls12_377;
use ark_bn254::Bn254;
use ark_bw6_761::BW6_761 as Bw6_761;
use ark_groth16::{Proof, VerifyingKey};
use ark_relations::r1cs::ConstraintSynthesizer;
use ark_std::rand::{CryptoRng, RngCore};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::circuits::aggregator::{AggregatorCircuit, InnerPublicInputs};
use crate::circuits::wrapper::WrapperCircuit;
use crate::error::PipelineError;
use crate::prover::CurveProver;
use crate::witness::Witness;

/// Construction-time configuration (spec §6: no environment variables; the
/// host process supplies these as constructor arguments).
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Name the inner circuit is (or will be) registered under on the inner
    /// prover.
    pub inner_circuit_name: String,
    /// Root directory for the key cache shared by all three provers.
    pub key_cache_root: PathBuf,
}

/// Caller-supplied metadata for one inner proof, bundled with the proof
/// itself into an [`InnerProofResult`] (spec §3 "Inner proof result").
#[derive(Clone, Debug)]
pub struct InnerMetadata {
    pub batch: u64,
    pub r_pre: ark_bls12_377::Fr,
    pub r_post: ark_bls12_377::Fr,
    pub aux: ark_bls12_377::Fr,
}

/// One proved batch, ready to enter the pending buffer.
#[derive(Clone)]
pub struct InnerProofResult {
    pub batch: u64,
    pub r_pre: ark_bls12_377::Fr,
    pub r_post: ark_bls12_377::Fr,
    pub aux: ark_bls12_377::Fr,
    pub proof: Proof<Bls12_377>,
    pub witness: Witness<ark_bls12_377::Fr>,
}

/// The result of `Aggregate`: a BW6-761 proof plus the chained public
/// inputs it attests to.
#[derive(Clone)]
pub struct AggregatedProof {
    pub proof: Proof<Bw6_761>,
    pub public_witness: Witness<ark_bw6_761::Fr>,
    pub r_pre: ark_bls12_377::Fr,
    pub r_final: ark_bls12_377::Fr,
    pub b_start: u64,
    pub b_end: u64,
}

/// The result of `Wrap`: an Ethereum-shaped BN254 proof (spec §3, §6).
#[derive(Clone)]
pub struct WrappedProof {
    /// `[A.x, A.y, B.x0, B.x1, B.y0, B.y1, C.x, C.y]`, 32 bytes each.
    pub raw: [[u8; 32]; 8],
    /// The four public inputs, `0x`-prefixed hex, in declaration order.
    pub public_inputs_hex: Vec<String>,
    pub r_pre: ark_bls12_377::Fr,
    pub r_final: ark_bls12_377::Fr,
    pub b_start: u64,
    pub b_end: u64,
    pub num_aggregated: usize,
}

/// The orchestrator, parameterized by the aggregation width `N` (spec §4.3
/// — a pipeline is built for one fixed `N`; different widths are different
/// pipelines over differently-compiled aggregator circuits).
pub struct AggregationPipeline<const N: usize> {
    config: PipelineConfig,
    inner_prover: Arc<CurveProver<Bls12_377>>,
    aggregation_prover: Arc<CurveProver<Bw6_761>>,
    wrapper_prover: Arc<CurveProver<Bn254>>,
    pending: Mutex<Vec<InnerProofResult>>,
    aggregator_name: String,
    wrapper_name: String,
}

const WRAPPER_CIRCUIT_NAME: &str = "wrapper";

impl<const N: usize> AggregationPipeline<N> {
    /// Build a pipeline around an inner prover the caller already registered
    /// the inner circuit on (spec §4.5: the pipeline doesn't know the inner
    /// circuit's semantics, but it does need the *same* prover instance the
    /// caller will later call `ProveInner` through — the aggregator's
    /// verifying-key witness must match the VK every inner proof actually
    /// verifies against, and those can only be guaranteed equal if they come
    /// from one registration, not two independent `Setup` runs).
    #[instrument(skip(inner_prover, rng), fields(n = N))]
    pub fn new<R: RngCore + CryptoRng>(
        config: PipelineConfig,
        inner_prover: Arc<CurveProver<Bls12_377>>,
        rng: &mut R,
    ) -> Result<Self, PipelineError> {
        assert!(N >= 1, "aggregation width N must be >= 1");

        let inner_vk = inner_prover
            .verifying_key(&config.inner_circuit_name)
            .ok_or_else(|| PipelineError::InnerCircuitNotRegistered(config.inner_circuit_name.clone()))?;
        let aggregation_prover = Arc::new(CurveProver::<Bw6_761>::new(crate::curve::AGGREGATION));
        let wrapper_prover = Arc::new(CurveProver::<Bn254>::new(crate::curve::WRAPPER));

        let aggregator_name = format!("aggregator{N}");
        aggregation_prover.load_or_compile(
            &aggregator_name,
            AggregatorCircuit::<N>::placeholder(inner_vk),
            &config.key_cache_root,
            rng,
        )?;

        let aggregator_vk = aggregation_prover
            .verifying_key(&aggregator_name)
            .expect("just registered above");
        wrapper_prover.load_or_compile(
            WRAPPER_CIRCUIT_NAME,
            WrapperCircuit::placeholder(aggregator_vk),
            &config.key_cache_root,
            rng,
        )?;

        info!("aggregation pipeline ready");
        Ok(Self {
            config,
            inner_prover,
            aggregation_prover,
            wrapper_prover,
            pending: Mutex::new(Vec::with_capacity(N)),
            aggregator_name,
            wrapper_name: WRAPPER_CIRCUIT_NAME.to_string(),
        })
    }

    /// The inner prover this pipeline was built around, exposed so the
    /// caller can route further `ProveInner` calls through the exact
    /// instance whose registered VK the aggregator circuit was compiled
    /// against.
    pub fn inner_prover(&self) -> &CurveProver<Bls12_377> {
        &self.inner_prover
    }

    /// Number of inner results currently buffered.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending buffer lock poisoned").len()
    }

    /// *ProveInner* — delegate to the inner prover and bundle the result
    /// with caller-supplied metadata.
    #[instrument(skip(self, assignment, rng, cancel), fields(batch = metadata.batch))]
    pub async fn prove_inner<C, R>(
        &self,
        assignment: C,
        metadata: InnerMetadata,
        mut rng: R,
        cancel: &CancellationToken,
    ) -> Result<InnerProofResult, PipelineError>
    where
        C: ConstraintSynthesizer<ark_bls12_377::Fr> + Clone + Send + 'static,
        R: RngCore + CryptoRng + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled("prove_inner".into()));
        }
        if self.inner_prover.circuit_info(&self.config.inner_circuit_name).is_none() {
            return Err(PipelineError::InnerCircuitNotRegistered(self.config.inner_circuit_name.clone()));
        }

        let prover = Arc::clone(&self.inner_prover);
        let name = self.config.inner_circuit_name.clone();
        let (proof, witness) = tokio::task::spawn_blocking(move || prover.prove(&name, assignment, &mut rng))
            .await
            .expect("inner prove task panicked")?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled("prove_inner".into()));
        }
        Ok(InnerProofResult {
            batch: metadata.batch,
            r_pre: metadata.r_pre,
            r_post: metadata.r_post,
            aux: metadata.aux,
            proof,
            witness,
        })
    }

    /// *AddPending* — append under the buffer lock; `true` means the caller
    /// should now drain and aggregate.
    pub fn add_pending(&self, result: InnerProofResult) -> bool {
        let mut guard = self.pending.lock().expect("pending buffer lock poisoned");
        guard.push(result);
        guard.len() >= N
    }

    /// *Drain* — clear and return the buffer.
    pub fn drain(&self) -> Vec<InnerProofResult> {
        std::mem::take(&mut *self.pending.lock().expect("pending buffer lock poisoned"))
    }

    /// *Aggregate* — validate the state-root chain, build the aggregator
    /// assignment and prove it.
    #[instrument(skip(self, inner_vk, inner_results, rng, cancel))]
    pub async fn aggregate<R>(
        &self,
        inner_vk: VerifyingKey<Bls12_377>,
        inner_results: Vec<InnerProofResult>,
        mut rng: R,
        cancel: &CancellationToken,
    ) -> Result<AggregatedProof, PipelineError>
    where
        R: RngCore + CryptoRng + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled("aggregate".into()));
        }
        if inner_results.len() != N {
            return Err(PipelineError::WrongBatchSize { actual: inner_results.len(), expected: N });
        }
        for i in 0..N - 1 {
            if inner_results[i].r_post != inner_results[i + 1].r_pre {
                return Err(PipelineError::ChainBroken { index: i, next: i + 1 });
            }
        }

        let mut proofs = Vec::with_capacity(N);
        let mut public_inputs = Vec::with_capacity(N);
        for r in &inner_results {
            proofs.push(r.proof.clone());
            public_inputs.push([r.r_pre, r.r_post, r.aux, ark_bls12_377::Fr::from(r.batch)] as InnerPublicInputs);
        }
        let proofs: [Proof<Bls12_377>; N] = proofs.try_into().ok().expect("length checked above");
        let public_inputs: [InnerPublicInputs; N] = public_inputs.try_into().ok().expect("length checked above");

        let assignment = AggregatorCircuit::<N>::assignment(inner_vk, proofs, public_inputs);
        let prover = Arc::clone(&self.aggregation_prover);
        let name = self.aggregator_name.clone();
        let (proof, public_witness) =
            tokio::task::spawn_blocking(move || prover.prove(&name, assignment, &mut rng))
                .await
                .expect("aggregate task panicked")?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled("aggregate".into()));
        }
        Ok(AggregatedProof {
            proof,
            public_witness,
            r_pre: inner_results[0].r_pre,
            r_final: inner_results[N - 1].r_post,
            b_start: inner_results[0].batch,
            b_end: inner_results[N - 1].batch,
        })
    }

    /// *Wrap* — verify the aggregated proof under field emulation and
    /// produce the Ethereum-shaped wrapped proof.
    #[instrument(skip(self, aggregated, rng, cancel))]
    pub async fn wrap<R>(
        &self,
        aggregated: &AggregatedProof,
        mut rng: R,
        cancel: &CancellationToken,
    ) -> Result<WrappedProof, PipelineError>
    where
        R: RngCore + CryptoRng + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled("wrap".into()));
        }

        let aggregator_vk = self
            .aggregation_prover
            .verifying_key(&self.aggregator_name)
            .expect("registered at construction");
        let public_inputs: [ark_bw6_761::Fr; 4] = aggregated.public_witness.public.clone().try_into().ok().expect(
            "aggregator circuit always exposes exactly four public inputs",
        );
        let assignment = WrapperCircuit::assignment(aggregator_vk, aggregated.proof.clone(), public_inputs);

        let prover = Arc::clone(&self.wrapper_prover);
        let name = self.wrapper_name.clone();
        let (proof, witness) = tokio::task::spawn_blocking(move || prover.prove(&name, assignment, &mut rng))
            .await
            .expect("wrap task panicked")?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled("wrap".into()));
        }

        let raw = crate::wire::proof_to_raw_array(&proof);
        let public_inputs_hex = witness.public.iter().map(crate::wire::field_to_hex).collect();
        Ok(WrappedProof {
            raw,
            public_inputs_hex,
            r_pre: aggregated.r_pre,
            r_final: aggregated.r_final,
            b_start: aggregated.b_start,
            b_end: aggregated.b_end,
            num_aggregated: N,
        })
    }

    /// *FullAggregate* = `Aggregate` followed by `Wrap`, short-circuiting on
    /// the first error.
    pub async fn full_aggregate<R>(
        &self,
        inner_vk: VerifyingKey<Bls12_377>,
        inner_results: Vec<InnerProofResult>,
        rng: R,
        cancel: &CancellationToken,
    ) -> Result<WrappedProof, PipelineError>
    where
        R: RngCore + CryptoRng + Send + 'static + Clone,
    {
        let aggregated = self.aggregate(inner_vk, inner_results, rng.clone(), cancel).await?;
        self.wrap(&aggregated, rng, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar, fields::FieldVar};
    use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
    use ark_std::test_rng;

    /// A trivial inner circuit for pipeline wiring tests: proves knowledge
    /// of `aux` given `(r_pre, r_post, aux, batch)` with no real
    /// application semantics (out of scope per this crate's Non-goals).
    #[derive(Clone)]
    struct DummyInnerCircuit {
        r_pre: Option<ark_bls12_377::Fr>,
        r_post: Option<ark_bls12_377::Fr>,
        aux: Option<ark_bls12_377::Fr>,
        batch: Option<ark_bls12_377::Fr>,
    }

    impl ConstraintSynthesizer<ark_bls12_377::Fr> for DummyInnerCircuit {
        fn generate_constraints(self, cs: ConstraintSystemRef<ark_bls12_377::Fr>) -> Result<(), SynthesisError> {
            let r_pre = FpVar::new_input(cs.clone(), || self.r_pre.ok_or(SynthesisError::AssignmentMissing))?;
            let r_post = FpVar::new_input(cs.clone(), || self.r_post.ok_or(SynthesisError::AssignmentMissing))?;
            let aux = FpVar::new_input(cs.clone(), || self.aux.ok_or(SynthesisError::AssignmentMissing))?;
            let batch = FpVar::new_input(cs.clone(), || self.batch.ok_or(SynthesisError::AssignmentMissing))?;
            // A real multiplication gate on `aux`, so the circuit isn't
            // constraint-free, without coupling `r_pre`/`r_post` (the
            // pipeline's own chain check, not this inner circuit, owns that).
            (&aux + &aux).enforce_equal(&(&aux * FpVar::constant(ark_bls12_377::Fr::from(2u64))))?;
            let _ = (&r_pre, &r_post, &batch);
            Ok(())
        }
    }

    fn registered_inner_prover() -> Arc<CurveProver<Bls12_377>> {
        let prover = Arc::new(CurveProver::<Bls12_377>::new(crate::curve::INNER));
        let mut rng = test_rng();
        prover
            .register_circuit(
                "dummy-inner",
                DummyInnerCircuit { r_pre: None, r_post: None, aux: None, batch: None },
                &mut rng,
            )
            .unwrap();
        prover
    }

    #[tokio::test]
    async fn single_batch_identity_aggregation_chains_correctly() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = test_rng();
        let inner_prover = registered_inner_prover();
        let inner_vk = inner_prover.verifying_key("dummy-inner").unwrap();

        let pipeline = AggregationPipeline::<1>::new(
            PipelineConfig { inner_circuit_name: "dummy-inner".into(), key_cache_root: dir.path().into() },
            Arc::clone(&inner_prover),
            &mut rng,
        )
        .unwrap();

        let r_pre = ark_bls12_377::Fr::from(1u64);
        let r_post = ark_bls12_377::Fr::from(2u64);
        let assignment = DummyInnerCircuit {
            r_pre: Some(r_pre),
            r_post: Some(r_post),
            aux: Some(ark_bls12_377::Fr::from(0u64)),
            batch: Some(ark_bls12_377::Fr::from(1u64)),
        };
        let metadata =
            InnerMetadata { batch: 1, r_pre, r_post, aux: ark_bls12_377::Fr::from(0u64) };
        let cancel = CancellationToken::new();
        let inner = pipeline
            .prove_inner(assignment, metadata, test_rng(), &cancel)
            .await
            .unwrap();
        assert!(pipeline.add_pending(inner.clone()));

        let drained = pipeline.drain();
        assert_eq!(drained.len(), 1);

        let aggregated = pipeline.aggregate(inner_vk, drained, test_rng(), &cancel).await.unwrap();
        assert_eq!(aggregated.r_pre, r_pre);
        assert_eq!(aggregated.r_final, r_post);
        assert_eq!(aggregated.b_start, 1);
        assert_eq!(aggregated.b_end, 1);
    }

    #[tokio::test]
    async fn aggregate_rejects_wrong_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = test_rng();
        let inner_prover = registered_inner_prover();
        let inner_vk = inner_prover.verifying_key("dummy-inner").unwrap();
        let pipeline = AggregationPipeline::<2>::new(
            PipelineConfig { inner_circuit_name: "dummy-inner".into(), key_cache_root: dir.path().into() },
            Arc::clone(&inner_prover),
            &mut rng,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let err = pipeline.aggregate(inner_vk, Vec::new(), test_rng(), &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::WrongBatchSize { actual: 0, expected: 2 }));
    }
}
