//! Parallel Proving Pool (spec §4.6).
//!
//! A fixed-size pool of worker tasks that dequeue proof jobs and produce
//! proof results in arbitrary completion order, correlated by job id. This
//! has no analogue in the teacher, which is single-shot CLI tooling; it is
//! grounded instead in the `tokio` mpsc/task idiom the teacher's
//! `tinyzkp_api` binary already uses for its request-handling tasks.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use ark_ec::pairing::Pairing;
use ark_groth16::Proof;
use ark_relations::r1cs::ConstraintSynthesizer;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::PoolError;
use crate::prover::CurveProver;

/// A unit of work: prove `assignment` against `circuit_name` on the pool's
/// shared curve prover.
pub struct ProveJob<C> {
    pub id: u64,
    pub circuit_name: String,
    pub assignment: C,
}

/// One job's outcome. `proof` and `error` are mutually exclusive.
pub struct ProveResult<E: Pairing> {
    pub id: u64,
    pub proof: Option<Proof<E>>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

const DEFAULT_WORKERS: usize = 4;

/// Fixed-size worker pool over one shared curve prover.
pub struct ProvingPool<E: Pairing, C> {
    job_tx: Mutex<Option<mpsc::Sender<ProveJob<C>>>>,
    result_rx: mpsc::Receiver<ProveResult<E>>,
    workers: Vec<JoinHandle<()>>,
    closed: Mutex<bool>,
}

impl<E, C> ProvingPool<E, C>
where
    E: Pairing,
    C: ConstraintSynthesizer<E::ScalarField> + Clone + Send + 'static,
{
    /// Construct a pool of `width` workers (0 or negative-equivalent counts
    /// fall back to the default of 4, spec §4.6) over `prover`.
    #[instrument(skip(prover), fields(width = width))]
    pub fn new(prover: Arc<CurveProver<E>>, width: usize) -> Self {
        let width = if width == 0 { DEFAULT_WORKERS } else { width };
        let capacity = 2 * width;
        let (job_tx, job_rx) = mpsc::channel::<ProveJob<C>>(capacity);
        let (result_tx, result_rx) = mpsc::channel::<ProveResult<E>>(capacity);

        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
        let mut workers = Vec::with_capacity(width);
        for worker_id in 0..width {
            let prover = Arc::clone(&prover);
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            workers.push(tokio::spawn(Self::worker_loop(worker_id, prover, job_rx, result_tx)));
        }
        info!(workers = width, "proving pool started");

        Self { job_tx: Mutex::new(Some(job_tx)), result_rx, workers, closed: Mutex::new(false) }
    }

    async fn worker_loop(
        worker_id: usize,
        prover: Arc<CurveProver<E>>,
        job_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ProveJob<C>>>>,
        result_tx: mpsc::Sender<ProveResult<E>>,
    ) {
        loop {
            let job = {
                let mut guard = job_rx.lock().await;
                guard.recv().await
            };
            let Some(job) = job else {
                debug!(worker_id, "job channel closed, worker exiting");
                break;
            };

            let start = Instant::now();
            let mut rng = StdRng::from_entropy();
            let outcome = prover.prove(&job.circuit_name, job.assignment, &mut rng);
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok((proof, _witness)) => ProveResult { id: job.id, proof: Some(proof), error: None, elapsed_ms },
                Err(e) => ProveResult { id: job.id, proof: None, error: Some(e.to_string()), elapsed_ms },
            };
            if result_tx.send(result).await.is_err() {
                break;
            }
        }
    }

    /// *Submit* — push a job onto the job channel. `PoolError::Closed` if
    /// the pool has been closed.
    pub async fn submit(&self, job: ProveJob<C>) -> Result<(), PoolError> {
        let sender = {
            let guard = self.job_tx.lock().expect("job_tx lock poisoned");
            guard.clone()
        };
        match sender {
            Some(tx) => tx.send(job).await.map_err(|_| PoolError::Closed),
            None => Err(PoolError::Closed),
        }
    }

    /// *Results* — the result-channel handle; read in arbitrary completion
    /// order, correlated by job id.
    pub fn results(&mut self) -> &mut mpsc::Receiver<ProveResult<E>> {
        &mut self.result_rx
    }

    /// *Close* — mark the pool closed, drop the job sender (which closes
    /// the job channel once all in-flight `Submit` clones finish), wait for
    /// every worker, then let the result channel close as their senders
    /// drop.
    #[instrument(skip(self))]
    pub async fn close(&mut self) {
        {
            let mut guard = self.job_tx.lock().expect("job_tx lock poisoned");
            *self.closed.lock().expect("closed lock poisoned") = true;
            guard.take();
        }
        for worker in std::mem::take(&mut self.workers) {
            let _ = worker.await;
        }
        info!("proving pool closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().expect("closed lock poisoned")
    }
}

/// *ProveParallel* — build a one-shot pool of width `width`, submit all
/// `jobs`, and collect results indexed by job id (job ids are assumed to be
/// a dense `0..jobs.len()` range, the convention this convenience uses).
pub async fn prove_parallel<E, C>(
    prover: Arc<CurveProver<E>>,
    jobs: Vec<ProveJob<C>>,
    width: usize,
) -> Vec<ProveResult<E>>
where
    E: Pairing,
    C: ConstraintSynthesizer<E::ScalarField> + Clone + Send + 'static,
{
    let n = jobs.len();
    let mut pool = ProvingPool::new(prover, width);
    for job in jobs {
        pool.submit(job).await.expect("freshly created pool is never closed");
    }

    let mut slots: Vec<Option<ProveResult<E>>> = (0..n).map(|_| None).collect();
    for _ in 0..n {
        if let Some(result) = pool.results().recv().await {
            let idx = result.id as usize;
            slots[idx] = Some(result);
        }
    }
    pool.close().await;
    slots.into_iter().map(|s| s.expect("every submitted job id produced a result")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Bn254, Fr};
    use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
    use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};
    use ark_std::test_rng;

    #[derive(Clone)]
    struct SquareCircuit {
        x: Option<Fr>,
        y: Option<Fr>,
    }

    impl ConstraintSynthesizer<Fr> for SquareCircuit {
        fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
            let x = FpVar::new_witness(cs.clone(), || self.x.ok_or(SynthesisError::AssignmentMissing))?;
            let y = FpVar::new_input(cs.clone(), || self.y.ok_or(SynthesisError::AssignmentMissing))?;
            (&x * &x).enforce_equal(&y)?;
            Ok(())
        }
    }

    fn prover_with_square_circuit() -> Arc<CurveProver<Bn254>> {
        let prover = CurveProver::<Bn254>::new(crate::curve::WRAPPER);
        let mut rng = test_rng();
        prover.register_circuit("square", SquareCircuit { x: None, y: None }, &mut rng).unwrap();
        Arc::new(prover)
    }

    #[tokio::test]
    async fn pool_stress_every_job_id_appears_once() {
        let prover = prover_with_square_circuit();
        let jobs: Vec<_> = (0..64u64)
            .map(|i| ProveJob {
                id: i,
                circuit_name: "square".to_string(),
                assignment: SquareCircuit { x: Some(Fr::from(i)), y: Some(Fr::from(i * i)) },
            })
            .collect();

        let results = prove_parallel(prover, jobs, 4).await;
        assert_eq!(results.len(), 64);
        let mut seen = std::collections::HashSet::new();
        for r in &results {
            assert!(seen.insert(r.id), "duplicate result id {}", r.id);
            assert!(r.proof.is_some(), "job {} failed: {:?}", r.id, r.error);
        }
        assert_eq!(seen.len(), 64);
    }

    #[tokio::test]
    async fn submit_after_close_is_rejected() {
        let prover = prover_with_square_circuit();
        let mut pool = ProvingPool::new(prover, 2);
        pool.close().await;
        let err = pool
            .submit(ProveJob { id: 0, circuit_name: "square".into(), assignment: SquareCircuit { x: None, y: None } })
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Closed));
    }
}
