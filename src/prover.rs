//! Curve Prover (spec §4.1).
//!
//! Owns the compiled circuits for a single curve and exposes compile/setup
//! (via `RegisterCircuit`/`LoadOrCompile`), `Prove`, `Verify` and
//! `ExportVerifier`. The registry is guarded by a single readers-writer lock;
//! `Prove`/`Verify`/`ExportVerifier` take the read side just long enough to
//! clone out an `Arc` to the compiled circuit, then drop the lock before
//! running the actual (compute-heavy) cryptography, matching spec §4.1's
//! concurrency contract.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use ark_crypto_primitives::snark::SNARK;
use ark_ec::pairing::Pairing;
use ark_groth16::{prepare_verifying_key, Groth16, PreparedVerifyingKey, ProvingKey, VerifyingKey};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, OptimizationGoal, SynthesisMode};
use ark_std::rand::{CryptoRng, RngCore};
use tracing::{debug, info, instrument};

use crate::curve::CurveDescriptor;
use crate::error::{CompileError, ExportError, ProveError, SetupError, VerifyError};
use crate::key_cache::{self, PersistedKeys};
use crate::solidity;
use crate::witness::Witness;

/// One compiled circuit: its canonical CS bytes, content hash, proving and
/// verifying keys, and the public/secret variable counts implied by the CS.
///
/// Identity is `(curve, name, CS-hash)` (spec §3); `name` and `curve` are
/// carried by the registry that owns this entry, so only the hash is stored
/// here.
pub struct CompiledCircuit<E: Pairing> {
    /// Canonical serialization of the constraint system's shape.
    pub cs_bytes: Vec<u8>,
    /// Hex SHA-256 of `cs_bytes` — this circuit's content-addressed identity.
    pub cs_hash: String,
    /// Number of constraints in the compiled system.
    pub num_constraints: usize,
    /// Number of public variables, including the implicit constant `1`.
    pub num_public_variables: usize,
    /// Number of secret (witness) variables.
    pub num_secret_variables: usize,
    /// Groth16 proving key.
    pub pk: ProvingKey<E>,
    /// Groth16 verifying key.
    pub vk: VerifyingKey<E>,
    pvk: PreparedVerifyingKey<E>,
}

/// Per-curve registry of compiled circuits plus setup/proving/verification
/// operations against them.
pub struct CurveProver<E: Pairing> {
    descriptor: CurveDescriptor,
    registry: RwLock<HashMap<String, Arc<CompiledCircuit<E>>>>,
}

/// Synthesize `circuit` into a constraint system and extract its canonical
/// shape — the "compile" half of `RegisterCircuit`/`LoadOrCompile`.
fn compile<F: ark_ff::PrimeField, C: ConstraintSynthesizer<F> + Clone>(
    name: &str,
    circuit: &C,
) -> Result<(Vec<u8>, usize, usize, usize), CompileError> {
    let cs = ConstraintSystem::<F>::new_ref();
    cs.set_optimization_goal(OptimizationGoal::Constraints);
    cs.set_mode(SynthesisMode::Setup);
    circuit.clone().generate_constraints(cs.clone()).map_err(|e| CompileError::Synthesis {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    cs.finalize();
    let matrices = cs.to_matrices().ok_or_else(|| CompileError::Synthesis {
        name: name.to_string(),
        reason: "constraint system could not be reduced to matrices".into(),
    })?;
    let cs_bytes = key_cache::serialize_matrices(&matrices);
    Ok((
        cs_bytes,
        matrices.num_constraints,
        matrices.num_instance_variables,
        matrices.num_witness_variables,
    ))
}

impl<E: Pairing> CurveProver<E> {
    /// Create an empty prover for the given curve.
    pub fn new(descriptor: CurveDescriptor) -> Self {
        Self { descriptor, registry: RwLock::new(HashMap::new()) }
    }

    /// The curve this prover owns circuits for.
    pub fn descriptor(&self) -> &CurveDescriptor {
        &self.descriptor
    }

    /// List the names of all registered circuits (for the request surface's
    /// `GET /circuits`, spec §6).
    pub fn circuit_names(&self) -> Vec<String> {
        self.registry.read().expect("registry lock poisoned").keys().cloned().collect()
    }

    fn insert(&self, name: &str, compiled: CompiledCircuit<E>) {
        self.registry
            .write()
            .expect("registry lock poisoned")
            .insert(name.to_string(), Arc::new(compiled));
    }

    fn get(&self, name: &str) -> Option<Arc<CompiledCircuit<E>>> {
        self.registry.read().expect("registry lock poisoned").get(name).cloned()
    }

    /// Compile `circuit_description` and run Groth16 setup, storing the
    /// result under `name`. Name collisions replace the prior entry
    /// (register-last-wins, relied on by [`Self::load_or_compile`]).
    #[instrument(skip(self, circuit_description, rng), fields(curve = self.descriptor.name, circuit = name))]
    pub fn register_circuit<C, R>(
        &self,
        name: &str,
        circuit_description: C,
        rng: &mut R,
    ) -> Result<(), SetupError>
    where
        C: ConstraintSynthesizer<E::ScalarField> + Clone,
        R: RngCore + CryptoRng,
    {
        let (cs_bytes, num_constraints, num_public_variables, num_secret_variables) =
            compile::<E::ScalarField, C>(name, &circuit_description).map_err(|e| SetupError::Aborted {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let cs_hash = key_cache::hash_cs_bytes(&cs_bytes);

        let (pk, vk) = Groth16::<E>::circuit_specific_setup(circuit_description, rng)
            .map_err(|e| SetupError::Aborted { name: name.to_string(), reason: e.to_string() })?;
        let pvk = prepare_verifying_key(&vk);

        info!(constraints = num_constraints, hash = %cs_hash, "registered circuit");
        self.insert(
            name,
            CompiledCircuit {
                cs_bytes,
                cs_hash,
                num_constraints,
                num_public_variables,
                num_secret_variables,
                pk,
                vk,
                pvk,
            },
        );
        Ok(())
    }

    /// As [`Self::register_circuit`], but first checks the on-disk cache
    /// under `key_cache_root/<name>/`. If the cached hash matches the CS just
    /// compiled, the keys are loaded from disk instead of re-running setup.
    /// Any mismatch, missing cache, or read failure falls back to a fresh
    /// setup (spec §4.1, §7 — persistence failures are non-fatal).
    #[instrument(skip(self, circuit_description, rng), fields(curve = self.descriptor.name, circuit = name))]
    pub fn load_or_compile<C, R>(
        &self,
        name: &str,
        circuit_description: C,
        key_cache_root: &Path,
        rng: &mut R,
    ) -> Result<(), SetupError>
    where
        C: ConstraintSynthesizer<E::ScalarField> + Clone,
        R: RngCore + CryptoRng,
    {
        let (cs_bytes, num_constraints, num_public_variables, num_secret_variables) =
            compile::<E::ScalarField, C>(name, &circuit_description).map_err(|e| SetupError::Aborted {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let cs_hash = key_cache::hash_cs_bytes(&cs_bytes);

        if key_cache::read_cached_hash(key_cache_root, name).as_deref() == Some(cs_hash.as_str()) {
            match key_cache::load_from::<E>(key_cache_root, name) {
                Ok(PersistedKeys { cs_bytes: loaded_cs, pk, vk }) => {
                    debug!(hash = %cs_hash, "cache hit, loaded compiled circuit from disk");
                    let pvk = prepare_verifying_key(&vk);
                    self.insert(
                        name,
                        CompiledCircuit {
                            cs_bytes: loaded_cs,
                            cs_hash,
                            num_constraints,
                            num_public_variables,
                            num_secret_variables,
                            pk,
                            vk,
                            pvk,
                        },
                    );
                    return Ok(());
                }
                Err(e) => {
                    debug!(error = %e, "cache read failed despite matching hash, falling back to setup");
                }
            }
        } else {
            debug!("cache miss, running setup");
        }

        let start = Instant::now();
        self.register_circuit(name, circuit_description, rng)?;
        let compiled = self.get(name).expect("just registered");
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "setup complete");
        key_cache::save_to(
            key_cache_root,
            name,
            &PersistedKeys { cs_bytes: compiled.cs_bytes.clone(), pk: compiled.pk.clone(), vk: compiled.vk.clone() },
        )
        .unwrap_or_else(|e| {
            // Persistence write failures are logged and swallowed (spec §7):
            // the prover remains usable in-memory even if the cache write failed.
            tracing::warn!(error = %e, "failed to persist compiled circuit to key cache");
        });
        Ok(())
    }

    /// Look up `name`'s verifying key, for stages that need to embed it in a
    /// peer circuit's assignment (the aggregator importing the inner VK, the
    /// wrapper importing the aggregator VK).
    pub fn verifying_key(&self, name: &str) -> Option<VerifyingKey<E>> {
        self.get(name).map(|c| c.vk.clone())
    }

    /// Look up `name`'s compiled circuit and its canonical counts, for the
    /// request surface's circuit-metadata endpoints.
    pub fn circuit_info(&self, name: &str) -> Option<CircuitInfo> {
        self.get(name).map(|c| CircuitInfo {
            name: name.to_string(),
            cs_hash: c.cs_hash.clone(),
            num_constraints: c.num_constraints,
            num_public_variables: c.num_public_variables,
            num_secret_variables: c.num_secret_variables,
        })
    }

    /// `name`'s metadata, serialized to the JSON shape `GET /circuits/{name}`
    /// (spec §6) returns to callers over whatever transport binds this prover.
    pub fn circuit_info_json(&self, name: &str) -> Option<serde_json::Result<String>> {
        self.circuit_info(name).map(|info| serde_json::to_string(&info))
    }

    /// Generate a Groth16 proof for `assignment` against the named circuit,
    /// and extract its public sub-witness.
    #[instrument(skip(self, assignment, rng), fields(curve = self.descriptor.name, circuit = name))]
    pub fn prove<C, R>(
        &self,
        name: &str,
        assignment: C,
        rng: &mut R,
    ) -> Result<(ark_groth16::Proof<E>, Witness<E::ScalarField>), ProveError>
    where
        C: ConstraintSynthesizer<E::ScalarField> + Clone,
        R: RngCore + CryptoRng,
    {
        let compiled = self.get(name).ok_or_else(|| ProveError::UnknownCircuit(name.to_string()))?;

        // Synthesize once, outside the lock, to both extract the public
        // inputs and obtain a fresh circuit clone for proving — the lock was
        // already released by `self.get`.
        let cs = ConstraintSystem::<E::ScalarField>::new_ref();
        cs.set_mode(SynthesisMode::Prove { construct_matrices: true });
        assignment.clone().generate_constraints(cs.clone()).map_err(|e| ProveError::Backend {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if !cs.is_satisfied().map_err(|e| ProveError::Backend { name: name.to_string(), reason: e.to_string() })? {
            return Err(ProveError::UnsatisfiableWitness(name.to_string()));
        }
        let public_inputs: Vec<E::ScalarField> = cs.borrow().expect("cs still held by us").instance_assignment[1..].to_vec();

        let start = Instant::now();
        let proof = Groth16::<E>::create_random_proof_with_reduction(assignment, &compiled.pk, rng)
            .map_err(|e| ProveError::Backend { name: name.to_string(), reason: e.to_string() })?;
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "proof generated");

        let witness = Witness::new(self.descriptor.id, public_inputs, Vec::new());
        Ok((proof, witness))
    }

    /// Verify `proof` against the named circuit's verifying key and the
    /// supplied public witness.
    #[instrument(skip(self, proof, public_witness), fields(curve = self.descriptor.name, circuit = name))]
    pub fn verify(
        &self,
        name: &str,
        public_witness: &Witness<E::ScalarField>,
        proof: &ark_groth16::Proof<E>,
    ) -> Result<(), VerifyError> {
        let compiled = self.get(name).ok_or_else(|| VerifyError::UnknownCircuit(name.to_string()))?;
        let ok = Groth16::<E>::verify_proof(&compiled.pvk, proof, &public_witness.public)
            .map_err(|e| VerifyError::Backend { name: name.to_string(), reason: e.to_string() })?;
        if ok {
            Ok(())
        } else {
            Err(VerifyError::VerificationFailed(name.to_string()))
        }
    }

}

impl CurveProver<ark_bn254::Bn254> {
    /// Export the named circuit's verifying key as a deterministic Solidity
    /// verifier source string. Only meaningful on the wrapper curve (C_W):
    /// it is the only curve whose proofs are ever deployed on-chain, and the
    /// only one whose G2 coordinate shape the template assumes.
    pub fn export_verifier(&self, name: &str) -> Result<String, ExportError> {
        let compiled = self.get(name).ok_or_else(|| ExportError::UnknownCircuit(name.to_string()))?;
        solidity::render_verifier(name, &compiled.vk)
            .map_err(|e| ExportError::Render { name: name.to_string(), reason: e.to_string() })
    }
}

/// Metadata about a compiled circuit, for the request surface.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CircuitInfo {
    /// Name the circuit is registered under.
    pub name: String,
    /// Content hash of its constraint system.
    pub cs_hash: String,
    /// Number of constraints.
    pub num_constraints: usize,
    /// Number of public variables (including the implicit constant `1`).
    pub num_public_variables: usize,
    /// Number of secret variables.
    pub num_secret_variables: usize,
}

/// Convenience alias for a key-cache root path, used across the pipeline.
pub type KeyCacheRoot = PathBuf;
