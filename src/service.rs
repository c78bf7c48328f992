//! Witness Factory + Request Surface (spec §4.7).
//!
//! `CreateAssignment` is the sole seam between external, weakly-typed
//! witness maps and the prover's strongly-typed circuit assignments.
//! `ProverService` wraps one curve prover plus a witness factory and
//! classifies failures into the three buckets an external HTTP layer would
//! map onto 4xx/5xx (spec §7) — this module stops at that classification;
//! binding an actual listener is out of scope (spec.md §1 Non-goals).
//!
//! Grounded in the teacher's `api.rs` `ProverBuilder`/`VerifierBuilder`
//! ergonomic-wrapper idiom, adapted from a builder into a request/response
//! service object.

use std::collections::HashMap;

use ark_ec::pairing::Pairing;
use ark_ff::PrimeField;
use ark_groth16::Proof;
use ark_relations::r1cs::ConstraintSynthesizer;
use ark_std::rand::{CryptoRng, RngCore};
use tracing::instrument;

use crate::error::{ServiceError, WitnessError};
use crate::prover::{CircuitInfo, CurveProver};
use crate::witness::Witness;

/// Converts a language-agnostic witness map (each value either a decimal
/// integer or a `0x`-prefixed hex string) into a typed circuit assignment
/// for the named circuit.
pub trait CreateAssignment<F: PrimeField, C> {
    fn create_assignment(&self, circuit_name: &str, witness: &HashMap<String, String>) -> Result<C, WitnessError>;
}

/// Parse one witness value, accepting either a decimal integer or a
/// `0x`-prefixed hex string (spec §4.7).
pub fn parse_field_value<F: PrimeField>(field: &str, value: &str) -> Result<F, WitnessError> {
    if let Some(hex_digits) = value.strip_prefix("0x") {
        let bytes = hex::decode(hex_digits)
            .map_err(|e| WitnessError::InvalidValue { field: field.to_string(), value: e.to_string() })?;
        Ok(F::from_be_bytes_mod_order(&bytes))
    } else {
        value
            .parse::<u128>()
            .map(F::from)
            .map_err(|e| WitnessError::InvalidValue { field: field.to_string(), value: e.to_string() })
    }
}

/// Look up a required entry in a witness map, as a typed field element.
pub fn require_field<F: PrimeField>(witness: &HashMap<String, String>, field: &str) -> Result<F, WitnessError> {
    let raw = witness
        .get(field)
        .ok_or_else(|| WitnessError::MissingField { field: field.to_string() })?;
    parse_field_value(field, raw)
}

/// A curve prover plus the witness factory that builds its assignments.
pub struct ProverService<E: Pairing, C, WF: CreateAssignment<E::ScalarField, C>> {
    prover: std::sync::Arc<CurveProver<E>>,
    factory: WF,
    _circuit: std::marker::PhantomData<C>,
}

impl<E, C, WF> ProverService<E, C, WF>
where
    E: Pairing,
    C: ConstraintSynthesizer<E::ScalarField> + Clone,
    WF: CreateAssignment<E::ScalarField, C>,
{
    pub fn new(prover: std::sync::Arc<CurveProver<E>>, factory: WF) -> Self {
        Self { prover, factory, _circuit: std::marker::PhantomData }
    }

    /// `GET /circuits` — list registered circuits with metadata.
    pub fn list_circuits(&self) -> Vec<CircuitInfo> {
        self.prover
            .circuit_names()
            .into_iter()
            .filter_map(|name| self.prover.circuit_info(&name))
            .collect()
    }

    /// `GET /circuits/{name}` — metadata for one circuit, `None` maps to 404.
    pub fn circuit_info(&self, name: &str) -> Option<CircuitInfo> {
        self.prover.circuit_info(name)
    }

    /// `POST /prove/{circuit}` — the request surface's core operation:
    /// convert the raw witness map, then prove.
    #[instrument(skip(self, witness, rng), fields(circuit = circuit_name))]
    pub fn prove<R: RngCore + CryptoRng>(
        &self,
        circuit_name: &str,
        witness: &HashMap<String, String>,
        rng: &mut R,
    ) -> Result<(Proof<E>, Witness<E::ScalarField>), ServiceError> {
        if self.prover.circuit_info(circuit_name).is_none() {
            return Err(ServiceError::NotFound(circuit_name.to_string()));
        }
        let assignment = self.factory.create_assignment(circuit_name, witness)?;
        let (proof, public_witness) = self.prover.prove(circuit_name, assignment, rng)?;
        Ok((proof, public_witness))
    }
}

impl<C, WF> ProverService<ark_bn254::Bn254, C, WF>
where
    C: ConstraintSynthesizer<ark_bn254::Fr> + Clone,
    WF: CreateAssignment<ark_bn254::Fr, C>,
{
    /// `GET /verifier/{circuit}` — exported Solidity verifier text.
    pub fn export_verifier(&self, circuit_name: &str) -> Result<String, ServiceError> {
        self.prover
            .export_verifier(circuit_name)
            .map_err(|e| ServiceError::NotFound(format!("{circuit_name}: {e}")))
    }
}
