//! Error taxonomy for the recursive aggregation core.
//!
//! Each variant here corresponds to one of the error *kinds* carved out by the
//! design (configuration, compilation, setup, persistence, witness, chain
//! integrity, prove/verify, pool, cancellation). Errors are returned, never
//! retried internally, and never silently converted into a different kind —
//! the only layer that recovers locally is the key cache loader, which treats
//! a corrupt or mismatched cache as equivalent to "no cache" and regenerates.

use thiserror::Error;

/// Errors raised while registering or compiling a circuit onto a curve prover.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The circuit description does not synthesize against the curve's
    /// scalar field (e.g. a constraint referenced an unallocated variable).
    #[error("circuit `{name}` failed to compile: {reason}")]
    Synthesis {
        /// Name the circuit was being registered under.
        name: String,
        /// Underlying synthesis failure, stringified.
        reason: String,
    },
    /// The circuit description is structurally incompatible with the curve's
    /// role (e.g. registering the wrapper circuit on a non-wrapper prover).
    #[error("circuit `{name}` is not valid for curve role {role:?}")]
    RoleMismatch {
        /// Name the circuit was being registered under.
        name: String,
        /// The curve role that rejected the circuit.
        role: crate::curve::CurveRole,
    },
}

/// Errors raised by Groth16 trusted setup.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The underlying `ark-groth16` setup routine aborted.
    #[error("groth16 setup aborted for circuit `{name}`: {reason}")]
    Aborted {
        /// Name of the circuit being set up.
        name: String,
        /// Underlying failure, stringified.
        reason: String,
    },
}

/// Errors raised while saving or loading a compiled circuit's on-disk cache.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// An IO failure occurred reading or writing one of the four cache files.
    #[error("key cache IO error at {path}: {source}")]
    Io {
        /// Path of the file that failed.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A cache file existed but failed to deserialize into its typed form.
    #[error("key cache deserialization error at {path}: {reason}")]
    Deserialize {
        /// Path of the file that failed.
        path: String,
        /// Deserialization failure, stringified.
        reason: String,
    },
}

/// Errors raised while constructing a witness from an assignment or a raw
/// external witness map.
#[derive(Debug, Error)]
pub enum WitnessError {
    /// A named witness value was not valid in its field's encoding.
    #[error("witness value `{field}` is not a valid field element: {value}")]
    InvalidValue {
        /// Name of the witness entry.
        field: String,
        /// The raw string that failed to parse.
        value: String,
    },
    /// A required witness entry was missing.
    #[error("witness is missing required field `{field}`")]
    MissingField {
        /// Name of the missing entry.
        field: String,
    },
    /// An array-shaped witness input had the wrong length (e.g. the inner
    /// proof/witness arrays fed to the aggregator did not have length N).
    #[error("witness array `{field}` has length {actual}, expected {expected}")]
    WrongLength {
        /// Name of the array-shaped entry.
        field: String,
        /// Length actually supplied.
        actual: usize,
        /// Length required.
        expected: usize,
    },
    /// The binary witness layout (12-byte header + 32-byte elements) was
    /// malformed.
    #[error("malformed witness encoding: {0}")]
    MalformedEncoding(String),
}

/// Errors raised while generating a proof.
#[derive(Debug, Error)]
pub enum ProveError {
    /// The named circuit has not been registered on this prover.
    #[error("unknown circuit `{0}`")]
    UnknownCircuit(String),
    /// Constructing the full witness from the assignment failed.
    #[error(transparent)]
    Witness(#[from] WitnessError),
    /// The constraint system was not satisfied by the supplied assignment.
    #[error("assignment does not satisfy circuit `{0}`'s constraints")]
    UnsatisfiableWitness(String),
    /// The underlying `ark-groth16` prover returned an error.
    #[error("groth16 proving failed for `{name}`: {reason}")]
    Backend {
        /// Name of the circuit being proved.
        name: String,
        /// Underlying failure, stringified.
        reason: String,
    },
}

/// Errors raised while verifying a proof.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The named circuit has not been registered on this prover.
    #[error("unknown circuit `{0}`")]
    UnknownCircuit(String),
    /// The proof did not verify against the circuit's verifying key.
    #[error("proof failed to verify against circuit `{0}`")]
    VerificationFailed(String),
    /// The underlying pairing check itself errored (as opposed to returning
    /// `false`), e.g. a malformed proof that is not even a valid group point.
    #[error("groth16 verification errored for `{name}`: {reason}")]
    Backend {
        /// Name of the circuit being verified.
        name: String,
        /// Underlying failure, stringified.
        reason: String,
    },
}

/// Errors raised while exporting a Solidity verifier.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The named circuit has not been registered on this prover.
    #[error("unknown circuit `{0}`")]
    UnknownCircuit(String),
    /// Template rendering failed (should not happen for a well-formed VK).
    #[error("solidity export failed for `{name}`: {reason}")]
    Render {
        /// Name of the circuit being exported.
        name: String,
        /// Underlying failure, stringified.
        reason: String,
    },
}

/// Errors raised by the aggregation pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The inner circuit has not yet been registered on the inner prover.
    #[error("inner circuit `{0}` is not registered")]
    InnerCircuitNotRegistered(String),
    /// The state-root chain across a batch of inner results was broken.
    #[error("state-root chain broken at index {index}: post-root of proof {index} does not equal pre-root of proof {next}")]
    ChainBroken {
        /// Index of the inner result whose post-root did not match.
        index: usize,
        /// Index of the following inner result.
        next: usize,
    },
    /// `Aggregate` was called with a buffer whose length is not exactly N.
    #[error("aggregation requires exactly {expected} inner proofs, got {actual}")]
    WrongBatchSize {
        /// Number of inner proofs supplied.
        actual: usize,
        /// Aggregation width N.
        expected: usize,
    },
    /// Proving on the aggregator or wrapper circuit failed.
    #[error(transparent)]
    Prove(#[from] ProveError),
    /// Eagerly registering the aggregator or wrapper circuit at pipeline
    /// construction time failed.
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// The operation observed cancellation at one of its check-points.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

/// Errors raised by the parallel proving pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// `Submit` was called after `Close`.
    #[error("pool is closed")]
    Closed,
}

/// Errors surfaced at the request-surface boundary, pre-classified into the
/// three buckets the HTTP layer (built by an external collaborator) maps onto
/// 4xx/5xx status codes.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed witness input — maps to `BadRequest` / HTTP 400.
    #[error(transparent)]
    BadRequest(#[from] WitnessError),
    /// Unknown circuit name — maps to `NotFound` / HTTP 404.
    #[error("unknown circuit `{0}`")]
    NotFound(String),
    /// Proof generation failed — maps to `UnprocessableEntity` / HTTP 422.
    #[error(transparent)]
    UnprocessableEntity(#[from] ProveError),
}
