//! Recursive Groth16 aggregation core.
//!
//! Ingests N inner batch proofs on an inner curve, recursively verifies
//! them natively inside one aggregation-curve proof, and wraps that proof
//! under field emulation inside a final Ethereum-verifiable proof. Three
//! curves participate, fixed concretely by this crate: BLS12-377 (inner),
//! BW6-761 (aggregation, native recursive verification of BLS12-377), and
//! BN254 (wrapper, Ethereum pairing-precompile compatible).
//!
//! Out of scope: the application-level inner circuit's semantics, any
//! bound HTTP/CLI transport, MPC trusted-setup ceremonies, and network
//! transport of proofs — this crate exposes the orchestration and
//! cryptographic choreography those surfaces are built on top of.

pub mod circuits;
pub mod curve;
pub mod error;
pub mod key_cache;
pub mod pipeline;
pub mod pool;
pub mod prover;
pub mod service;
pub mod solidity;
pub mod wire;
pub mod witness;

pub use curve::{CurveDescriptor, CurveId, CurveRole, AGGREGATION, INNER, WRAPPER};
pub use error::{
    CompileError, ExportError, PersistenceError, PipelineError, PoolError, ProveError, ServiceError, SetupError,
    VerifyError, WitnessError,
};
pub use pipeline::{AggregationPipeline, AggregatedProof, InnerMetadata, InnerProofResult, PipelineConfig, WrappedProof};
pub use pool::{ProveJob, ProveResult, ProvingPool};
pub use prover::{CircuitInfo, CompiledCircuit, CurveProver};
pub use service::{CreateAssignment, ProverService};
pub use witness::Witness;
