//! Key Persistence (spec §4.2, §6).
//!
//! For a circuit named `X` cached under root `K`, the directory `K/X/`
//! contains four files:
//!
//! | file          | content                                     |
//! |---------------|----------------------------------------------|
//! | circuit.r1cs  | serialized CS (this crate's canonical form)   |
//! | proving.key   | serialized PK                                 |
//! | verifying.key | serialized VK                                 |
//! | circuit.hash  | hex SHA-256 of the CS serialization, ASCII    |
//!
//! `SaveTo` writes the four files in that order so the hash file — the cache
//! invalidation primitive — is written last. A crash between writes therefore
//! always leaves either no hash file or a hash file that is the true digest
//! of whatever CS bytes made it to disk; `LoadFrom` (by way of the caller
//! re-hashing a freshly compiled CS and comparing) never trusts a partial
//! write as valid.

use std::path::{Path, PathBuf};

use ark_ec::pairing::Pairing;
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_relations::r1cs::ConstraintMatrices;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use sha2::{Digest, Sha256};

use crate::error::PersistenceError;

const CS_FILE: &str = "circuit.r1cs";
const PK_FILE: &str = "proving.key";
const VK_FILE: &str = "verifying.key";
const HASH_FILE: &str = "circuit.hash";

/// Canonical, hashable serialization of a constraint system's shape.
///
/// This is deliberately independent of the circuit implementation: two
/// compilations of the same circuit description against the same curve
/// produce byte-identical `CsDigestInput`s, which is the property the cache
/// invalidation and the "hash determinism" test (spec §8) both rely on.
pub fn serialize_matrices<F: ark_ff::PrimeField>(m: &ConstraintMatrices<F>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(m.num_instance_variables as u64).to_le_bytes());
    out.extend_from_slice(&(m.num_witness_variables as u64).to_le_bytes());
    out.extend_from_slice(&(m.num_constraints as u64).to_le_bytes());
    for matrix in [&m.a, &m.b, &m.c] {
        out.extend_from_slice(&(matrix.len() as u64).to_le_bytes());
        for row in matrix {
            out.extend_from_slice(&(row.len() as u64).to_le_bytes());
            for (coeff, col) in row {
                coeff
                    .serialize_compressed(&mut out)
                    .expect("serialization into a Vec cannot fail");
                out.extend_from_slice(&(*col as u64).to_le_bytes());
            }
        }
    }
    out
}

/// Hex SHA-256 of a constraint system's canonical serialization — the
/// circuit's identity (spec §3).
pub fn hash_cs_bytes(cs_bytes: &[u8]) -> String {
    let digest = Sha256::digest(cs_bytes);
    hex::encode(digest)
}

/// A compiled circuit's (CS bytes, PK, VK) triple for one curve, as read from
/// or about to be written to disk.
pub struct PersistedKeys<E: Pairing> {
    /// Opaque, canonical CS bytes (see [`serialize_matrices`]).
    pub cs_bytes: Vec<u8>,
    /// Groth16 proving key.
    pub pk: ProvingKey<E>,
    /// Groth16 verifying key.
    pub vk: VerifyingKey<E>,
}

fn io_err(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io { path: path.display().to_string(), source }
}

/// Write `{CS, PK, VK, hash}` atomically, in that order, to `dir/<name>/`.
/// The directory is created if it does not exist.
pub fn save_to<E: Pairing>(dir: &Path, name: &str, keys: &PersistedKeys<E>) -> Result<(), PersistenceError> {
    let circuit_dir = dir.join(name);
    std::fs::create_dir_all(&circuit_dir).map_err(|e| io_err(&circuit_dir, e))?;

    let cs_path = circuit_dir.join(CS_FILE);
    std::fs::write(&cs_path, &keys.cs_bytes).map_err(|e| io_err(&cs_path, e))?;

    let pk_path = circuit_dir.join(PK_FILE);
    let mut pk_bytes = Vec::new();
    keys.pk
        .serialize_compressed(&mut pk_bytes)
        .expect("serialization into a Vec cannot fail");
    std::fs::write(&pk_path, &pk_bytes).map_err(|e| io_err(&pk_path, e))?;

    let vk_path = circuit_dir.join(VK_FILE);
    let mut vk_bytes = Vec::new();
    keys.vk
        .serialize_compressed(&mut vk_bytes)
        .expect("serialization into a Vec cannot fail");
    std::fs::write(&vk_path, &vk_bytes).map_err(|e| io_err(&vk_path, e))?;

    // Hash file last: its presence and correctness is the cache-valid signal.
    let hash_path = circuit_dir.join(HASH_FILE);
    std::fs::write(&hash_path, hash_cs_bytes(&keys.cs_bytes)).map_err(|e| io_err(&hash_path, e))?;

    Ok(())
}

/// Directory holding a circuit's cache entry, for callers that want to probe
/// its hash without loading the (possibly large) keys.
pub fn circuit_dir(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// Read the cached hash for `name`, if present. A missing or unreadable hash
/// file is treated as "no cache" rather than an error, per spec §4.1/§7.
pub fn read_cached_hash(dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(circuit_dir(dir, name).join(HASH_FILE))
        .ok()
        .map(|s| s.trim().to_string())
}

/// Load `{CS, PK, VK}` from `dir/<name>/`. Any IO or deserialization failure
/// is returned unchanged — the caller (the key-cache loader in `prover.rs`)
/// is responsible for treating that as "no usable cache" and falling back to
/// setup, per spec §4.1 ("partial cache read failure is non-fatal").
pub fn load_from<E: Pairing>(dir: &Path, name: &str) -> Result<PersistedKeys<E>, PersistenceError> {
    let circuit_dir = circuit_dir(dir, name);

    let cs_path = circuit_dir.join(CS_FILE);
    let cs_bytes = std::fs::read(&cs_path).map_err(|e| io_err(&cs_path, e))?;

    let pk_path = circuit_dir.join(PK_FILE);
    let pk_bytes = std::fs::read(&pk_path).map_err(|e| io_err(&pk_path, e))?;
    let pk = ProvingKey::<E>::deserialize_compressed(pk_bytes.as_slice())
        .map_err(|e| PersistenceError::Deserialize { path: pk_path.display().to_string(), reason: e.to_string() })?;

    let vk_path = circuit_dir.join(VK_FILE);
    let vk_bytes = std::fs::read(&vk_path).map_err(|e| io_err(&vk_path, e))?;
    let vk = VerifyingKey::<E>::deserialize_compressed(vk_bytes.as_slice())
        .map_err(|e| PersistenceError::Deserialize { path: vk_path.display().to_string(), reason: e.to_string() })?;

    Ok(PersistedKeys { cs_bytes, pk, vk })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_for_identical_bytes() {
        let a = hash_cs_bytes(b"same constraint system");
        let b = hash_cs_bytes(b"same constraint system");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_changes_with_content() {
        let a = hash_cs_bytes(b"circuit A");
        let b = hash_cs_bytes(b"circuit B");
        assert_ne!(a, b);
    }

    #[test]
    fn missing_cache_hash_is_none_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_cached_hash(dir.path(), "nonexistent"), None);
    }
}
