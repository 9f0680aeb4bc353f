//! Stable fingerprints for models and expression trees.

use blake3::Hasher;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }

    /// First 12 hex chars, for log lines.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut h = Hasher::new();
    h.update(bytes);
    Fingerprint(h.finalize().into())
}

/// Fingerprint any serde-serializable value via its JSON encoding.
///
/// Field order follows declaration order, so two structurally equal values
/// always produce the same fingerprint.
pub fn fingerprint_serde<T: Serialize>(v: &T) -> Result<Fingerprint> {
    let bytes = serde_json::to_vec(v).map_err(|e| Error::Hash(e.to_string()))?;
    Ok(fingerprint_bytes(&bytes))
}
