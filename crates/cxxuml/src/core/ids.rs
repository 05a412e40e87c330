//! Stable participant identifiers
//!
//! Ids are derived from the fully qualified signature with SHA-256, so the
//! same declaration gets the same id across runs, platforms and threads.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier of a diagram participant
///
/// `ParticipantId::NONE` (zero) marks the missing endpoint of pure control
/// markers. Derived ids are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(u64);

impl ParticipantId {
    pub const NONE: ParticipantId = ParticipantId(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Derive the id of a declaration from its qualified signature
    pub fn from_signature(signature: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(signature.as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        // Ids are non-negative as i64; zero is reserved for NONE
        let value = u64::from_be_bytes(prefix) >> 1;
        Self(value.max(1))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Alias used in generated diagram sources
    pub fn alias(&self) -> String {
        format!("C_{:022}", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
