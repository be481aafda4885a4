//! Opaque peer identifier.

use sbor::prelude::*;
use std::fmt;

/// A network peer identifier.
///
/// Assigned by the transport layer; the synchronizer treats it as an opaque
/// 32-byte value suitable for map keys and wire framing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// Size of a peer id in bytes.
    pub const BYTES: usize = 32;

    /// Construct from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a random peer id (tests and local identities).
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough to tell peers apart in logs.
        write!(f, "{}", hex::encode(&self.0[..6]))
    }
}
