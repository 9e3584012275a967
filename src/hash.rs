//! Content and context fingerprints
//!
//! Both are SHA-256 digests. They are only ever compared for equality to
//! decide whether a cache entry can be reused; their layout is not a stable
//! format.

use serde::Serialize;
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Fingerprint of raw source bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(Output<Sha256>);

impl ContentHash {
    /// Hash file content
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hasher.finalize())
    }

    /// Hash optional content, distinguishing "absent" from "empty"
    pub fn of_optional(content: Option<&[u8]>) -> Self {
        let mut hasher = Sha256::new();
        match content {
            Some(bytes) => {
                hasher.update([1u8]);
                hasher.update(bytes);
            }
            None => hasher.update([0u8]),
        }
        Self(hasher.finalize())
    }

    /// Hash a serializable value through its JSON form
    pub fn of_serializable<T: Serialize + ?Sized>(value: &T) -> Self {
        let json = serde_json::to_vec(value).unwrap_or_default();
        Self::of(&json)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:.16x})", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Fingerprint of a rule context value
///
/// Rule authors supply the function that computes it; the helpers below cover
/// contexts that implement [`Hash`] or [`Serialize`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHash(Output<Sha256>);

impl ContextHash {
    /// Fingerprint shared by every unit context
    pub fn unit() -> Self {
        Self::from_bytes(&[])
    }

    /// Hash arbitrary bytes describing a context
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize())
    }

    /// Hash a context through its [`Hash`] implementation
    pub fn of_hashable<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = Sha256Hasher(Sha256::new());
        value.hash(&mut hasher);
        Self(hasher.0.finalize())
    }

    /// Hash a context through its JSON form
    pub fn of_serializable<T: Serialize + ?Sized>(value: &T) -> Self {
        let json = serde_json::to_vec(value).unwrap_or_default();
        Self::from_bytes(&json)
    }
}

impl fmt::Debug for ContextHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextHash({:.16x})", self.0)
    }
}

/// Adapter feeding [`Hash`] output into SHA-256
struct Sha256Hasher(Sha256);

impl Hasher for Sha256Hasher {
    fn finish(&self) -> u64 {
        let digest = self.0.clone().finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }
}
