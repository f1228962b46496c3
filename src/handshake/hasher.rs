//! `hashedData` computation shared with the provider.

use secrecy::{ExposeSecret, SecretString};
use sha3::{Digest, Sha3_512};

/// Hex SHA3-512 over `secret` followed by `parts`, with no separators.
///
/// The provider recomputes this value, so the order of `parts` is part of the
/// protocol and must not change.
#[must_use]
pub fn hash(secret: &str, parts: &[&str]) -> String {
    let mut hasher = Sha3_512::new();
    hasher.update(secret.as_bytes());
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Holds the provider password so it is never copied into logs or `Debug` output.
#[derive(Clone)]
pub struct IntegrityHasher {
    secret: SecretString,
}

impl IntegrityHasher {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    #[must_use]
    pub fn digest(&self, parts: &[&str]) -> String {
        hash(self.secret.expose_secret(), parts)
    }
}

impl std::fmt::Debug for IntegrityHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityHasher")
            .field("secret", &"***")
            .finish()
    }
}
