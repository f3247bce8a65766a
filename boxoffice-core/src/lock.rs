//! Best-effort mutual exclusion keyed by an arbitrary string.
//!
//! The lock only suppresses duplicate work for identical concurrent requests.
//! Correctness of seat assignment never depends on it: the store's
//! conditional update is the linearization point.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

/// Ownership token handed out on acquire and required on release.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("lock backend failure: {0}")]
pub struct LockError(#[source] pub Box<dyn Error + Send + Sync>);

impl LockError {
    pub fn backend(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

#[async_trait]
pub trait DistributedLock: Send + Sync + 'static {
    /// Set-if-absent with a lease. `None` means someone else holds the key.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockToken>, LockError>;

    /// Compare-and-delete: only removes the key while `token` still owns it.
    async fn release(&self, key: &str, token: &LockToken) -> Result<(), LockError>;
}
