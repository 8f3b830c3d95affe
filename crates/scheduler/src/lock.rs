//! Leased mutex shared by cooperating coordinator instances.
//!
//! A lease expires on its own after its TTL, so a crashed holder never
//! blocks a task for longer than that. Only the owner may release or
//! refresh a lease.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::LockError;

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Take the lease if free or expired. `false` if someone else holds it.
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Release a lease held by this instance.
    async fn unlock(&self, key: &str) -> Result<(), LockError>;

    /// Push the expiry of a held lease to `ttl` from now.
    async fn refresh(&self, key: &str, ttl: Duration) -> Result<(), LockError>;

    /// Whether anyone currently holds an unexpired lease.
    async fn is_locked(&self, key: &str) -> Result<bool, LockError>;
}

// ── In-memory lease table ───────────────────────────────────────────

#[derive(Debug, Clone)]
struct Lease {
    owner: String,
    expires_at: Instant,
}

/// Lease storage shared by several [`InMemoryLock`] handles, one per
/// simulated instance.
#[derive(Debug, Default)]
pub struct InMemoryLeaseTable {
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLeaseTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A lock handle acting as instance `owner`.
    pub fn handle(self: &Arc<Self>, owner: impl Into<String>) -> InMemoryLock {
        InMemoryLock {
            table: Arc::clone(self),
            owner: owner.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryLock {
    table: Arc<InMemoryLeaseTable>,
    owner: String,
}

impl InMemoryLock {
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut leases = self.table.leases.lock().await;
        let now = Instant::now();
        if let Some(lease) = leases.get(key) {
            if lease.expires_at > now {
                debug!(key, holder = %lease.owner, "lease busy");
                return Ok(false);
            }
        }
        leases.insert(
            key.to_string(),
            Lease {
                owner: self.owner.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn unlock(&self, key: &str) -> Result<(), LockError> {
        let mut leases = self.table.leases.lock().await;
        match leases.get(key) {
            Some(lease) if lease.owner == self.owner => {
                leases.remove(key);
                Ok(())
            }
            _ => Err(LockError::NotHeld {
                key: key.to_string(),
            }),
        }
    }

    async fn refresh(&self, key: &str, ttl: Duration) -> Result<(), LockError> {
        let mut leases = self.table.leases.lock().await;
        let now = Instant::now();
        match leases.get_mut(key) {
            Some(lease) if lease.owner == self.owner && lease.expires_at > now => {
                lease.expires_at = now + ttl;
                Ok(())
            }
            _ => Err(LockError::NotHeld {
                key: key.to_string(),
            }),
        }
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        let leases = self.table.leases.lock().await;
        Ok(leases
            .get(key)
            .is_some_and(|lease| lease.expires_at > Instant::now()))
    }
}

// ── Lease helper ────────────────────────────────────────────────────

/// Run `work` while holding `key`.
///
/// Returns `Ok(None)` without running `work` if the lease is held
/// elsewhere. With `refresh_every`, the lease is extended periodically
/// while `work` runs. The lease is released once `work` finishes; `work`
/// should not panic (spawn it and await the handle if it might).
pub async fn with_lease<F, T>(
    lock: &dyn DistributedLock,
    key: &str,
    ttl: Duration,
    refresh_every: Option<Duration>,
    work: F,
) -> Result<Option<T>, LockError>
where
    F: Future<Output = T>,
{
    if !lock.try_lock(key, ttl).await? {
        return Ok(None);
    }

    let output = match refresh_every {
        None => work.await,
        Some(period) => {
            tokio::pin!(work);
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    out = &mut work => break out,
                    _ = ticker.tick() => {
                        if let Err(e) = lock.refresh(key, ttl).await {
                            warn!(key, error = %e, "lease refresh failed");
                        }
                    }
                }
            }
        }
    };

    if let Err(e) = lock.unlock(key).await {
        warn!(key, error = %e, "lease release failed");
    }
    Ok(Some(output))
}
