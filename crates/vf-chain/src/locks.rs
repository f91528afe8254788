//! Entity-scoped exclusive locks.
//!
//! One mutex per issuing entity, created on first use and kept for the life
//! of the process. Holding an issuer's lock spans predecessor read through
//! ledger append, so two lifecycle events for the same issuer can never
//! link to the same head. Different issuers never contend.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use vf_core::TaxId;

/// Registry of per-issuer locks.
#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Handle to one issuer's lock.
#[derive(Debug, Clone)]
pub struct EntityLock {
    issuer: String,
    mutex: Arc<Mutex<()>>,
}

impl EntityLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `issuer`, created if absent.
    pub fn for_issuer(&self, issuer: &TaxId) -> EntityLock {
        let mutex = self
            .locks
            .entry(issuer.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        EntityLock {
            issuer: issuer.as_str().to_string(),
            mutex,
        }
    }

    /// Number of issuers seen.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True if no issuer has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl EntityLock {
    /// Block until the issuer's lock is free, then hold it until the guard
    /// drops.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        if let Some(guard) = self.mutex.try_lock() {
            return guard;
        }
        tracing::debug!(issuer = %self.issuer, "waiting for entity lock");
        self.mutex.lock()
    }

    /// The issuer this lock protects.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}
