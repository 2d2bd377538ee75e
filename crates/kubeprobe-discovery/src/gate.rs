//! Bounded concurrency for remote work
//!
//! Per-node calls admit through a gate, so no more than the configured limit
//! are in flight at once.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{DiscoveryError, Result};

/// Caps the number of operations in flight at once
///
/// Each operation holds the permit returned by [`AdmissionGate::admit`] for
/// as long as it runs; at most `limit` permits exist.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    limit: usize,
}

impl AdmissionGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DiscoveryError::GateClosed)
    }
}
