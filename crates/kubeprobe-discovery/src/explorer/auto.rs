use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use kubeprobe_types::Component;

use super::Explorer;
use crate::error::{DiscoveryError, Result};

/// Tries explorers in order and keeps the first result with a running instance
///
/// An explorer error ends the dispatch; only "nothing running" falls through
/// to the next candidate. When every candidate comes up empty the result is
/// an empty list, meaning the component is absent.
pub struct AutoExplorer {
    component: String,
    candidates: Vec<Arc<dyn Explorer>>,
}

impl AutoExplorer {
    pub fn new(component: impl Into<String>, candidates: Vec<Arc<dyn Explorer>>) -> Self {
        Self {
            component: component.into(),
            candidates,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Strategies in the order they are tried
    pub fn strategies(&self) -> Vec<&'static str> {
        self.candidates.iter().map(|c| c.strategy()).collect()
    }
}

#[async_trait]
impl Explorer for AutoExplorer {
    fn strategy(&self) -> &'static str {
        "auto"
    }

    async fn components(&self) -> Result<Vec<Component>> {
        for candidate in &self.candidates {
            let found = candidate
                .components()
                .await
                .map_err(|e| DiscoveryError::Explorer {
                    strategy: candidate.strategy(),
                    source: Box::new(e),
                })?;

            if found.iter().any(|c| c.is_running) {
                debug!(
                    component = %self.component,
                    strategy = candidate.strategy(),
                    instances = found.len(),
                    "component found"
                );
                return Ok(found);
            }

            debug!(
                component = %self.component,
                strategy = candidate.strategy(),
                "no running instance"
            );
        }

        Ok(Vec::new())
    }
}
