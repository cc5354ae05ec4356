//! Router configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_node_id::MAX_SERVICE_KINDS;

/// Default interval between flow snapshots
const DEFAULT_FLOW_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for a socket router
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Size of the per service kind tables, clamped to what node ids can address
    pub max_services: usize,
    /// Cadence of the flow reporter
    pub flow_interval: Duration,
}

impl RouterConfig {
    /// `max_services` after clamping to the node id range
    #[must_use]
    pub fn service_capacity(&self) -> usize {
        self.max_services.min(MAX_SERVICE_KINDS)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_services: MAX_SERVICE_KINDS,
            flow_interval: DEFAULT_FLOW_INTERVAL,
        }
    }
}
