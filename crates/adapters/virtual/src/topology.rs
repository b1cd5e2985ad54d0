//! Static topology — direct controllers plus aggregator routes.

use std::collections::{HashMap, HashSet};

use edgehub_app::ports::Topology;
use edgehub_domain::error::EngineError;
use edgehub_domain::id::ControllerId;

/// Topology over a fixed controller graph.
///
/// A controller is either reachable directly or fronted by an aggregator;
/// anything else is unroutable.
#[derive(Default)]
pub struct VirtualTopology {
    direct: HashSet<ControllerId>,
    routes: HashMap<ControllerId, ControllerId>,
}

impl VirtualTopology {
    /// Register a directly reachable controller.
    #[must_use]
    pub fn controller(mut self, id: impl Into<ControllerId>) -> Self {
        self.direct.insert(id.into());
        self
    }

    /// Register a controller reachable only through `via`.
    #[must_use]
    pub fn route(mut self, behind: impl Into<ControllerId>, via: impl Into<ControllerId>) -> Self {
        self.routes.insert(behind.into(), via.into());
        self
    }
}

impl Topology for VirtualTopology {
    async fn resolve_controller(&self, id: &ControllerId) -> Result<ControllerId, EngineError> {
        if self.direct.contains(id) {
            return Ok(id.clone());
        }
        self.routes
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownController(id.to_string()))
    }
}
