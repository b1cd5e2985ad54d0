//! Topology port — routing device references across the controller tier.

use std::future::Future;

use edgehub_domain::error::EngineError;
use edgehub_domain::id::ControllerId;

/// Resolves which reachable controller owns a device reference.
///
/// In a multi-hop deployment the answer may be an intermediate aggregator
/// that fronts the named field controller; the transport delivers through
/// it transparently.
pub trait Topology {
    /// Resolve the controller responsible for `controller`.
    ///
    /// Returns [`EngineError::UnknownController`] when the name is not
    /// routable from here.
    fn resolve_controller(
        &self,
        controller: &ControllerId,
    ) -> impl Future<Output = Result<ControllerId, EngineError>> + Send;
}

impl<T: Topology + Send + Sync> Topology for std::sync::Arc<T> {
    fn resolve_controller(
        &self,
        controller: &ControllerId,
    ) -> impl Future<Output = Result<ControllerId, EngineError>> + Send {
        (**self).resolve_controller(controller)
    }
}
