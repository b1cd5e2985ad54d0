//! Rule repository port — read access to externally authored logic rules.
//!
//! Rules are authored and persisted elsewhere (UI, config plumbing); the
//! engine only ever reads them, and treats each rule as immutable during
//! one evaluation pass.

use std::future::Future;

use edgehub_domain::error::EngineError;
use edgehub_domain::id::RuleId;
use edgehub_domain::rule::LogicRule;

/// Read-only repository of [`LogicRule`]s.
pub trait RuleRepository {
    /// Get a rule by its unique identifier.
    fn get(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<LogicRule>, EngineError>> + Send;

    /// Get all enabled rules.
    fn get_enabled(&self) -> impl Future<Output = Result<Vec<LogicRule>, EngineError>> + Send;
}

impl<T: RuleRepository + Send + Sync> RuleRepository for std::sync::Arc<T> {
    fn get(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<LogicRule>, EngineError>> + Send {
        (**self).get(id)
    }

    fn get_enabled(&self) -> impl Future<Output = Result<Vec<LogicRule>, EngineError>> + Send {
        (**self).get_enabled()
    }
}
