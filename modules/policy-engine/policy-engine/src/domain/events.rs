//! Domain change events and the synchronous event bus.
//!
//! Handlers run on the publishing thread, in subscription order. A failing
//! handler never prevents the remaining handlers from running; `publish`
//! returns the first failure after the full pass so a transactional caller
//! can propagate it. The bus itself never rolls anything back.

use std::sync::Arc;

use parking_lot::RwLock;
use policy_engine_sdk::PolicyEngineError;
use uuid::Uuid;

use crate::domain::retrieval::PolicyRetrievalPoint;

/// A change that downstream caches and views must observe.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// Policy data changed (create/update/delete or a committed membership
    /// delta with no role component).
    PolicyChanged { policy_names: Vec<String> },
    /// The permission set of one role changed.
    RolePermissionsChanged { role_id: Uuid },
}

/// Subscriber on the domain event bus.
pub trait DomainEventHandler: Send + Sync {
    /// Stable handler name, used in failure logs.
    fn name(&self) -> &'static str;

    /// React to one event.
    ///
    /// # Errors
    ///
    /// Any error is isolated from sibling handlers and reported to the
    /// publisher after the dispatch pass.
    fn handle(&self, event: &DomainEvent) -> Result<(), PolicyEngineError>;
}

/// Process-wide bus with an explicit subscriber registry.
///
/// Subscriptions happen at wiring time; dispatch is synchronous.
#[derive(Default)]
pub struct DomainEventBus {
    handlers: RwLock<Vec<Arc<dyn DomainEventHandler>>>,
}

impl DomainEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; dispatch order is subscription order.
    pub fn subscribe(&self, handler: Arc<dyn DomainEventHandler>) {
        self.handlers.write().push(handler);
    }

    /// Dispatch `event` to every handler.
    ///
    /// # Errors
    ///
    /// The first handler error, after all handlers ran.
    pub fn publish(&self, event: &DomainEvent) -> Result<(), PolicyEngineError> {
        let handlers = self.handlers.read().clone();
        let mut first_error = None;
        for handler in handlers {
            if let Err(e) = handler.handle(event) {
                tracing::warn!(
                    handler = handler.name(),
                    error = %e,
                    "event handler failed, continuing dispatch"
                );
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Built-in subscriber keeping the policy retrieval cache coherent.
pub struct PolicyCacheInvalidator {
    retrieval: Arc<PolicyRetrievalPoint>,
}

impl PolicyCacheInvalidator {
    #[must_use]
    pub fn new(retrieval: Arc<PolicyRetrievalPoint>) -> Self {
        Self { retrieval }
    }
}

impl DomainEventHandler for PolicyCacheInvalidator {
    fn name(&self) -> &'static str {
        "policy_cache_invalidator"
    }

    fn handle(&self, event: &DomainEvent) -> Result<(), PolicyEngineError> {
        match event {
            DomainEvent::PolicyChanged { .. } | DomainEvent::RolePermissionsChanged { .. } => {
                self.retrieval.evict_all();
            }
        }
        Ok(())
    }
}
