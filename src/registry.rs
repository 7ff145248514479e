//! # Handler registry: event type → ordered handler list.
//!
//! Pure registration state, no execution logic. Handlers for a type run in
//! registration order; duplicates are allowed and all run. Looking up a
//! type with no handlers yields an empty list, which the executor treats
//! as trivial success, not an error.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::handler::HandlerRef;

/// Mapping from event type to the ordered handlers registered for it.
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Vec<HandlerRef>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Appends `handler` to the list for `event_type`.
    ///
    /// No uniqueness check: registering the same handler twice means it
    /// runs twice per event.
    pub async fn register(&self, event_type: impl Into<String>, handler: HandlerRef) {
        let event_type = event_type.into();
        debug!(
            event_type = %event_type,
            handler = %handler.name(),
            "registering handler"
        );
        let mut handlers = self.handlers.write().await;
        handlers.entry(event_type).or_default().push(handler);
    }

    /// Returns the handlers for `event_type`, in registration order.
    ///
    /// Unknown types yield an empty vector.
    pub async fn handlers_for(&self, event_type: &str) -> Vec<HandlerRef> {
        let handlers = self.handlers.read().await;
        handlers.get(event_type).cloned().unwrap_or_default()
    }

    /// Returns the event types that have at least one handler, sorted.
    pub async fn registered_types(&self) -> Vec<String> {
        let handlers = self.handlers.read().await;
        let mut types: Vec<String> = handlers.keys().cloned().collect();
        types.sort_unstable();
        types
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::event::EventRecord;
    use crate::handler::HandlerFn;

    fn noop(name: &'static str) -> HandlerRef {
        HandlerFn::arc(name, |_event: EventRecord| async move {
            Ok::<_, HandlerError>(())
        })
    }

    #[tokio::test]
    async fn test_unknown_type_yields_empty_list() {
        let registry = HandlerRegistry::new();
        assert!(registry.handlers_for("nothing.here").await.is_empty());
    }

    #[tokio::test]
    async fn test_registration_order_is_preserved() {
        let registry = HandlerRegistry::new();
        registry.register("user.created", noop("first")).await;
        registry.register("user.created", noop("second")).await;
        registry.register("user.created", noop("third")).await;

        let handlers = registry.handlers_for("user.created").await;
        let names: Vec<&str> = handlers.iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_duplicates_allowed() {
        let registry = HandlerRegistry::new();
        let handler = noop("dup");
        registry.register("x", handler.clone()).await;
        registry.register("x", handler).await;

        assert_eq!(registry.handlers_for("x").await.len(), 2);
    }

    #[tokio::test]
    async fn test_registered_types_sorted() {
        let registry = HandlerRegistry::new();
        registry.register("b.two", noop("h")).await;
        registry.register("a.one", noop("h")).await;

        assert_eq!(registry.registered_types().await, vec!["a.one", "b.two"]);
    }
}
