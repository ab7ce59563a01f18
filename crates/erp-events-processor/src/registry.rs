//! Handler registration and dispatch selection. The registry holds boxed
//! handler closures keyed by `event_type`, with a secondary list sorted so
//! versioned entries precede the unversioned fallback.

use async_trait::async_trait;
use erp_events_core::{ClassifiedError, HandlerKey, ProcessingContext};
use std::collections::HashMap;

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: &mut ProcessingContext) -> Result<(), ClassifiedError>;
}

#[async_trait]
impl<F> EventHandler for F
where
    F: Fn(&mut ProcessingContext) -> Result<(), ClassifiedError> + Send + Sync,
{
    async fn handle(&self, ctx: &mut ProcessingContext) -> Result<(), ClassifiedError> {
        self(ctx)
    }
}

struct Registration {
    event_version: Option<String>,
    handler: Box<dyn EventHandler>,
}

/// Handlers registered per `event_type`, kept sorted so that
/// version-specific entries precede the unversioned fallback.
#[derive(Default)]
pub struct HandlerRegistry {
    by_event_type: HashMap<String, Vec<Registration>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `key`. Re-registering the same
    /// `(event_type, event_version)` replaces the prior entry.
    pub fn register<H: EventHandler + 'static>(&mut self, key: HandlerKey, handler: H) {
        let entries = self.by_event_type.entry(key.event_type).or_default();
        entries.retain(|r| r.event_version != key.event_version);
        entries.push(Registration {
            event_version: key.event_version,
            handler: Box::new(handler),
        });
        entries.sort_by_key(|r| r.event_version.is_none());
    }

    /// Select the handler for `(event_type, event_version)`: the first entry
    /// whose `event_version` matches, else the unversioned fallback, else
    /// `None`.
    pub fn select(&self, event_type: &str, event_version: &str) -> Option<&dyn EventHandler> {
        let entries = self.by_event_type.get(event_type)?;
        entries
            .iter()
            .find(|r| r.event_version.as_deref() == Some(event_version))
            .or_else(|| entries.iter().find(|r| r.event_version.is_none()))
            .map(|r| r.handler.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use erp_events_core::ProcessingContext;

    fn noop_ctx() -> ProcessingContext {
        ProcessingContext::new(Vec::new(), None, 1)
    }

    #[tokio::test]
    async fn versioned_entry_takes_precedence_over_fallback() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            HandlerKey::new("orders.created", None, "billing"),
            |_ctx: &mut ProcessingContext| Err(ClassifiedError::new(erp_events_core::ErrorTag::Transient, "fallback")),
        );
        registry.register(
            HandlerKey::new("orders.created", Some("v1".into()), "billing"),
            |_ctx: &mut ProcessingContext| Ok(()),
        );

        let handler = registry.select("orders.created", "v1").unwrap();
        let mut ctx = noop_ctx();
        assert!(handler.handle(&mut ctx).await.is_ok());
    }

    #[tokio::test]
    async fn falls_back_when_no_version_match() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            HandlerKey::new("orders.created", None, "billing"),
            |_ctx: &mut ProcessingContext| Ok(()),
        );
        registry.register(
            HandlerKey::new("orders.created", Some("v1".into()), "billing"),
            |_ctx: &mut ProcessingContext| Err(ClassifiedError::new(erp_events_core::ErrorTag::Transient, "v1")),
        );

        let handler = registry.select("orders.created", "v2").unwrap();
        let mut ctx = noop_ctx();
        assert!(handler.handle(&mut ctx).await.is_ok());
    }

    #[test]
    fn select_returns_none_for_unknown_event_type() {
        let registry = HandlerRegistry::new();
        assert!(registry.select("unknown.event", "v1").is_none());
    }

    #[tokio::test]
    async fn re_registering_same_key_replaces_entry() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            HandlerKey::new("orders.created", Some("v1".into()), "billing"),
            |_ctx: &mut ProcessingContext| Err(ClassifiedError::new(erp_events_core::ErrorTag::Transient, "old")),
        );
        registry.register(
            HandlerKey::new("orders.created", Some("v1".into()), "billing"),
            |_ctx: &mut ProcessingContext| Ok(()),
        );
        let handler = registry.select("orders.created", "v1").unwrap();
        let mut ctx = noop_ctx();
        assert!(handler.handle(&mut ctx).await.is_ok());
    }
}
