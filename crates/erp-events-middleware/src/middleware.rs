//! The onion pipeline shape: each middleware wraps the remaining chain,
//! running code on the way in (`before`) and, if it chose to continue, on
//! the way out (`after`) — generalized from the teacher's ordered
//! `PipelineStage::process` list so the idempotency guard can run its
//! record-outcome step after `next()` returns or throws.

use anyhow::Result;
use async_trait::async_trait;
use erp_events_core::ProcessingContext;

/// What a middleware decided to do in its `before` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Continue to the next middleware (or handler dispatch).
    Continue,
    /// Stop the chain here without invoking downstream middleware or the
    /// handler. The processor still reports success unless `ctx.should_reject`
    /// was also set.
    Skip,
}

#[async_trait]
pub trait Middleware: Send + Sync {
    /// Human-readable name used in tracing output.
    fn name(&self) -> &str;

    /// Runs before the rest of the chain. May mutate `ctx`.
    async fn before(&self, ctx: &mut ProcessingContext) -> Result<Decision>;

    /// Runs after the rest of the chain returns successfully. The default
    /// no-op is correct for middleware that only needs a `before` phase.
    async fn after(&self, _ctx: &mut ProcessingContext) -> Result<()> {
        Ok(())
    }

    /// Runs when the rest of the chain (downstream middleware or the
    /// handler) returned an error. The default no-op is correct for
    /// middleware that does not need to observe failures.
    async fn on_error(&self, _ctx: &mut ProcessingContext, _err: &anyhow::Error) -> Result<()> {
        Ok(())
    }
}

/// An ordered chain of [`Middleware`], executed onion-style.
pub struct Pipeline {
    stages: Vec<Box<dyn Middleware>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    #[must_use]
    pub fn stage<S: Middleware + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every middleware's `before` in registration order, then `handler`,
    /// then every middleware whose `before` ran's `after` in reverse order.
    /// Short-circuits (skipping `handler` and the remaining `before`s) the
    /// moment a middleware returns [`Decision::Skip`] or
    /// `ctx.skip_remaining`/`ctx.should_reject` is set, or propagates an
    /// `Err`. `after` only ever runs over the middleware whose `before`
    /// actually executed.
    pub async fn run<H>(&self, ctx: &mut ProcessingContext, handler: H) -> Result<()>
    where
        H: FnOnce(&mut ProcessingContext) -> futures::future::BoxFuture<'_, Result<()>>,
    {
        let mut entered = Vec::with_capacity(self.stages.len());
        let mut skipped = false;

        for stage in &self.stages {
            tracing::debug!(target: "erp_events.pipeline", stage = stage.name(), "before");
            entered.push(stage.as_ref());
            let decision = stage.before(ctx).await;
            match decision {
                Ok(Decision::Continue) => {
                    if ctx.skip_remaining || ctx.should_reject {
                        skipped = true;
                        break;
                    }
                }
                Ok(Decision::Skip) => {
                    skipped = true;
                    break;
                }
                Err(err) => {
                    return self.unwind_on_error(ctx, &entered, err).await;
                }
            }
        }

        let result = if skipped {
            Ok(())
        } else {
            handler(ctx).await
        };

        match result {
            Ok(()) => {
                for stage in entered.iter().rev() {
                    tracing::debug!(target: "erp_events.pipeline", stage = stage.name(), "after");
                    stage.after(ctx).await?;
                }
                Ok(())
            }
            Err(err) => self.unwind_on_error(ctx, &entered, err).await,
        }
    }

    async fn unwind_on_error(
        &self,
        ctx: &mut ProcessingContext,
        entered: &[&dyn Middleware],
        err: anyhow::Error,
    ) -> Result<()> {
        for stage in entered.iter().rev() {
            stage.on_error(ctx, &err).await?;
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        log: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn before(&self, _ctx: &mut ProcessingContext) -> Result<Decision> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            Ok(Decision::Continue)
        }

        async fn after(&self, _ctx: &mut ProcessingContext) -> Result<()> {
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            Ok(())
        }
    }

    fn ctx() -> ProcessingContext {
        ProcessingContext::new(Vec::new(), Some("application/json".to_string()), 1)
    }

    #[tokio::test]
    async fn after_runs_in_reverse_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .stage(Recorder { name: "a", log: log.clone() })
            .stage(Recorder { name: "b", log: log.clone() });
        let mut ctx = ctx();
        pipeline
            .run(&mut ctx, |_| Box::pin(async { Ok(()) }))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:before", "b:before", "b:after", "a:after"]
        );
    }

    struct Skipper;

    #[async_trait]
    impl Middleware for Skipper {
        fn name(&self) -> &str {
            "skipper"
        }

        async fn before(&self, _ctx: &mut ProcessingContext) -> Result<Decision> {
            Ok(Decision::Skip)
        }
    }

    #[tokio::test]
    async fn skip_short_circuits_handler_and_downstream_before() {
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let calls = handler_calls.clone();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .stage(Skipper)
            .stage(Recorder { name: "never", log: log.clone() });
        let mut ctx = ctx();
        pipeline
            .run(&mut ctx, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(()) })
            })
            .await
            .unwrap();
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    struct Failer;

    #[async_trait]
    impl Middleware for Failer {
        fn name(&self) -> &str {
            "failer"
        }

        async fn before(&self, _ctx: &mut ProcessingContext) -> Result<Decision> {
            anyhow::bail!("boom")
        }
    }

    #[tokio::test]
    async fn before_error_unwinds_entered_stages_only() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .stage(Recorder { name: "a", log: log.clone() })
            .stage(Failer);
        let mut ctx = ctx();
        let result = pipeline.run(&mut ctx, |_| Box::pin(async { Ok(()) })).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn handler_error_runs_on_error_in_reverse_for_entered_stages() {
        struct ErrorObserver {
            seen: Arc<std::sync::Mutex<Vec<String>>>,
        }

        #[async_trait]
        impl Middleware for ErrorObserver {
            fn name(&self) -> &str {
                "observer"
            }

            async fn before(&self, _ctx: &mut ProcessingContext) -> Result<Decision> {
                Ok(Decision::Continue)
            }

            async fn on_error(&self, _ctx: &mut ProcessingContext, err: &anyhow::Error) -> Result<()> {
                self.seen.lock().unwrap().push(err.to_string());
                Ok(())
            }
        }

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipeline = Pipeline::new().stage(ErrorObserver { seen: seen.clone() });
        let mut ctx = ctx();
        let result = pipeline
            .run(&mut ctx, |_| Box::pin(async { anyhow::bail!("handler exploded") }))
            .await;
        assert!(result.is_err());
        assert_eq!(seen.lock().unwrap().as_slice(), ["handler exploded"]);
    }
}
