//! Step and block contexts
//!
//! [`StepContext`] is what the pipeline hands to a step when it runs: the
//! execution identity, the services it may use, the overlay already in
//! effect, the caller's completion handler, and the nested block.
//! [`BlockScope`] is what the nested block observes once started.

use crate::completion::{completion_channel, CompletionHandler, CompletionReceiver};
use crate::credentials::CredentialStore;
use crate::engine::{NestedBlock, PipelineEngine};
use crate::types::ExecutionToken;
use obs_overlay::{expanded, Environment, OverlayProvider};
use std::sync::Arc;

/// Services available to a running step
#[derive(Clone)]
pub struct ExecutionServices {
    /// Credential lookup
    pub credentials: Arc<dyn CredentialStore>,
    /// Nested block scheduling
    pub engine: Arc<dyn PipelineEngine>,
}

impl ExecutionServices {
    /// Bundle services
    #[inline]
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialStore>, engine: Arc<dyn PipelineEngine>) -> Self {
        Self {
            credentials,
            engine,
        }
    }
}

impl std::fmt::Debug for ExecutionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionServices").finish_non_exhaustive()
    }
}

/// Context of one step invocation
pub struct StepContext {
    pub(crate) execution: ExecutionToken,
    pub(crate) services: ExecutionServices,
    pub(crate) ambient: Option<Arc<dyn OverlayProvider>>,
    pub(crate) completion: Arc<dyn CompletionHandler>,
    pub(crate) body: NestedBlock,
}

impl StepContext {
    /// Context with no ambient overlay
    #[must_use]
    pub fn new(
        execution: ExecutionToken,
        services: ExecutionServices,
        completion: Arc<dyn CompletionHandler>,
        body: NestedBlock,
    ) -> Self {
        Self {
            execution,
            services,
            ambient: None,
            completion,
            body,
        }
    }

    /// Context whose completion is observed through a [`CompletionReceiver`]
    #[must_use]
    pub fn with_channel(
        execution: ExecutionToken,
        services: ExecutionServices,
        body: NestedBlock,
    ) -> (Self, CompletionReceiver) {
        let (handler, receiver) = completion_channel();
        (Self::new(execution, services, handler, body), receiver)
    }

    /// Set the overlay already in effect for this step
    #[must_use]
    pub fn with_ambient_overlay(mut self, ambient: Arc<dyn OverlayProvider>) -> Self {
        self.ambient = Some(ambient);
        self
    }

    /// Execution identity
    #[inline]
    #[must_use]
    pub fn execution(&self) -> &ExecutionToken {
        &self.execution
    }

    /// Credential store
    #[inline]
    #[must_use]
    pub fn credentials(&self) -> &dyn CredentialStore {
        self.services.credentials.as_ref()
    }

    /// Pipeline engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &dyn PipelineEngine {
        self.services.engine.as_ref()
    }

    /// Overlay in effect before this step, if any
    #[inline]
    #[must_use]
    pub fn current_ambient_overlay(&self) -> Option<Arc<dyn OverlayProvider>> {
        self.ambient.clone()
    }

    /// Caller's completion handler
    #[inline]
    #[must_use]
    pub fn on_completion(&self) -> Arc<dyn CompletionHandler> {
        Arc::clone(&self.completion)
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("execution", &self.execution)
            .field("ambient", &self.ambient)
            .finish_non_exhaustive()
    }
}

/// What a nested block sees while it runs
#[derive(Clone)]
pub struct BlockScope {
    execution: ExecutionToken,
    services: ExecutionServices,
    overlay: Arc<dyn OverlayProvider>,
}

impl BlockScope {
    pub(crate) fn new(
        execution: ExecutionToken,
        services: ExecutionServices,
        overlay: Arc<dyn OverlayProvider>,
    ) -> Self {
        Self {
            execution,
            services,
            overlay,
        }
    }

    /// Execution node of the block
    #[inline]
    #[must_use]
    pub fn execution(&self) -> &ExecutionToken {
        &self.execution
    }

    /// Composed overlay in effect
    #[inline]
    #[must_use]
    pub fn overlay(&self) -> Arc<dyn OverlayProvider> {
        Arc::clone(&self.overlay)
    }

    /// Overlay expanded over an empty environment
    #[must_use]
    pub fn environment(&self) -> Environment {
        expanded(self.overlay.as_ref())
    }

    /// Apply the overlay to `env`
    pub fn expand(&self, env: &mut Environment) {
        self.overlay.expand(env);
    }

    /// Value the overlay gives `key`
    #[must_use]
    pub fn var(&self, key: &str) -> Option<String> {
        self.environment().get(key).map(str::to_owned)
    }

    /// Context for a step run inside this block
    ///
    /// The block's overlay becomes that step's ambient overlay.
    #[must_use]
    pub fn nested_context(&self, body: NestedBlock) -> (StepContext, CompletionReceiver) {
        let (ctx, receiver) =
            StepContext::with_channel(self.execution.clone(), self.services.clone(), body);
        (ctx.with_ambient_overlay(self.overlay()), receiver)
    }
}

impl std::fmt::Debug for BlockScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockScope")
            .field("execution", &self.execution)
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::engine::{nested_block, BodyInvocation};
    use crate::error::EngineError;
    use obs_overlay::OverlaySpec;
    use serde_json::json;

    struct Idle;

    impl PipelineEngine for Idle {
        fn start_async(&self, _invocation: BodyInvocation) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn services() -> ExecutionServices {
        ExecutionServices::new(Arc::new(MemoryCredentialStore::new()), Arc::new(Idle))
    }

    fn scope() -> BlockScope {
        let overlay: OverlaySpec = [("OBS_REGION", "eu-west"), ("OBS_ENDPOINT_URL", "")]
            .into_iter()
            .collect();
        BlockScope::new(ExecutionToken::new("build"), services(), Arc::new(overlay))
    }

    #[test]
    fn step_context_defaults_to_no_ambient() {
        let (ctx, _rx) = StepContext::with_channel(
            ExecutionToken::new("build"),
            services(),
            nested_block(|_| async { Ok(json!(null)) }),
        );
        assert!(ctx.current_ambient_overlay().is_none());
        assert_eq!(ctx.execution().job(), "build");
    }

    #[test]
    fn block_scope_reads_overlay() {
        let scope = scope();
        assert_eq!(scope.var("OBS_REGION").as_deref(), Some("eu-west"));
        assert_eq!(scope.var("OBS_ENDPOINT_URL").as_deref(), Some(""));
        assert_eq!(scope.var("PATH"), None);
    }

    #[test]
    fn expand_keeps_unrelated_vars() {
        let scope = scope();
        let mut env: Environment = [("PATH", "/usr/bin"), ("OBS_REGION", "us-east")]
            .into_iter()
            .collect();

        scope.expand(&mut env);

        assert_eq!(env.get("PATH"), Some("/usr/bin"));
        assert_eq!(env.get("OBS_REGION"), Some("eu-west"));
    }

    #[test]
    fn nested_context_inherits_overlay() {
        let scope = scope();
        let (ctx, _rx) = scope.nested_context(nested_block(|_| async { Ok(json!(null)) }));

        let ambient = ctx.current_ambient_overlay().expect("ambient overlay");
        assert_eq!(expanded(ambient.as_ref()).get("OBS_REGION"), Some("eu-west"));
        assert_eq!(ctx.execution(), scope.execution());
    }
}
