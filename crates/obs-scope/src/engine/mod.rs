//! Pipeline engine interface
//!
//! The engine owns scheduling. The injector only asks it to start a
//! [`BodyInvocation`]; the engine runs the body whenever it sees fit and
//! reports the terminal result through the invocation's callback.

mod runtime;

pub use runtime::TokioEngine;

use crate::completion::{deliver, BlockResult, CompletionHandler};
use crate::context::{BlockScope, ExecutionServices};
use crate::error::EngineError;
use crate::types::ExecutionToken;
use futures::future::BoxFuture;
use futures::FutureExt;
use obs_overlay::OverlayProvider;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Caller-supplied unit of work run under a composed overlay
///
/// `FnOnce`: a body can be started at most once.
pub type NestedBlock = Box<dyn FnOnce(BlockScope) -> BoxFuture<'static, BlockResult> + Send>;

/// Box an async closure as a [`NestedBlock`]
pub fn nested_block<F, Fut>(body: F) -> NestedBlock
where
    F: FnOnce(BlockScope) -> Fut + Send + 'static,
    Fut: Future<Output = BlockResult> + Send + 'static,
{
    Box::new(move |scope| body(scope).boxed())
}

/// Starts nested blocks asynchronously
pub trait PipelineEngine: Send + Sync {
    /// Accept `invocation` for execution
    ///
    /// On `Ok` the engine owns the invocation and must eventually run it
    /// (see [`BodyInvocation::run`]); it may do so before returning.
    ///
    /// # Errors
    /// Returns `EngineError` if the invocation could not be enqueued. The
    /// body is then dropped without running and the callback never fires.
    fn start_async(&self, invocation: BodyInvocation) -> Result<(), EngineError>;
}

/// Everything an engine needs to run one nested block
pub struct BodyInvocation {
    /// Execution that requested the block
    pub execution: ExecutionToken,
    /// Services handed on to the block's scope
    pub services: ExecutionServices,
    /// Composed overlay the block observes
    pub overlay: Arc<dyn OverlayProvider>,
    /// The block
    pub body: NestedBlock,
    /// Receives the block's terminal result
    pub callback: Arc<dyn CompletionHandler>,
}

impl BodyInvocation {
    /// Scope the body will observe: a child node of the requesting execution
    #[must_use]
    pub fn scope(&self) -> BlockScope {
        BlockScope::new(
            self.execution.child(),
            self.services.clone(),
            Arc::clone(&self.overlay),
        )
    }

    /// Run the body and report its result to the callback
    ///
    /// A panic inside the body is reported as a [`BlockPanicked`] failure.
    pub async fn run(self) {
        let scope = self.scope();
        let Self { body, callback, .. } = self;

        let result = match std::panic::catch_unwind(AssertUnwindSafe(move || body(scope))) {
            Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(BlockPanicked::from_payload(payload.as_ref()).into()),
            },
            Err(payload) => Err(BlockPanicked::from_payload(payload.as_ref()).into()),
        };

        deliver(callback.as_ref(), result);
    }
}

impl std::fmt::Debug for BodyInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyInvocation")
            .field("execution", &self.execution)
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}

/// A nested block panicked instead of returning
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("nested block panicked: {message}")]
pub struct BlockPanicked {
    /// Panic message, if it was a string
    pub message: String,
}

impl BlockPanicked {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self { message }
    }
}
