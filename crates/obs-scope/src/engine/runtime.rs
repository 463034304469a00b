//! Tokio-backed pipeline engine

use super::{BodyInvocation, PipelineEngine};
use crate::completion::{CompletionHandler, ForwardOnce};
use crate::config::EngineConfig;
use crate::error::EngineError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

/// Runs nested blocks as tasks on a Tokio runtime
///
/// At most `max_in_flight` blocks run at once; beyond that
/// [`PipelineEngine::start_async`] fails with [`EngineError::QueueFull`]
/// rather than queueing unboundedly.
///
/// A block whose task is dropped before it finishes, because the runtime
/// shut down before or while it ran, is reported to its callback as an
/// [`EngineError::ShutDown`] failure.
#[derive(Clone)]
pub struct TokioEngine {
    inner: Arc<Inner>,
}

struct Inner {
    handle: Handle,
    permits: Arc<Semaphore>,
    limit: usize,
    shut_down: AtomicBool,
}

impl TokioEngine {
    /// Engine on the current runtime
    ///
    /// # Errors
    /// Returns `EngineError::NoRuntime` outside a Tokio runtime.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let handle = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(Self::with_handle(handle, config))
    }

    /// Engine spawning onto `handle`
    ///
    /// `max_in_flight` is capped at [`Semaphore::MAX_PERMITS`].
    #[must_use]
    pub fn with_handle(handle: Handle, config: &EngineConfig) -> Self {
        let limit = config.max_in_flight.min(Semaphore::MAX_PERMITS);
        Self {
            inner: Arc::new(Inner {
                handle,
                permits: Arc::new(Semaphore::new(limit)),
                limit,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Stop accepting new blocks; running ones finish normally
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        tracing::info!("pipeline engine shut down");
    }

    /// Blocks currently running
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.limit - self.inner.permits.available_permits()
    }
}

impl PipelineEngine for TokioEngine {
    fn start_async(&self, mut invocation: BodyInvocation) -> Result<(), EngineError> {
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(EngineError::ShutDown);
        }

        let permit = Arc::clone(&self.inner.permits)
            .try_acquire_owned()
            .map_err(|_| EngineError::QueueFull {
                limit: self.inner.limit,
            })?;

        let forward = Arc::new(ForwardOnce::new(Arc::clone(&invocation.callback)));
        invocation.callback = Arc::clone(&forward) as Arc<dyn CompletionHandler>;
        let guard = DropGuard { forward };

        tracing::debug!(job = invocation.execution.job(), "spawning nested block");
        self.inner.handle.spawn(async move {
            let _guard = guard;
            let _permit = permit;
            invocation.run().await;
        });
        Ok(())
    }
}

/// Fails the callback if the task is dropped before the block delivers
struct DropGuard {
    forward: Arc<ForwardOnce>,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if !self.forward.is_delivered() {
            tracing::warn!("nested block dropped before completing");
            self.forward.on_failure(EngineError::ShutDown.into());
        }
    }
}

impl std::fmt::Debug for TokioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioEngine")
            .field("limit", &self.inner.limit)
            .field("in_flight", &self.in_flight())
            .field("shut_down", &self.inner.shut_down.load(Ordering::Acquire))
            .finish()
    }
}
