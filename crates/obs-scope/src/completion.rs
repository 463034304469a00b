//! Completion handlers for nested blocks
//!
//! The engine reports a nested block's terminal result through a
//! [`CompletionHandler`]. The injector never hands the caller's handler to
//! the engine directly; it wraps it in [`ForwardOnce`], which delivers at
//! most one outcome no matter how often the engine calls back.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Terminal result of a nested block
pub type BlockResult = Result<Value, anyhow::Error>;

/// Receives a nested block's terminal outcome
pub trait CompletionHandler: Send + Sync {
    /// Block finished with a value
    fn on_success(&self, value: Value);

    /// Block failed
    fn on_failure(&self, error: anyhow::Error);
}

/// Route a [`BlockResult`] to the matching handler method
pub fn deliver(handler: &dyn CompletionHandler, result: BlockResult) {
    match result {
        Ok(value) => handler.on_success(value),
        Err(error) => handler.on_failure(error),
    }
}

/// Forwards the first outcome to `downstream` and drops the rest
///
/// The guard is local to the adapter, so the exactly-once guarantee does
/// not depend on the engine calling back only once.
pub struct ForwardOnce {
    downstream: Arc<dyn CompletionHandler>,
    delivered: AtomicBool,
}

impl ForwardOnce {
    /// Wrap `downstream`
    #[inline]
    #[must_use]
    pub fn new(downstream: Arc<dyn CompletionHandler>) -> Self {
        Self {
            downstream,
            delivered: AtomicBool::new(false),
        }
    }

    /// Wrap `downstream`, ready to hand to an engine
    #[inline]
    #[must_use]
    pub fn wrap(downstream: Arc<dyn CompletionHandler>) -> Arc<dyn CompletionHandler> {
        Arc::new(Self::new(downstream))
    }

    /// Whether an outcome has been forwarded
    #[inline]
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.delivered.load(Ordering::Acquire)
    }

    fn claim(&self, kind: &'static str) -> bool {
        let first = !self.delivered.swap(true, Ordering::AcqRel);
        if !first {
            tracing::warn!(outcome = kind, "dropping duplicate nested block completion");
        }
        first
    }
}

impl CompletionHandler for ForwardOnce {
    fn on_success(&self, value: Value) {
        if self.claim("success") {
            self.downstream.on_success(value);
        }
    }

    fn on_failure(&self, error: anyhow::Error) {
        if self.claim("failure") {
            self.downstream.on_failure(error);
        }
    }
}

impl std::fmt::Debug for ForwardOnce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardOnce")
            .field("delivered", &self.is_delivered())
            .finish_non_exhaustive()
    }
}

/// State of a nested block as seen by whoever waits on it
#[derive(Debug)]
pub enum InvocationOutcome {
    /// Not finished (or no outcome will ever arrive)
    Pending,
    /// Finished with a value
    Completed(Value),
    /// Failed with this exact error
    Failed(anyhow::Error),
}

impl InvocationOutcome {
    /// Whether a terminal state was reached
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Value, if completed
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Error, if failed
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Convert a terminal outcome back into a result
    ///
    /// `None` while pending.
    #[must_use]
    pub fn into_result(self) -> Option<BlockResult> {
        match self {
            Self::Pending => None,
            Self::Completed(value) => Some(Ok(value)),
            Self::Failed(error) => Some(Err(error)),
        }
    }
}

impl From<BlockResult> for InvocationOutcome {
    fn from(result: BlockResult) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(error) => Self::Failed(error),
        }
    }
}

/// Handler that sends the outcome over a oneshot channel
#[derive(Debug)]
pub struct ChannelHandler {
    sender: Mutex<Option<oneshot::Sender<BlockResult>>>,
}

impl ChannelHandler {
    fn send(&self, result: BlockResult) {
        let Some(sender) = self.sender.lock().take() else {
            tracing::warn!("completion channel already used");
            return;
        };
        if sender.send(result).is_err() {
            tracing::debug!("completion receiver dropped before outcome arrived");
        }
    }
}

impl CompletionHandler for ChannelHandler {
    fn on_success(&self, value: Value) {
        self.send(Ok(value));
    }

    fn on_failure(&self, error: anyhow::Error) {
        self.send(Err(error));
    }
}

/// Receiving half of [`completion_channel`]
#[derive(Debug)]
pub struct CompletionReceiver {
    receiver: oneshot::Receiver<BlockResult>,
}

impl CompletionReceiver {
    /// Wait for the outcome
    ///
    /// Returns [`InvocationOutcome::Pending`] if the handler was dropped
    /// without ever receiving one.
    pub async fn outcome(self) -> InvocationOutcome {
        match self.receiver.await {
            Ok(result) => result.into(),
            Err(_) => InvocationOutcome::Pending,
        }
    }

    /// Check for the outcome without waiting
    ///
    /// Once a terminal outcome has been returned, later calls return
    /// `Pending`.
    pub fn try_outcome(&mut self) -> InvocationOutcome {
        match self.receiver.try_recv() {
            Ok(result) => result.into(),
            Err(_) => InvocationOutcome::Pending,
        }
    }
}

/// Handler/receiver pair for waiting on one nested block
#[must_use]
pub fn completion_channel() -> (Arc<ChannelHandler>, CompletionReceiver) {
    let (sender, receiver) = oneshot::channel();
    (
        Arc::new(ChannelHandler {
            sender: Mutex::new(Some(sender)),
        }),
        CompletionReceiver { receiver },
    )
}
