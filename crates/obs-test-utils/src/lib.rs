//! Testing utilities for OBS scope workspace
//!
//! Stub credential stores, stub engines, recording completion handlers,
//! and fixtures shared by the integration tests.

#![allow(missing_docs)]

use async_trait::async_trait;
use obs_overlay::{OverlayProvider, OverlaySpec};
use obs_scope::{
    BlockResult, BodyInvocation, CompletionHandler, CredentialId, CredentialStore,
    CredentialStoreError, CredentialSummary, EngineError, ExecutionServices, ExecutionToken,
    MemoryCredentialStore, PipelineEngine, Principal, ResolvedCredential, StoredCredential,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test subscriber; safe to call from every test
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Store holding `cred-1 -> (AK123, SK456)`
pub fn sample_store() -> MemoryCredentialStore {
    MemoryCredentialStore::new()
        .with_credential("cred-1", StoredCredential::username_password("AK123", "SK456"))
}

/// Bundle a store and an engine
pub fn services(
    credentials: Arc<dyn CredentialStore>,
    engine: Arc<dyn PipelineEngine>,
) -> ExecutionServices {
    ExecutionServices::new(credentials, engine)
}

/// Fixed overlay, for use as an ambient overlay
pub fn static_overlay(pairs: &[(&str, &str)]) -> Arc<dyn OverlayProvider> {
    Arc::new(pairs.iter().copied().collect::<OverlaySpec>())
}

/// Store whose every call fails as unavailable
#[derive(Debug, Default)]
pub struct FailingStore {
    calls: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for FailingStore {
    async fn resolve(
        &self,
        _id: &CredentialId,
        _execution: &ExecutionToken,
    ) -> Result<Option<ResolvedCredential>, CredentialStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CredentialStoreError::unavailable("connection refused"))
    }

    async fn list(
        &self,
        _principal: &Principal,
    ) -> Result<Vec<CredentialSummary>, CredentialStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CredentialStoreError::unavailable("connection refused"))
    }
}

/// Wrapper counting `resolve` calls on another store
#[derive(Debug)]
pub struct CountingStore<S> {
    inner: S,
    resolves: AtomicUsize,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            resolves: AtomicUsize::new(0),
        }
    }

    pub fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: CredentialStore> CredentialStore for CountingStore<S> {
    async fn resolve(
        &self,
        id: &CredentialId,
        execution: &ExecutionToken,
    ) -> Result<Option<ResolvedCredential>, CredentialStoreError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(id, execution).await
    }

    async fn list(
        &self,
        principal: &Principal,
    ) -> Result<Vec<CredentialSummary>, CredentialStoreError> {
        self.inner.list(principal).await
    }
}

/// Runs the block to completion inside `start_async`
///
/// Blocks the calling thread. Not usable for blocks that themselves start
/// nested blocks through an `InlineEngine`.
#[derive(Debug, Default)]
pub struct InlineEngine;

impl PipelineEngine for InlineEngine {
    fn start_async(&self, invocation: BodyInvocation) -> Result<(), EngineError> {
        futures::executor::block_on(invocation.run());
        Ok(())
    }
}

/// Refuses every block with a fixed error
#[derive(Debug)]
pub struct RejectingEngine {
    error: EngineError,
    attempts: AtomicUsize,
}

impl RejectingEngine {
    pub fn new(error: EngineError) -> Self {
        Self {
            error,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PipelineEngine for RejectingEngine {
    fn start_async(&self, _invocation: BodyInvocation) -> Result<(), EngineError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Queues blocks until the test runs them
#[derive(Debug, Default)]
pub struct DeferredEngine {
    queue: Mutex<VecDeque<BodyInvocation>>,
}

impl DeferredEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks accepted but not yet run
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued blocks, including ones queued while running, until empty
    pub async fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            let Some(invocation) = next else {
                return ran;
            };
            invocation.run().await;
            ran += 1;
        }
    }
}

impl PipelineEngine for DeferredEngine {
    fn start_async(&self, invocation: BodyInvocation) -> Result<(), EngineError> {
        self.queue.lock().push_back(invocation);
        Ok(())
    }
}

/// Runs the block inline, then calls the callback twice more
#[derive(Debug, Default)]
pub struct DoubleDeliveryEngine;

impl PipelineEngine for DoubleDeliveryEngine {
    fn start_async(&self, invocation: BodyInvocation) -> Result<(), EngineError> {
        let callback = Arc::clone(&invocation.callback);
        futures::executor::block_on(invocation.run());
        callback.on_success(json!("duplicate"));
        callback.on_failure(anyhow::anyhow!("duplicate"));
        Ok(())
    }
}

/// Records every outcome it receives
#[derive(Debug, Default)]
pub struct RecordingHandler {
    outcomes: Mutex<Vec<BlockResult>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of outcomes received
    pub fn count(&self) -> usize {
        self.outcomes.lock().len()
    }

    /// Drain the received outcomes
    pub fn take(&self) -> Vec<BlockResult> {
        std::mem::take(&mut *self.outcomes.lock())
    }
}

impl CompletionHandler for RecordingHandler {
    fn on_success(&self, value: Value) {
        self.outcomes.lock().push(Ok(value));
    }

    fn on_failure(&self, error: anyhow::Error) {
        self.outcomes.lock().push(Err(error));
    }
}
