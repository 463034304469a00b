//! End-to-end behaviour of the scope injector against stub stores and engines

use obs_scope::prelude::*;
use obs_scope::{
    nested_block, BlockPanicked, CompletionReceiver, EngineError, InjectorState, NestedBlock,
    TokioEngine,
};
use obs_test_utils::{
    init_tracing, sample_store, services, static_overlay, CountingStore, DeferredEngine,
    DoubleDeliveryEngine, FailingStore, InlineEngine, RecordingHandler, RejectingEngine,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

const OBS_KEYS: [&str; 6] = [
    "OBS_DEFAULT_REGION",
    "OBS_REGION",
    "OBS_ENDPOINT_URL",
    "OBS_ACCESS_KEY_ID",
    "OBS_SECRET_ACCESS_KEY",
    "other",
];

/// Block that reports every OBS variable it can see
fn report_env() -> NestedBlock {
    nested_block(|scope| async move {
        let env = scope.environment();
        let seen: serde_json::Map<String, Value> = OBS_KEYS
            .iter()
            .filter_map(|key| env.get(key).map(|v| ((*key).to_owned(), json!(v))))
            .collect();
        Ok(Value::Object(seen))
    })
}

fn channel_context(
    services: ExecutionServices,
    body: NestedBlock,
) -> (StepContext, CompletionReceiver) {
    StepContext::with_channel(ExecutionToken::new("build"), services, body)
}

#[tokio::test]
async fn full_scenario_with_credential() {
    init_tracing();
    let engine = TokioEngine::new(&ScopeConfig::default().engine).unwrap();
    let (ctx, receiver) = channel_context(
        services(Arc::new(sample_store()), Arc::new(engine)),
        report_env(),
    );

    let params = ScopeParams::from_json(&json!({
        "region": "eu-west",
        "endpointUrl": "https://obs.example.com",
        "credentialsId": "cred-1"
    }))
    .unwrap();

    assert!(!inject(ctx, params).await.unwrap());
    let outcome = receiver.outcome().await;

    assert_eq!(
        outcome.value(),
        Some(&json!({
            "OBS_DEFAULT_REGION": "eu-west",
            "OBS_REGION": "eu-west",
            "OBS_ENDPOINT_URL": "https://obs.example.com",
            "OBS_ACCESS_KEY_ID": "AK123",
            "OBS_SECRET_ACCESS_KEY": "SK456"
        }))
    );
}

#[tokio::test]
async fn empty_credentials_id_skips_lookup() {
    init_tracing();
    let store = Arc::new(CountingStore::new(sample_store()));
    let (ctx, receiver) = channel_context(
        services(store.clone(), Arc::new(InlineEngine)),
        report_env(),
    );

    inject(ctx, ScopeParams::new("eu-west", "https://obs.example.com", ""))
        .await
        .unwrap();

    assert_eq!(store.resolves(), 0);
    assert_eq!(
        receiver.outcome().await.value(),
        Some(&json!({
            "OBS_DEFAULT_REGION": "eu-west",
            "OBS_REGION": "eu-west",
            "OBS_ENDPOINT_URL": "https://obs.example.com"
        }))
    );
}

#[tokio::test]
async fn unresolved_credential_is_not_an_error() {
    let store = Arc::new(CountingStore::new(sample_store()));
    let (ctx, receiver) = channel_context(
        services(store.clone(), Arc::new(InlineEngine)),
        report_env(),
    );
    let mut execution = ScopeExecution::with_default_keys(ScopeParams::new("eu-west", "", "nope"));

    execution.start(ctx).await.unwrap();

    assert_eq!(store.resolves(), 1);
    assert_eq!(execution.state(), InjectorState::NestedBlockStarted);
    let value = receiver.outcome().await.into_result().unwrap().unwrap();
    assert!(value.get("OBS_ACCESS_KEY_ID").is_none());
    assert_eq!(value["OBS_ENDPOINT_URL"], json!(""));
}

#[tokio::test]
async fn ambient_overlay_passes_through() {
    let (ctx, receiver) = channel_context(
        services(Arc::new(sample_store()), Arc::new(InlineEngine)),
        report_env(),
    );
    let ctx = ctx.with_ambient_overlay(static_overlay(&[
        ("OBS_REGION", "us-east"),
        ("other", "x"),
    ]));

    inject(ctx, ScopeParams::new("eu-west", "", "")).await.unwrap();

    let value = receiver.outcome().await.into_result().unwrap().unwrap();
    assert_eq!(value["OBS_REGION"], json!("eu-west"));
    assert_eq!(value["other"], json!("x"));
}

#[tokio::test]
async fn start_returns_before_completion() {
    let engine = Arc::new(DeferredEngine::new());
    let handler = RecordingHandler::new();
    let ctx = StepContext::new(
        ExecutionToken::new("build"),
        services(Arc::new(sample_store()), engine.clone()),
        handler.clone(),
        nested_block(|_| async { Ok(json!("done")) }),
    );

    assert!(!inject(ctx, ScopeParams::default()).await.unwrap());
    assert_eq!(handler.count(), 0);
    assert_eq!(engine.pending(), 1);

    assert_eq!(engine.run_all().await, 1);
    let outcomes = handler.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].as_ref().unwrap(), &json!("done"));
}

#[tokio::test]
async fn block_failure_delivered_verbatim() {
    #[derive(Debug, thiserror::Error)]
    #[error("bucket {0} not found")]
    struct NoSuchBucket(String);

    let (ctx, receiver) = channel_context(
        services(Arc::new(sample_store()), Arc::new(InlineEngine)),
        nested_block(|_| async { Err(NoSuchBucket("artifacts".into()).into()) }),
    );

    inject(ctx, ScopeParams::default()).await.unwrap();

    let outcome = receiver.outcome().await;
    let error = outcome.error().expect("failure expected");
    assert_eq!(
        error.downcast_ref::<NoSuchBucket>().map(|e| e.0.as_str()),
        Some("artifacts")
    );
}

#[tokio::test]
async fn store_failure_is_setup_failure() {
    init_tracing();
    let store = Arc::new(FailingStore::new());
    let engine = Arc::new(DeferredEngine::new());
    let handler = RecordingHandler::new();
    let ctx = StepContext::new(
        ExecutionToken::new("build"),
        services(store.clone(), engine.clone()),
        handler.clone(),
        report_env(),
    );
    let mut execution = ScopeExecution::with_default_keys(ScopeParams::new("eu-west", "", "cred-1"));

    let err = execution.start(ctx).await.unwrap_err();

    assert!(matches!(err, ScopeError::CredentialLookup(_)));
    assert!(err.is_setup_failure());
    assert!(err.is_retryable());
    assert_eq!(execution.state(), InjectorState::SetupFailed);
    assert_eq!(engine.pending(), 0);
    assert_eq!(engine.run_all().await, 0);
    assert_eq!(handler.count(), 0);
}

#[tokio::test]
async fn engine_refusal_is_setup_failure() {
    let engine = Arc::new(RejectingEngine::new(EngineError::QueueFull { limit: 2 }));
    let handler = RecordingHandler::new();
    let ctx = StepContext::new(
        ExecutionToken::new("build"),
        services(Arc::new(sample_store()), engine.clone()),
        handler.clone(),
        report_env(),
    );

    let err = inject(ctx, ScopeParams::new("eu-west", "", "cred-1"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScopeError::EngineStart(EngineError::QueueFull { limit: 2 })
    ));
    assert_eq!(engine.attempts(), 1);
    assert_eq!(handler.count(), 0);
}

#[test]
fn synchronous_completion_delivers_once() {
    let handler = RecordingHandler::new();
    let ctx = StepContext::new(
        ExecutionToken::new("build"),
        services(Arc::new(sample_store()), Arc::new(DoubleDeliveryEngine)),
        handler.clone(),
        nested_block(|_| async { Ok(json!(42)) }),
    );

    tokio_test::block_on(inject(ctx, ScopeParams::default())).unwrap();

    let outcomes = handler.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].as_ref().unwrap(), &json!(42));
}

#[test]
fn block_on_stopped_runtime_still_completes() {
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let handle = runtime.handle().clone();
    drop(runtime);

    let engine = TokioEngine::with_handle(handle, &ScopeConfig::default().engine);
    let handler = RecordingHandler::new();
    let ctx = StepContext::new(
        ExecutionToken::new("build"),
        services(Arc::new(sample_store()), Arc::new(engine)),
        handler.clone(),
        nested_block(|_| async { Ok(json!("never")) }),
    );

    assert!(!tokio_test::block_on(inject(ctx, ScopeParams::default())).unwrap());

    let outcomes = handler.take();
    assert_eq!(outcomes.len(), 1);
    let error = outcomes[0].as_ref().unwrap_err();
    assert_eq!(error.downcast_ref::<EngineError>(), Some(&EngineError::ShutDown));
}

#[tokio::test]
async fn panicking_block_reported_as_failure() {
    let engine = TokioEngine::new(&ScopeConfig::default().engine).unwrap();
    let (ctx, receiver) = channel_context(
        services(Arc::new(sample_store()), Arc::new(engine)),
        nested_block(|scope| async move {
            let region = scope.var("OBS_REGION").unwrap_or_default();
            assert!(region.is_empty(), "unexpected region {region}");
            Ok(json!(null))
        }),
    );

    inject(ctx, ScopeParams::new("eu-west", "", "")).await.unwrap();

    let outcome = receiver.outcome().await;
    let error = outcome.error().expect("failure expected");
    assert_eq!(
        error.downcast_ref::<BlockPanicked>().map(|p| p.message.clone()),
        Some("unexpected region eu-west".to_owned())
    );
}

#[tokio::test]
async fn secrets_stay_out_of_debug_output() {
    let engine = Arc::new(DeferredEngine::new());
    let handler = RecordingHandler::new();
    let ctx = StepContext::new(
        ExecutionToken::new("build"),
        services(Arc::new(sample_store()), engine.clone()),
        handler.clone(),
        report_env(),
    );
    let mut execution =
        ScopeExecution::with_default_keys(ScopeParams::new("eu-west", "", "cred-1"));
    execution.start(ctx).await.unwrap();

    let rendered = format!("{execution:?} {engine:?}");
    assert!(rendered.contains("OBS_SECRET_ACCESS_KEY"));
    assert!(!rendered.contains("SK456"));

    engine.run_all().await;
    let value = handler.take().remove(0).unwrap();
    assert_eq!(value["OBS_SECRET_ACCESS_KEY"], json!("SK456"));
}
