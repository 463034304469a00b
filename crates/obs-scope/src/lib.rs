//! OBS Scope - run nested pipeline blocks with OBS settings visible
//!
//! A caller declares "run this block with these object-storage settings".
//! The scope injector:
//! - Resolves the named credential through the credential store
//! - Builds an environment overlay from the declared settings
//! - Layers it on top of the overlay already in effect
//! - Starts the nested block asynchronously through the pipeline engine
//! - Forwards the block's outcome, untouched and exactly once
//!
//! # Example
//!
//! ```rust,ignore
//! use obs_scope::prelude::*;
//!
//! # async fn example(services: ExecutionServices) -> Result<(), ScopeError> {
//! let params = ScopeParams::new("eu-west", "https://obs.example.com", "cred-1");
//! let body = nested_block(|scope| async move {
//!     Ok(serde_json::json!(scope.var("OBS_REGION")))
//! });
//!
//! let (ctx, outcome) = StepContext::with_channel(ExecutionToken::new("job-1"), services, body);
//! let finished = inject(ctx, params).await?;
//! assert!(!finished);
//!
//! let outcome = outcome.outcome().await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod completion;
pub mod config;
pub mod context;
pub mod credentials;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod injector;
pub mod types;

pub use completion::{
    completion_channel, deliver, BlockResult, ChannelHandler, CompletionHandler,
    CompletionReceiver, ForwardOnce, InvocationOutcome,
};
pub use config::{EngineConfig, ScopeConfig};
pub use context::{BlockScope, ExecutionServices, StepContext};
pub use credentials::{
    credential_choices, Access, ChoiceItem, CredentialKind, CredentialStore,
    CredentialSummary, ItemContext, MemoryCredentialStore, Principal, ResolvedCredential,
    StoredCredential,
};
pub use descriptor::{RequiredContext, StepDescriptor};
pub use engine::{
    nested_block, BlockPanicked, BodyInvocation, NestedBlock, PipelineEngine, TokioEngine,
};
pub use error::{ConfigError, CredentialStoreError, EngineError, ScopeError};
pub use injector::{allowed_transitions, inject, validate_transition, InjectorState, ScopeExecution};
pub use obs_overlay::{Environment, Layered, OverlayKeys, OverlayProvider, OverlaySpec};
pub use types::{CredentialId, ExecutionToken, NodeId, ScopeParams};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running OBS-scoped blocks
    pub use crate::{
        inject, nested_block, BlockScope, CompletionHandler, CredentialStore, ExecutionServices,
        ExecutionToken, InvocationOutcome, PipelineEngine, ScopeConfig, ScopeError,
        ScopeExecution, ScopeParams, StepContext,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
