//! Scope injector
//!
//! Runs a nested block with the declared OBS settings layered on top of
//! whatever overlay is already in effect. One [`ScopeExecution`] serves
//! exactly one nested-block request:
//!
//! ```text
//! Created -> CredentialResolved | CredentialAbsent -> OverlayComposed -> NestedBlockStarted
//!    \_______________________ SetupFailed _______________________/
//! ```

use crate::completion::ForwardOnce;
use crate::config::ScopeConfig;
use crate::context::StepContext;
use crate::credentials::{CredentialStore, ResolvedCredential};
use crate::engine::BodyInvocation;
use crate::error::{ConfigError, ScopeError};
use crate::types::{ExecutionToken, ScopeParams};
use obs_overlay::{build, KeyMaterial, Layered, OverlayKeys};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle of one scope execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjectorState {
    /// Nothing done yet
    Created,
    /// The declared credential resolved
    CredentialResolved,
    /// No credential declared, or it did not resolve
    CredentialAbsent,
    /// Overlay built and layered over the ambient one
    OverlayComposed,
    /// Engine accepted the nested block
    NestedBlockStarted,
    /// Scope could not be established
    SetupFailed,
}

impl InjectorState {
    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

/// Validate an injector state transition
///
/// # Errors
/// Returns `ScopeError::IllegalTransition` if `to` is not reachable from `from`.
pub fn validate_transition(from: InjectorState, to: InjectorState) -> Result<(), ScopeError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ScopeError::IllegalTransition { from, to })
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: InjectorState) -> Vec<InjectorState> {
    use InjectorState::{
        CredentialAbsent, CredentialResolved, Created, NestedBlockStarted, OverlayComposed,
        SetupFailed,
    };
    match from {
        Created => vec![CredentialResolved, CredentialAbsent, SetupFailed],
        CredentialResolved | CredentialAbsent => vec![OverlayComposed, SetupFailed],
        OverlayComposed => vec![NestedBlockStarted, SetupFailed],
        NestedBlockStarted | SetupFailed => vec![],
    }
}

/// One request to run a nested block under declared OBS settings
#[derive(Debug)]
pub struct ScopeExecution {
    params: ScopeParams,
    keys: OverlayKeys,
    state: InjectorState,
}

impl ScopeExecution {
    /// Execution writing the key names from `config`
    ///
    /// # Errors
    /// Returns the [`ScopeConfig::validate`] error if `config` is invalid.
    pub fn new(params: ScopeParams, config: &ScopeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            params,
            keys: config.keys.clone(),
            state: InjectorState::Created,
        })
    }

    /// Execution writing the default key names
    #[must_use]
    pub fn with_default_keys(params: ScopeParams) -> Self {
        Self {
            params,
            keys: OverlayKeys::default(),
            state: InjectorState::Created,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> InjectorState {
        self.state
    }

    /// Declared parameters
    #[inline]
    #[must_use]
    pub fn params(&self) -> &ScopeParams {
        &self.params
    }

    /// Establish the scope and start the nested block
    ///
    /// Always returns `Ok(false)` on success: the block's outcome arrives
    /// later through the context's completion handler, exactly once.
    ///
    /// # Errors
    /// Returns a [`ScopeError`] if the scope could not be established. The
    /// nested block has then not started and the handler never fires.
    #[tracing::instrument(
        skip_all,
        fields(
            job = ctx.execution().job(),
            node = %ctx.execution().node(),
            credentials_id = %self.params.credentials_id,
        )
    )]
    pub async fn start(&mut self, ctx: StepContext) -> Result<bool, ScopeError> {
        if self.state != InjectorState::Created {
            return Err(ScopeError::AlreadyStarted(self.state));
        }

        match self.establish(ctx).await {
            Ok(()) => Ok(false),
            Err(err) => {
                self.state = InjectorState::SetupFailed;
                tracing::error!(error = %err, "OBS scope setup failed");
                Err(err)
            }
        }
    }

    async fn establish(&mut self, ctx: StepContext) -> Result<(), ScopeError> {
        let StepContext {
            execution,
            services,
            ambient,
            completion,
            body,
        } = ctx;

        let credential = self
            .resolve_credential(services.credentials.as_ref(), &execution)
            .await?;
        self.advance(if credential.is_some() {
            InjectorState::CredentialResolved
        } else {
            InjectorState::CredentialAbsent
        })?;

        let spec = build(
            &self.keys,
            &self.params.region,
            &self.params.endpoint_url,
            credential.as_ref().map(|c| c as &dyn KeyMaterial),
        );
        drop(credential);

        let overlay = Layered::merge(ambient, Arc::new(spec));
        self.advance(InjectorState::OverlayComposed)?;

        let engine = Arc::clone(&services.engine);
        engine.start_async(BodyInvocation {
            execution,
            services,
            overlay,
            body,
            callback: ForwardOnce::wrap(completion),
        })?;
        self.advance(InjectorState::NestedBlockStarted)?;

        tracing::info!("nested block started");
        Ok(())
    }

    async fn resolve_credential(
        &self,
        store: &dyn CredentialStore,
        execution: &ExecutionToken,
    ) -> Result<Option<ResolvedCredential>, ScopeError> {
        let id = &self.params.credentials_id;
        if id.is_empty() {
            tracing::debug!("no credential declared");
            return Ok(None);
        }

        let resolved = store.resolve(id, execution).await?;
        if resolved.is_none() {
            tracing::debug!("credential did not resolve, continuing without access keys");
        }
        Ok(resolved)
    }

    fn advance(&mut self, to: InjectorState) -> Result<(), ScopeError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }
}

/// Run `ctx`'s nested block under `params` with the default key names
///
/// # Errors
/// See [`ScopeExecution::start`].
pub async fn inject(ctx: StepContext, params: ScopeParams) -> Result<bool, ScopeError> {
    ScopeExecution::with_default_keys(params).start(ctx).await
}
