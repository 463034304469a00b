//! Error types for OBS scopes
//!
//! Setup failures (the scope never got established) are kept apart from
//! failures of the nested block itself, which are never wrapped here:
//! - Credential store infrastructure errors
//! - Engine enqueue failures
//! - Misuse of an injector instance
//! - Configuration errors

use crate::injector::InjectorState;

/// Failure to establish a scope
///
/// Every variant is raised before the nested block starts. Once the block
/// is running, its outcome goes to the completion handler instead.
#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    /// Credential store could not be queried
    #[error("credential lookup failed: {0}")]
    CredentialLookup(#[from] CredentialStoreError),

    /// Engine refused to start the nested block
    #[error("nested block could not be started: {0}")]
    EngineStart(#[from] EngineError),

    /// `start` called more than once on the same execution
    #[error("scope execution already started (state: {0:?})")]
    AlreadyStarted(InjectorState),

    /// Internal state machine violation
    #[error("illegal injector transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// State before the attempted transition
        from: InjectorState,
        /// Rejected target state
        to: InjectorState,
    },
}

impl ScopeError {
    /// Whether the scope itself could not be established
    ///
    /// Always `true`: a `ScopeError` is only ever returned by
    /// [`crate::ScopeExecution::start`], before the nested block runs.
    /// Failures of a running block never become a `ScopeError`; they reach
    /// the completion handler as the block's own error.
    #[inline]
    #[must_use]
    pub fn is_setup_failure(&self) -> bool {
        true
    }

    /// Whether the caller may retry with a fresh execution
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CredentialLookup(CredentialStoreError::Unavailable(_))
                | Self::EngineStart(EngineError::QueueFull { .. })
        )
    }
}

/// Credential store infrastructure errors
///
/// An unknown or inaccessible id is not an error (`Ok(None)`). Messages
/// never carry secret material.
#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    /// Store could not be reached
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    /// Store failed internally
    #[error("credential store internal error: {0}")]
    Internal(String),
}

impl CredentialStoreError {
    /// Create unavailable error
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create internal error
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Engine enqueue failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// In-flight limit reached
    #[error("engine queue full (max in flight: {limit})")]
    QueueFull {
        /// Configured limit
        limit: usize,
    },

    /// No async runtime to spawn onto
    #[error("no async runtime available")]
    NoRuntime,

    /// Engine no longer accepts work
    #[error("engine shut down")]
    ShutDown,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// An overlay key name is empty
    #[error("overlay key `{0}` must not be empty")]
    EmptyKey(&'static str),

    /// Engine would never accept work
    #[error("engine.max_in_flight must be at least 1")]
    ZeroCapacity,

    /// More permits than the engine's semaphore can hold
    #[error("engine.max_in_flight must not exceed {max}")]
    CapacityTooLarge {
        /// Largest accepted value
        max: usize,
    },
}
