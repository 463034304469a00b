//! Credential store integration
//!
//! - [`CredentialStore`] is the narrow interface the injector consumes
//! - [`ResolvedCredential`] holds secret material only until the overlay is built
//! - [`MemoryCredentialStore`] is an in-process backend with per-job access
//! - [`credential_choices`] backs the credential picker

mod memory;
mod picker;

pub use memory::{Access, MemoryCredentialStore, StoredCredential};
pub use picker::{credential_choices, ChoiceItem, ItemContext};

use crate::error::CredentialStoreError;
use crate::types::{CredentialId, ExecutionToken};
use async_trait::async_trait;
use obs_overlay::KeyMaterial;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Credential lookup interface
///
/// Access control is enforced by the store. An unknown id, a credential of
/// another kind, or one the execution may not see all come back as
/// `Ok(None)` so callers cannot enumerate what exists.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Resolve `id` for the given execution
    ///
    /// # Errors
    /// Only infrastructure failures; never "not found".
    async fn resolve(
        &self,
        id: &CredentialId,
        execution: &ExecutionToken,
    ) -> Result<Option<ResolvedCredential>, CredentialStoreError>;

    /// Credentials visible to `principal`, without secret material
    ///
    /// # Errors
    /// Only infrastructure failures.
    async fn list(
        &self,
        principal: &Principal,
    ) -> Result<Vec<CredentialSummary>, CredentialStoreError>;
}

/// Username and secret resolved for one invocation
///
/// Zeroized on drop. `Debug` never prints either field.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ResolvedCredential {
    username: String,
    secret: String,
}

impl ResolvedCredential {
    /// Create a resolved credential
    #[inline]
    #[must_use]
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Username (used as the access key id)
    #[inline]
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plaintext secret. Do not keep the returned reference around.
    #[inline]
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.secret
    }
}

impl KeyMaterial for ResolvedCredential {
    fn access_key_id(&self) -> &str {
        &self.username
    }

    fn secret_access_key(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResolvedCredential(***)")
    }
}

/// Who a listing is performed for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    /// Unrestricted system identity
    System,
    /// A job's own identity
    Job(String),
}

/// Kind of stored credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialKind {
    /// Username plus password; the only kind an OBS scope can use
    UsernamePassword,
    /// Single secret string
    SecretText,
}

/// Non-secret view of a stored credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    /// Identifier
    pub id: CredentialId,
    /// Kind
    pub kind: CredentialKind,
    /// Username, if the kind has one
    pub username: Option<String>,
    /// Free-form description
    pub description: String,
}
