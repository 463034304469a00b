//! Core types for OBS scopes
//!
//! Defines the identifiers and declared parameters the injector works with:
//! - Execution tokens (job identity plus execution node)
//! - Credential references
//! - Declared scope parameters

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique execution node identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Ulid);

impl NodeId {
    /// Generate new node ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the running execution
///
/// `job` is the identity credential access is checked against; `node`
/// identifies the execution node within that job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionToken {
    job: String,
    node: NodeId,
}

impl ExecutionToken {
    /// Token for a new root node of `job`
    #[inline]
    #[must_use]
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            node: NodeId::new(),
        }
    }

    /// Token for a node nested under this one (same job, fresh node)
    #[inline]
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            job: self.job.clone(),
            node: NodeId::new(),
        }
    }

    /// Job identity
    #[inline]
    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Execution node
    #[inline]
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Opaque credential identifier
///
/// Not a secret. An empty id means "no credential override".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    /// Wrap an identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether no credential was declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CredentialId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CredentialId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Parameters a caller declares for an OBS scope
///
/// Every field defaults to the empty string. `credentials` is accepted as
/// an alias for `credentialsId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeParams {
    /// Region written to both region variables
    pub region: String,
    /// Endpoint URL
    pub endpoint_url: String,
    /// Credential to resolve
    #[serde(alias = "credentials")]
    pub credentials_id: CredentialId,
}

impl ScopeParams {
    /// Create parameters
    #[inline]
    #[must_use]
    pub fn new(
        region: impl Into<String>,
        endpoint_url: impl Into<String>,
        credentials_id: impl Into<CredentialId>,
    ) -> Self {
        Self {
            region: region.into(),
            endpoint_url: endpoint_url.into(),
            credentials_id: credentials_id.into(),
        }
    }

    /// Parse declared step arguments
    ///
    /// # Errors
    /// Returns the deserialization error if a field has the wrong type.
    pub fn from_json(args: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(args)
    }
}
