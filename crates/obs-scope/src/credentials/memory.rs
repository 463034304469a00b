//! In-process credential store

use super::{CredentialKind, CredentialStore, CredentialSummary, Principal, ResolvedCredential};
use crate::error::CredentialStoreError;
use crate::types::{CredentialId, ExecutionToken};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroizing;

/// Which jobs may see a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Every job
    Global,
    /// Only the listed jobs
    Jobs(BTreeSet<String>),
}

impl Access {
    /// Restrict to the given jobs
    #[must_use]
    pub fn jobs<I, S>(jobs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Jobs(jobs.into_iter().map(Into::into).collect())
    }

    /// Whether `principal` may see the credential
    #[must_use]
    pub fn permits(&self, principal: &Principal) -> bool {
        match (self, principal) {
            (Self::Global, _) | (_, Principal::System) => true,
            (Self::Jobs(jobs), Principal::Job(job)) => jobs.contains(job),
        }
    }
}

/// Credential held by [`MemoryCredentialStore`]
pub struct StoredCredential {
    kind: CredentialKind,
    username: Option<String>,
    secret: Zeroizing<String>,
    description: String,
    access: Access,
}

impl StoredCredential {
    /// Username/password credential, visible to every job
    #[must_use]
    pub fn username_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            kind: CredentialKind::UsernamePassword,
            username: Some(username.into()),
            secret: Zeroizing::new(password.into()),
            description: String::new(),
            access: Access::Global,
        }
    }

    /// Secret-text credential, visible to every job
    #[must_use]
    pub fn secret_text(secret: impl Into<String>) -> Self {
        Self {
            kind: CredentialKind::SecretText,
            username: None,
            secret: Zeroizing::new(secret.into()),
            description: String::new(),
            access: Access::Global,
        }
    }

    /// With description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With access restriction
    #[must_use]
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    fn summary(&self, id: &CredentialId) -> CredentialSummary {
        CredentialSummary {
            id: id.clone(),
            kind: self.kind,
            username: self.username.clone(),
            description: self.description.clone(),
        }
    }
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("access", &self.access)
            .finish_non_exhaustive()
    }
}

/// Credential store backed by a concurrent map
///
/// Only username/password credentials resolve. Entries restricted to other
/// jobs resolve to `None`. [`MemoryCredentialStore::set_unavailable`]
/// simulates an unreachable backend.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<CredentialId, StoredCredential>,
    unavailable: AtomicBool,
}

impl MemoryCredentialStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a credential
    pub fn insert(&self, id: impl Into<CredentialId>, credential: StoredCredential) {
        self.entries.insert(id.into(), credential);
    }

    /// Builder-style [`Self::insert`]
    #[must_use]
    pub fn with_credential(self, id: impl Into<CredentialId>, credential: StoredCredential) -> Self {
        self.insert(id, credential);
        self
    }

    /// Remove a credential
    pub fn remove(&self, id: &CredentialId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Number of stored credentials
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make every call fail with `CredentialStoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    fn ensure_available(&self) -> Result<(), CredentialStoreError> {
        if self.unavailable.load(Ordering::Acquire) {
            Err(CredentialStoreError::unavailable("memory store marked unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn resolve(
        &self,
        id: &CredentialId,
        execution: &ExecutionToken,
    ) -> Result<Option<ResolvedCredential>, CredentialStoreError> {
        self.ensure_available()?;

        let principal = Principal::Job(execution.job().to_owned());
        let resolved = self.entries.get(id).and_then(|entry| {
            let stored = entry.value();
            match (&stored.username, stored.kind) {
                (Some(username), CredentialKind::UsernamePassword)
                    if stored.access.permits(&principal) =>
                {
                    Some(ResolvedCredential::new(username.as_str(), stored.secret.as_str()))
                }
                _ => None,
            }
        });

        if resolved.is_none() {
            tracing::debug!(credentials_id = %id, job = execution.job(), "credential not visible");
        }
        Ok(resolved)
    }

    async fn list(
        &self,
        principal: &Principal,
    ) -> Result<Vec<CredentialSummary>, CredentialStoreError> {
        self.ensure_available()?;

        let mut visible: Vec<CredentialSummary> = self
            .entries
            .iter()
            .filter(|entry| entry.value().access.permits(principal))
            .map(|entry| entry.value().summary(entry.key()))
            .collect();
        visible.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryCredentialStore {
        MemoryCredentialStore::new()
            .with_credential("cred-1", StoredCredential::username_password("AK123", "SK456"))
            .with_credential("token", StoredCredential::secret_text("t0k3n"))
            .with_credential(
                "restricted",
                StoredCredential::username_password("AK9", "SK9")
                    .with_access(Access::jobs(["deploy"])),
            )
    }

    #[tokio::test]
    async fn resolves_username_password() {
        let resolved = store()
            .resolve(&"cred-1".into(), &ExecutionToken::new("build"))
            .await
            .unwrap()
            .expect("credential should resolve");

        assert_eq!(resolved.username(), "AK123");
        assert_eq!(resolved.expose_secret(), "SK456");
    }

    #[tokio::test]
    async fn unknown_id_is_a_miss() {
        let resolved = store()
            .resolve(&"missing".into(), &ExecutionToken::new("build"))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn other_kinds_do_not_resolve() {
        let resolved = store()
            .resolve(&"token".into(), &ExecutionToken::new("build"))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn restricted_credential_hidden_from_other_jobs() {
        let store = store();
        let id = CredentialId::new("restricted");

        assert!(store.resolve(&id, &ExecutionToken::new("build")).await.unwrap().is_none());
        assert!(store.resolve(&id, &ExecutionToken::new("deploy")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = store();
        store.set_unavailable(true);

        let err = store
            .resolve(&"cred-1".into(), &ExecutionToken::new("build"))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialStoreError::Unavailable(_)));
        assert!(store.list(&Principal::System).await.is_err());
    }

    #[tokio::test]
    async fn list_filters_by_principal() {
        let store = store();

        let system: Vec<_> = store
            .list(&Principal::System)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(system, vec!["cred-1", "restricted", "token"]);

        let build: Vec<_> = store
            .list(&Principal::Job("build".into()))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();
        assert_eq!(build, vec!["cred-1", "token"]);
    }

    #[test]
    fn debug_omits_secret() {
        let stored = StoredCredential::username_password("AK123", "SK456");
        assert!(!format!("{stored:?}").contains("SK456"));
    }

    #[test]
    fn remove_and_len() {
        let store = store();
        assert_eq!(store.len(), 3);
        assert!(store.remove(&"token".into()));
        assert!(!store.remove(&"token".into()));
        assert_eq!(store.len(), 2);
    }
}
