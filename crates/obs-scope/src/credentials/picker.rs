//! Credential choices for the step configuration UI
//!
//! Read-only query against the store; not part of the injector's runtime path.

use super::{CredentialKind, CredentialStore, CredentialSummary, Principal};
use crate::error::CredentialStoreError;
use serde::{Deserialize, Serialize};

/// Item (job) whose configuration form is being filled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemContext {
    /// Item name
    pub name: String,
    /// Whether the requesting user may configure the item
    pub can_configure: bool,
    /// Job identity when the item is itself a runnable task
    pub task_job: Option<String>,
}

impl ItemContext {
    /// Runnable task item
    #[must_use]
    pub fn task(name: impl Into<String>, can_configure: bool) -> Self {
        let name = name.into();
        Self {
            task_job: Some(name.clone()),
            name,
            can_configure,
        }
    }

    /// Non-task item (folder, view, ...)
    #[must_use]
    pub fn container(name: impl Into<String>, can_configure: bool) -> Self {
        Self {
            name: name.into(),
            can_configure,
            task_job: None,
        }
    }

    /// Identity credentials are listed as
    #[must_use]
    pub fn principal(&self) -> Principal {
        match &self.task_job {
            Some(job) => Principal::Job(job.clone()),
            None => Principal::System,
        }
    }
}

/// One entry of the picker list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceItem {
    /// Display text
    pub label: String,
    /// Submitted value (the credential id)
    pub value: String,
}

impl ChoiceItem {
    /// The leading "no credential" entry
    #[must_use]
    pub fn empty() -> Self {
        Self {
            label: "- none -".to_owned(),
            value: String::new(),
        }
    }

    fn from_summary(summary: &CredentialSummary) -> Self {
        let username = summary.username.as_deref().unwrap_or_default();
        let label = if summary.description.is_empty() {
            format!("{username}/******")
        } else {
            format!("{username}/****** ({})", summary.description)
        };
        Self {
            label,
            value: summary.id.to_string(),
        }
    }
}

/// Username/password credentials the item may pick from
///
/// Without an item, or without configure permission, the list is empty.
/// Otherwise it starts with [`ChoiceItem::empty`].
///
/// # Errors
/// Propagates store infrastructure failures.
pub async fn credential_choices(
    store: &dyn CredentialStore,
    item: Option<&ItemContext>,
) -> Result<Vec<ChoiceItem>, CredentialStoreError> {
    let Some(item) = item.filter(|item| item.can_configure) else {
        return Ok(Vec::new());
    };

    let visible = store.list(&item.principal()).await?;
    let mut choices = Vec::with_capacity(visible.len() + 1);
    choices.push(ChoiceItem::empty());
    choices.extend(
        visible
            .iter()
            .filter(|summary| summary.kind == CredentialKind::UsernamePassword)
            .map(ChoiceItem::from_summary),
    );
    Ok(choices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Access, MemoryCredentialStore, StoredCredential};

    fn store() -> MemoryCredentialStore {
        MemoryCredentialStore::new()
            .with_credential(
                "cred-1",
                StoredCredential::username_password("AK123", "SK456").with_description("obs prod"),
            )
            .with_credential("cred-2", StoredCredential::username_password("AK2", "SK2"))
            .with_credential("token", StoredCredential::secret_text("t0k3n"))
            .with_credential(
                "deploy-only",
                StoredCredential::username_password("AK9", "SK9")
                    .with_access(Access::jobs(["deploy"])),
            )
    }

    #[tokio::test]
    async fn no_item_no_choices() {
        let choices = credential_choices(&store(), None).await.unwrap();
        assert!(choices.is_empty());
    }

    #[tokio::test]
    async fn no_configure_permission_no_choices() {
        let item = ItemContext::task("build", false);
        let choices = credential_choices(&store(), Some(&item)).await.unwrap();
        assert!(choices.is_empty());
    }

    #[tokio::test]
    async fn task_sees_its_credentials() {
        let item = ItemContext::task("build", true);
        let choices = credential_choices(&store(), Some(&item)).await.unwrap();

        let values: Vec<_> = choices.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["", "cred-1", "cred-2"]);
        assert_eq!(choices[1].label, "AK123/****** (obs prod)");
        assert_eq!(choices[2].label, "AK2/******");
    }

    #[tokio::test]
    async fn container_lists_as_system() {
        let item = ItemContext::container("folder", true);
        let choices = credential_choices(&store(), Some(&item)).await.unwrap();

        let values: Vec<_> = choices.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["", "cred-1", "cred-2", "deploy-only"]);
    }

    #[tokio::test]
    async fn labels_never_contain_secrets() {
        let item = ItemContext::container("folder", true);
        let choices = credential_choices(&store(), Some(&item)).await.unwrap();
        assert!(choices.iter().all(|c| !c.label.contains("SK")));
    }
}
