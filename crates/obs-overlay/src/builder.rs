//! Overlay builder for declared OBS settings
//!
//! Pure function from the caller's declared settings (plus an optionally
//! resolved credential) to an [`OverlaySpec`]. No I/O and no errors.

use crate::spec::OverlaySpec;
use serde::{Deserialize, Serialize};

/// Access key pair a credential store resolved
///
/// Implemented by the credential type of the store integration so the
/// builder never needs to own or copy the secret beyond the spec it returns.
pub trait KeyMaterial {
    /// Access key id (the credential's username)
    fn access_key_id(&self) -> &str;

    /// Plaintext secret access key
    fn secret_access_key(&self) -> &str;
}

/// Environment variable names written by the builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayKeys {
    /// Default region variable
    #[serde(default = "default_default_region")]
    pub default_region: String,

    /// Region variable
    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint URL variable
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// Access key id variable
    #[serde(default = "default_access_key_id")]
    pub access_key_id: String,

    /// Secret access key variable
    #[serde(default = "default_secret_access_key")]
    pub secret_access_key: String,
}

fn default_default_region() -> String {
    "OBS_DEFAULT_REGION".to_owned()
}

fn default_region() -> String {
    "OBS_REGION".to_owned()
}

fn default_endpoint_url() -> String {
    "OBS_ENDPOINT_URL".to_owned()
}

fn default_access_key_id() -> String {
    "OBS_ACCESS_KEY_ID".to_owned()
}

fn default_secret_access_key() -> String {
    "OBS_SECRET_ACCESS_KEY".to_owned()
}

impl Default for OverlayKeys {
    fn default() -> Self {
        Self {
            default_region: default_default_region(),
            region: default_region(),
            endpoint_url: default_endpoint_url(),
            access_key_id: default_access_key_id(),
            secret_access_key: default_secret_access_key(),
        }
    }
}

impl OverlayKeys {
    /// Name of the first key field left empty, if any
    #[must_use]
    pub fn first_empty(&self) -> Option<&'static str> {
        [
            ("default_region", &self.default_region),
            ("region", &self.region),
            ("endpoint_url", &self.endpoint_url),
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
    }
}

/// Build the overlay for one invocation
///
/// Both region keys are set to `region` and the endpoint key to
/// `endpoint_url`, even when empty: an empty value clears whatever an
/// outer scope set. Credential keys are added only when `credential` is
/// present.
#[must_use]
pub fn build(
    keys: &OverlayKeys,
    region: &str,
    endpoint_url: &str,
    credential: Option<&dyn KeyMaterial>,
) -> OverlaySpec {
    let mut spec = OverlaySpec::new();
    spec.insert(keys.default_region.as_str(), region)
        .insert(keys.region.as_str(), region)
        .insert(keys.endpoint_url.as_str(), endpoint_url);

    if let Some(credential) = credential {
        spec.insert(keys.access_key_id.as_str(), credential.access_key_id())
            .insert_sensitive(
                keys.secret_access_key.as_str(),
                credential.secret_access_key(),
            );
    }

    spec
}

/// [`build`] with the default key names
#[inline]
#[must_use]
pub fn build_default(
    region: &str,
    endpoint_url: &str,
    credential: Option<&dyn KeyMaterial>,
) -> OverlaySpec {
    build(&OverlayKeys::default(), region, endpoint_url, credential)
}
