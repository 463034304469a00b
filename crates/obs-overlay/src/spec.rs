//! Overrides built for a single invocation

use crate::environment::Environment;
use crate::provider::OverlayProvider;
use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// Ordered set of overrides for one nested block
///
/// Keys are unique. Inserting an existing key keeps its original position
/// and replaces the value (last write wins). Keys inserted through
/// [`OverlaySpec::insert_sensitive`] are masked in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct OverlaySpec {
    entries: IndexMap<String, String>,
    sensitive: IndexSet<String>,
}

impl OverlaySpec {
    /// Create empty spec
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an override
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Insert or replace an override holding secret material
    pub fn insert_sensitive(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        let key = key.into();
        self.sensitive.insert(key.clone());
        self.entries.insert(key, value.into());
        self
    }

    /// Look up an override
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether `key` is overridden
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether `key` holds secret material
    #[inline]
    #[must_use]
    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive.contains(key)
    }

    /// Number of overrides
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no overrides
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Override keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Overrides in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OverlaySpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut spec = Self::new();
        for (key, value) in iter {
            spec.insert(key, value);
        }
        spec
    }
}

impl OverlayProvider for OverlaySpec {
    fn expand(&self, env: &mut Environment) {
        env.override_all(self.iter());
    }
}

impl fmt::Debug for OverlaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.entries {
            if self.sensitive.contains(key) {
                map.entry(key, &"***");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}
