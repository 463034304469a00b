//! Working environment observed by nested blocks

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered set of environment variables
///
/// Insertion order is preserved. Overriding an existing variable keeps its
/// position and replaces the value. An empty value is stored as-is, which
/// is how an overlay clears a variable set by an outer scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    vars: IndexMap<String, String>,
}

impl Environment {
    /// Create empty environment
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Whether the variable is present (possibly with an empty value)
    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Set `key` to `value`, replacing any previous value
    #[inline]
    pub fn override_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Apply every pair in order; later pairs win
    pub fn override_all<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in vars {
            self.override_var(key, value);
        }
    }

    /// Remove a variable, returning its value
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.shift_remove(key)
    }

    /// Number of variables
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the environment has no variables
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate variables in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Self::new();
        env.override_all(iter);
        env
    }
}
