//! Overlay providers and layered composition

use crate::environment::Environment;
use std::sync::Arc;

/// Expands a working environment with a scope's overrides
///
/// Providers are shared read-only between the engine and every nested
/// block layered on top of them, so `expand` must not depend on mutable
/// state.
pub trait OverlayProvider: Send + Sync + std::fmt::Debug {
    /// Apply this provider's overrides to `env`
    fn expand(&self, env: &mut Environment);
}

/// Two providers applied in order: `outer` first, then `inner`
///
/// The inner provider wins on conflicting keys; keys only the outer
/// provider sets pass through unchanged. Neither provider is mutated.
#[derive(Debug, Clone)]
pub struct Layered {
    outer: Arc<dyn OverlayProvider>,
    inner: Arc<dyn OverlayProvider>,
}

impl Layered {
    /// Stack `inner` on top of `outer`
    #[inline]
    #[must_use]
    pub fn new(outer: Arc<dyn OverlayProvider>, inner: Arc<dyn OverlayProvider>) -> Self {
        Self { outer, inner }
    }

    /// Compose a new overlay with the ambient one, if any
    ///
    /// Without an ambient provider the new overlay is returned as-is.
    #[must_use]
    pub fn merge(
        ambient: Option<Arc<dyn OverlayProvider>>,
        overlay: Arc<dyn OverlayProvider>,
    ) -> Arc<dyn OverlayProvider> {
        match ambient {
            Some(outer) => Arc::new(Self::new(outer, overlay)),
            None => overlay,
        }
    }

    /// Provider applied first
    #[inline]
    #[must_use]
    pub fn outer(&self) -> &Arc<dyn OverlayProvider> {
        &self.outer
    }

    /// Provider applied last
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn OverlayProvider> {
        &self.inner
    }
}

impl OverlayProvider for Layered {
    fn expand(&self, env: &mut Environment) {
        self.outer.expand(env);
        self.inner.expand(env);
    }
}

/// Expand `provider` onto an empty environment
#[must_use]
pub fn expanded(provider: &dyn OverlayProvider) -> Environment {
    let mut env = Environment::new();
    provider.expand(&mut env);
    env
}
