//! OBS Overlay
//!
//! Environment-style key/value overlays scoped to a nested unit of work.
//!
//! # Core Concepts
//!
//! - [`Environment`]: The working environment a nested block observes
//! - [`OverlaySpec`]: Ordered set of overrides built for one invocation
//! - [`OverlayProvider`]: Anything that can expand an [`Environment`]
//! - [`Layered`]: Ambient provider with a new provider stacked on top
//! - [`build`]: Turns declared OBS settings into an [`OverlaySpec`]
//!
//! # Example
//!
//! ```rust
//! use obs_overlay::{build, Environment, Layered, OverlayKeys, OverlayProvider};
//! use std::sync::Arc;
//!
//! let spec = build(&OverlayKeys::default(), "eu-west", "https://obs.example.com", None);
//! let composed = Layered::merge(None, Arc::new(spec));
//!
//! let mut env = Environment::new();
//! composed.expand(&mut env);
//! assert_eq!(env.get("OBS_REGION"), Some("eu-west"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod builder;
mod environment;
mod provider;
mod spec;

pub use builder::{build, build_default, KeyMaterial, OverlayKeys};
pub use environment::Environment;
pub use provider::{expanded, Layered, OverlayProvider};
pub use spec::OverlaySpec;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
