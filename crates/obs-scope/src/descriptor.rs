//! Step registration metadata

use serde::Serialize;

/// Context a step needs from the pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredContext {
    /// Build log listener
    Listener,
    /// Environment of the surrounding execution
    Environment,
    /// The running build
    Run,
}

/// How a step is exposed to pipeline authors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDescriptor {
    /// Name used in pipeline scripts
    pub function_name: &'static str,
    /// Human-readable name
    pub display_name: &'static str,
    /// Whether the step wraps a nested block
    pub takes_implicit_block: bool,
    /// Contexts the pipeline must provide
    pub required_context: &'static [RequiredContext],
}

impl StepDescriptor {
    /// The OBS scope step
    pub const WITH_OBS: Self = Self {
        function_name: "withOBS",
        display_name: "set OBS settings for nested block",
        takes_implicit_block: true,
        required_context: &[
            RequiredContext::Listener,
            RequiredContext::Environment,
            RequiredContext::Run,
        ],
    };

    /// Whether the pipeline must provide `context`
    #[must_use]
    pub fn requires(&self, context: RequiredContext) -> bool {
        self.required_context.contains(&context)
    }
}
