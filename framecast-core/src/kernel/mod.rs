//! Compute kernel abstraction
//!
//! The kernel turns one input frame plus generation parameters into one
//! output frame. It is opaque to the coordinator: implementations may hold
//! model weights, share them across sessions, or take arbitrarily long.

mod builtin;
mod frame;

pub use builtin::{InvertGenerator, PassthroughGenerator};
pub use frame::Frame;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Parameters the client controls, applied to every generated frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub strength: f32,
    pub guidance_scale: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            steps: 2,
            strength: 0.5,
            guidance_scale: 1.2,
        }
    }
}

/// Everything one `predict` call sees
#[derive(Debug, Clone, Copy)]
pub struct PredictRequest<'a> {
    pub params: &'a GenerationParams,
    pub width: u32,
    pub height: u32,
    pub image: &'a Frame,
}

/// The opaque generate operation
///
/// Called from a blocking worker thread, never from the async runtime.
pub trait FrameGenerator: Send + Sync {
    /// Produce an output frame, or `None` when there is nothing to render this tick
    fn predict(&self, request: &PredictRequest<'_>) -> Result<Option<Frame>, KernelError>;

    /// Short name used in logs and settings
    fn name(&self) -> &str;
}

/// Built-in generators selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    #[default]
    Passthrough,
    Invert,
}

impl GeneratorKind {
    /// Instantiate the generator
    pub fn build(self) -> Arc<dyn FrameGenerator> {
        match self {
            Self::Passthrough => Arc::new(PassthroughGenerator),
            Self::Invert => Arc::new(InvertGenerator),
        }
    }
}

impl std::fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passthrough => write!(f, "passthrough"),
            Self::Invert => write!(f, "invert"),
        }
    }
}

impl FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passthrough" => Ok(Self::Passthrough),
            "invert" => Ok(Self::Invert),
            other => Err(format!(
                "unknown kernel '{}', expected 'passthrough' or 'invert'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_reject_unknown_fields() {
        let result: Result<GenerationParams, _> = serde_json::from_value(serde_json::json!({
            "prompt": "a cat",
            "negative_prompt": "",
            "steps": 2,
            "strength": 0.5,
            "guidance_scale": 1.0,
            "seed": 42
        }));
        assert!(result.is_err());
    }

    #[test]
    fn params_require_every_field() {
        let result: Result<GenerationParams, _> =
            serde_json::from_value(serde_json::json!({ "prompt": "a cat" }));
        assert!(result.is_err());
    }

    #[test]
    fn generator_kind_parses_case_insensitively() {
        assert_eq!("Invert".parse::<GeneratorKind>(), Ok(GeneratorKind::Invert));
        assert_eq!(
            "passthrough".parse::<GeneratorKind>(),
            Ok(GeneratorKind::Passthrough)
        );
        assert!("diffusion".parse::<GeneratorKind>().is_err());
    }

    #[test]
    fn generator_kind_builds_named_generator() {
        assert_eq!(GeneratorKind::Invert.build().name(), "invert");
        assert_eq!(GeneratorKind::Passthrough.build().name(), "passthrough");
    }
}
