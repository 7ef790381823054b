//! Shared deterministic types for the storydiff core.
//!
//! These types define stable contracts between the planner, the orchestrator
//! and the patch writer. They carry no I/O and serialize deterministically.

use serde::{Deserialize, Serialize};

/// A tracker issue considered for implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub key: String,
    pub summary: String,
    /// Effort estimate (story points). `None` when the issue is unestimated.
    pub effort_points: Option<f64>,
}

/// Outcome of the `plan_least_story` tool.
///
/// Serialized untagged: the tool message the model sees is either
/// `{"story_key", "story_summary", "prompt"}` or `{"error"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanResult {
    Ready {
        story_key: String,
        story_summary: String,
        prompt: String,
    },
    Failed {
        error: String,
    },
}

impl PlanResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn story_key(&self) -> Option<&str> {
        match self {
            Self::Ready { story_key, .. } => Some(story_key),
            Self::Failed { .. } => None,
        }
    }
}

/// An accepted diff ready to be persisted under `<story_key>.patch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchArtifact {
    pub story_key: String,
    pub diff: String,
}
