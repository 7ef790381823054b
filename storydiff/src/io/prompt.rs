//! Prompt construction for the chat session.
//!
//! All natural-language text sent to the model lives in `prompts/` and is
//! rendered with minijinja. The diff request embeds the repository snapshot
//! after it has passed through a [`SnapshotPolicy`].

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::io::snapshot::RepositorySnapshot;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const KICKOFF_TEMPLATE: &str = include_str!("prompts/kickoff.md");
const REMINDER_TEMPLATE: &str = include_str!("prompts/reminder.md");
const DIFF_REQUEST_TEMPLATE: &str = include_str!("prompts/diff_request.md");

/// Decides which snapshot files are embedded in the diff request.
pub trait SnapshotPolicy {
    fn apply(&self, snapshot: &RepositorySnapshot) -> PolicyOutcome;
}

/// Files kept for the prompt plus the paths that were left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub kept: RepositorySnapshot,
    pub omitted: Vec<String>,
}

/// Embed every file verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullSnapshot;

impl SnapshotPolicy for FullSnapshot {
    fn apply(&self, snapshot: &RepositorySnapshot) -> PolicyOutcome {
        PolicyOutcome {
            kept: snapshot.clone(),
            omitted: Vec::new(),
        }
    }
}

/// Keep whole files in path order while their combined path + content size
/// fits in `budget_bytes`. Files are never cut; one that does not fit is
/// omitted and later, smaller files may still be kept.
#[derive(Debug, Clone, Copy)]
pub struct ByteBudget {
    pub budget_bytes: usize,
}

impl SnapshotPolicy for ByteBudget {
    fn apply(&self, snapshot: &RepositorySnapshot) -> PolicyOutcome {
        let mut outcome = PolicyOutcome::default();
        let mut used = 0usize;
        for (path, content) in snapshot {
            let cost = path.len() + content.len();
            if used + cost <= self.budget_bytes {
                used += cost;
                outcome.kept.insert(path.clone(), content.clone());
            } else {
                debug!(path = %path, bytes = cost, "omitted file for prompt budget");
                outcome.omitted.push(path.clone());
            }
        }
        outcome
    }
}

/// Identity of the story and repository the diff is requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRequestInputs {
    pub story_key: String,
    pub story_summary: String,
    pub owner: String,
    pub repo_name: String,
}

#[derive(Debug, Serialize)]
struct FileContext<'a> {
    path: &'a str,
    content: &'a str,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("kickoff", KICKOFF_TEMPLATE)
            .expect("kickoff template should be valid");
        env.add_template("reminder", REMINDER_TEMPLATE)
            .expect("reminder template should be valid");
        env.add_template("diff_request", DIFF_REQUEST_TEMPLATE)
            .expect("diff request template should be valid");
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

/// Builds the diff request and the fixed conversation messages.
pub struct PromptBuilder {
    engine: PromptEngine,
    policy: Box<dyn SnapshotPolicy>,
}

impl PromptBuilder {
    /// Builder embedding the whole snapshot, or capped at `budget_bytes`.
    pub fn new(budget_bytes: Option<usize>) -> Self {
        match budget_bytes {
            Some(budget_bytes) => Self::with_policy(Box::new(ByteBudget { budget_bytes })),
            None => Self::with_policy(Box::new(FullSnapshot)),
        }
    }

    pub fn with_policy(policy: Box<dyn SnapshotPolicy>) -> Self {
        Self {
            engine: PromptEngine::new(),
            policy,
        }
    }

    /// Render the instruction asking the model for a unified diff.
    ///
    /// Deterministic for identical inputs: files are emitted in path order.
    pub fn build_diff_request(
        &self,
        inputs: &DiffRequestInputs,
        snapshot: &RepositorySnapshot,
    ) -> Result<String> {
        let outcome = self.policy.apply(snapshot);
        let files: Vec<FileContext<'_>> = outcome
            .kept
            .iter()
            .map(|(path, content)| FileContext { path, content })
            .collect();
        debug!(
            files = files.len(),
            omitted = outcome.omitted.len(),
            "rendering diff request"
        );
        self.engine.render(
            "diff_request",
            context! {
                story_key => &inputs.story_key,
                story_summary => &inputs.story_summary,
                owner => &inputs.owner,
                repo_name => &inputs.repo_name,
                files => files,
                omitted => outcome.omitted,
            },
        )
    }

    pub fn system_message(&self) -> Result<String> {
        self.engine.render("system", context! {})
    }

    pub fn kickoff_message(&self, tool_name: &str) -> Result<String> {
        self.engine.render("kickoff", context! { tool_name => tool_name })
    }

    pub fn diff_reminder(&self) -> Result<String> {
        self.engine.render("reminder", context! {})
    }
}
