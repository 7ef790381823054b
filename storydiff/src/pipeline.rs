//! End-to-end workflow behind `storydiff run`.
//!
//! Wires the planner and tool registry to the chat session, then persists an
//! accepted diff. Output to stdout is left to the caller.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, instrument};

use crate::exit_codes;
use crate::io::chat::ChatClient;
use crate::io::config::AppConfig;
use crate::io::git::RepoCloner;
use crate::io::patch::write_patch;
use crate::io::prompt::PromptBuilder;
use crate::io::tracker::Tracker;
use crate::orchestrate::{SessionOutcome, run_session};
use crate::plan::Planner;
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip writing the patch file.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Diff accepted. `path` is `None` on a dry run.
    Saved {
        story_key: String,
        diff: String,
        path: Option<PathBuf>,
    },
    NoToolCall { content: String },
    PlanFailed { error: String },
    Exhausted { attempts: u32 },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Saved { .. } | RunOutcome::NoToolCall { .. } => exit_codes::OK,
            RunOutcome::PlanFailed { .. } | RunOutcome::Exhausted { .. } => exit_codes::FAILED,
        }
    }

    /// Text for stdout: the diff, or the model's reply when it skipped the tool.
    pub fn stdout_text(&self) -> Option<&str> {
        match self {
            RunOutcome::Saved { diff, .. } => Some(diff),
            RunOutcome::NoToolCall { content } => Some(content),
            RunOutcome::PlanFailed { .. } | RunOutcome::Exhausted { .. } => None,
        }
    }
}

/// Run a full session and persist the result.
#[instrument(skip_all, fields(dry_run = options.dry_run))]
pub fn run_pipeline(
    client: &dyn ChatClient,
    tracker: &dyn Tracker,
    cloner: &dyn RepoCloner,
    config: &AppConfig,
    options: RunOptions,
) -> Result<RunOutcome> {
    let prompts = PromptBuilder::new(config.prompt_budget_bytes);
    let planner = Planner::new(tracker, cloner, config, &prompts);
    let registry = ToolRegistry::planning(planner)?;

    let outcome = match run_session(client, &registry, config, &prompts)? {
        SessionOutcome::Accepted { artifact, attempts } => {
            let path = if options.dry_run {
                info!(story_key = %artifact.story_key, attempts, "dry run, patch not written");
                None
            } else {
                Some(write_patch(&config.output_dir, &artifact)?)
            };
            RunOutcome::Saved {
                story_key: artifact.story_key,
                diff: artifact.diff,
                path,
            }
        }
        SessionOutcome::NoToolCall { content } => RunOutcome::NoToolCall { content },
        SessionOutcome::PlanFailed { error } => RunOutcome::PlanFailed { error },
        SessionOutcome::Exhausted { attempts } => RunOutcome::Exhausted { attempts },
    };
    Ok(outcome)
}
