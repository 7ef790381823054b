//! The `plan_least_story` capability.
//!
//! Selects a story from the tracker, clones the target repository into a
//! scoped temporary directory, snapshots it and renders the diff request.
//! Every failure is returned in-band as [`PlanResult::Failed`] so the chat
//! session can decide what to do with it.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::selector::select_story;
use crate::core::types::{PlanResult, Story};
use crate::io::config::AppConfig;
use crate::io::git::{Git, RepoCloner, RepoSource};
use crate::io::prompt::{DiffRequestInputs, PromptBuilder};
use crate::io::snapshot::read_snapshot;
use crate::io::tracker::Tracker;

const HEAD_SHA_LEN: usize = 12;

/// Failure kinds reported through [`PlanResult::Failed`].
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("tracker connection failed: {0}")]
    TrackerConnection(String),
    #[error("tracker query failed: {0}")]
    TrackerQuery(String),
    #[error("no stories found in project {project}")]
    NoStoriesFound { project: String },
    #[error("clone of {repo} failed: {reason}")]
    Clone { repo: String, reason: String },
    #[error("repository snapshot failed: {0}")]
    Snapshot(String),
    #[error("prompt rendering failed: {0}")]
    Prompt(String),
}

/// Collaborators the planner needs, borrowed for one session.
pub struct Planner<'a> {
    tracker: &'a dyn Tracker,
    cloner: &'a dyn RepoCloner,
    config: &'a AppConfig,
    prompts: &'a PromptBuilder,
}

impl<'a> Planner<'a> {
    pub fn new(
        tracker: &'a dyn Tracker,
        cloner: &'a dyn RepoCloner,
        config: &'a AppConfig,
        prompts: &'a PromptBuilder,
    ) -> Self {
        Self {
            tracker,
            cloner,
            config,
            prompts,
        }
    }

    /// Run the whole plan and fold any failure into the result.
    #[instrument(skip_all, fields(project = %self.config.tracker.project))]
    pub fn plan_least_story(&self) -> PlanResult {
        match self.try_plan() {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "planning failed");
                PlanResult::failed(err.to_string())
            }
        }
    }

    fn try_plan(&self) -> Result<PlanResult, PlanError> {
        let story = self.choose_story()?;
        let source = RepoSource::from_config(&self.config.repository);

        let workdir = tempfile::Builder::new()
            .prefix("storydiff-clone-")
            .tempdir()
            .map_err(|err| PlanError::Clone {
                repo: source.slug(),
                reason: format!("create temporary directory: {err}"),
            })?;

        self.cloner
            .clone_into(&source, workdir.path())
            .map_err(|err| PlanError::Clone {
                repo: source.slug(),
                reason: source.redact(&format!("{err:#}")),
            })?;

        match Git::new(workdir.path()).head_short_sha(HEAD_SHA_LEN) {
            Ok(sha) => info!(repo = %source.slug(), head = %sha, "repository cloned"),
            Err(err) => {
                debug!(error = %source.redact(&format!("{err:#}")), "HEAD not resolvable");
                info!(repo = %source.slug(), "repository cloned");
            }
        }

        let snapshot = read_snapshot(workdir.path())
            .map_err(|err| PlanError::Snapshot(format!("{err:#}")))?;
        info!(files = snapshot.len(), "repository snapshot read");

        // The clone is only needed for the snapshot.
        if let Err(err) = workdir.close() {
            warn!(error = %err, "failed to remove clone directory");
        }

        let inputs = DiffRequestInputs {
            story_key: story.key.clone(),
            story_summary: story.summary.clone(),
            owner: source.owner.clone(),
            repo_name: source.name.clone(),
        };
        let prompt = self
            .prompts
            .build_diff_request(&inputs, &snapshot)
            .map_err(|err| PlanError::Prompt(format!("{err:#}")))?;
        info!(story_key = %story.key, prompt_bytes = prompt.len(), "diff request ready");

        Ok(PlanResult::Ready {
            story_key: story.key,
            story_summary: story.summary,
            prompt,
        })
    }

    fn choose_story(&self) -> Result<Story, PlanError> {
        let tracker_cfg = &self.config.tracker;
        self.tracker
            .authenticate()
            .map_err(|err| PlanError::TrackerConnection(format!("{err:#}")))?;

        let stories = self
            .tracker
            .search_stories(&tracker_cfg.project, tracker_cfg.max_results)
            .map_err(|err| PlanError::TrackerQuery(format!("{err:#}")))?;
        info!(count = stories.len(), "stories retrieved");

        let story = select_story(&stories, tracker_cfg.selection)
            .cloned()
            .ok_or_else(|| PlanError::NoStoriesFound {
                project: tracker_cfg.project.clone(),
            })?;
        info!(
            story_key = %story.key,
            summary = %story.summary,
            effort = ?story.effort_points,
            rule = tracker_cfg.selection.as_str(),
            "story selected"
        );
        Ok(story)
    }
}
