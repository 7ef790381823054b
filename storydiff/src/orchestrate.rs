//! Chat session driving the model from tool call to accepted diff.
//!
//! # Flow
//!
//! 1. Send the system and kickoff messages with the registry's tools,
//!    forcing `plan_least_story`.
//! 2. Dispatch every tool call in the reply and append the results.
//! 3. Ask for the diff without tools, up to `max_diff_attempts` times,
//!    appending one reminder after each reply that is not a unified diff.
//!
//! Every assistant reply is appended to the conversation before the next
//! request, so the model always sees the full history.

use anyhow::{Context, Result, bail};
use tracing::{error, info, instrument, warn};

use crate::core::conversation::{ChatMessage, Conversation};
use crate::core::diff_shape::{looks_like_unified_diff, missing_markers};
use crate::core::types::{PatchArtifact, PlanResult};
use crate::io::chat::{ChatClient, ChatRequest};
use crate::io::config::AppConfig;
use crate::io::prompt::PromptBuilder;
use crate::tools::{PLAN_TOOL_NAME, ToolOutput, ToolRegistry};

/// Terminal state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A reply passed the diff-shape check on attempt `attempts`.
    Accepted {
        artifact: PatchArtifact,
        attempts: u32,
    },
    /// The model answered without producing a plan; `content` is its text.
    NoToolCall { content: String },
    /// The planning tool returned an error.
    PlanFailed { error: String },
    /// Every diff attempt was rejected.
    Exhausted { attempts: u32 },
}

/// Run one session to a terminal state.
///
/// Only chat transport failures and prompt rendering errors are returned as
/// `Err`; everything the model or the tools do wrong ends in a
/// [`SessionOutcome`].
#[instrument(skip_all, fields(model = %config.model.model, max_attempts = config.max_diff_attempts))]
pub fn run_session(
    client: &dyn ChatClient,
    registry: &ToolRegistry<'_>,
    config: &AppConfig,
    prompts: &PromptBuilder,
) -> Result<SessionOutcome> {
    if !registry.contains(PLAN_TOOL_NAME) {
        bail!("tool registry does not offer {PLAN_TOOL_NAME}");
    }

    let mut conversation = Conversation::new();
    conversation.push(ChatMessage::system(prompts.system_message()?));
    conversation.push(ChatMessage::user(prompts.kickoff_message(PLAN_TOOL_NAME)?));

    let request = ChatRequest::with_tools(
        &config.model,
        &conversation,
        registry.definitions(),
        Some(PLAN_TOOL_NAME),
    );
    info!("requesting tool decision");
    let reply = client
        .complete(&request)
        .context("tool decision request failed")?;
    conversation.push(reply.clone());

    if reply.tool_calls.is_empty() {
        warn!("model did not call any tool");
        return Ok(SessionOutcome::NoToolCall {
            content: reply.content_text().to_string(),
        });
    }

    let mut plan: Option<PlanResult> = None;
    for call in &reply.tool_calls {
        let output = registry.dispatch(call);
        conversation.push(ChatMessage::tool(&call.id, output.to_content()));
        if let ToolOutput::Plan(result) = output {
            plan.get_or_insert(result);
        }
    }

    let story_key = match plan {
        None => {
            warn!(calls = reply.tool_calls.len(), "no tool call produced a plan");
            return Ok(SessionOutcome::NoToolCall {
                content: reply.content_text().to_string(),
            });
        }
        Some(PlanResult::Failed { error }) => {
            error!(error = %error, "plan_least_story failed");
            return Ok(SessionOutcome::PlanFailed { error });
        }
        Some(PlanResult::Ready { story_key, .. }) => story_key,
    };

    let reminder = prompts.diff_reminder()?;
    for attempt in 1..=config.max_diff_attempts {
        info!(attempt, story_key = %story_key, "requesting diff");
        let request = ChatRequest::plain(&config.model, &conversation);
        let reply = client
            .complete(&request)
            .with_context(|| format!("diff request {attempt} failed"))?;
        let content = reply.content_text().to_string();
        conversation.push(reply);

        if looks_like_unified_diff(&content) {
            info!(attempt, bytes = content.len(), "diff accepted");
            return Ok(SessionOutcome::Accepted {
                artifact: PatchArtifact {
                    story_key,
                    diff: content,
                },
                attempts: attempt,
            });
        }

        warn!(
            attempt,
            missing = ?missing_markers(&content),
            "reply is not a unified diff"
        );
        conversation.push(ChatMessage::user(reminder.clone()));
    }

    error!(
        attempts = config.max_diff_attempts,
        "no valid diff after all attempts"
    );
    Ok(SessionOutcome::Exhausted {
        attempts: config.max_diff_attempts,
    })
}
