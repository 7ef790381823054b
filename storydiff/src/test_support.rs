//! Test-only fakes for the tracker, cloner and chat boundaries.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::core::conversation::{ChatMessage, ToolCall};
use crate::core::types::Story;
use crate::io::chat::{ChatClient, ChatRequest};
use crate::io::config::AppConfig;
use crate::io::git::{RepoCloner, RepoSource};
use crate::io::tracker::Tracker;

/// Configuration with every required field filled in.
pub fn sample_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.tracker.url = "https://jira.example.com".to_string();
    config.tracker.user = "bot@example.com".to_string();
    config.tracker.token = "jira-secret".to_string();
    config.tracker.project = "PROJ".to_string();
    config.repository.owner = "acme".to_string();
    config.repository.name = "service".to_string();
    config.repository.token = "ghp_secret_token".to_string();
    config.model.api_key = "sk-test".to_string();
    config
}

pub fn story(key: &str, summary: &str, effort_points: Option<f64>) -> Story {
    Story {
        key: key.to_string(),
        summary: summary.to_string(),
        effort_points,
    }
}

/// Tracker returning a fixed result set, or failing at a chosen step.
#[derive(Debug, Default)]
pub struct StaticTracker {
    stories: Vec<Story>,
    auth_error: Option<String>,
    search_error: Option<String>,
    searches: Cell<usize>,
}

impl StaticTracker {
    pub fn with_stories(stories: Vec<Story>) -> Self {
        Self {
            stories,
            ..Self::default()
        }
    }

    pub fn failing_auth(message: &str) -> Self {
        Self {
            auth_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_search(message: &str) -> Self {
        Self {
            search_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn search_count(&self) -> usize {
        self.searches.get()
    }
}

impl Tracker for StaticTracker {
    fn authenticate(&self) -> Result<()> {
        match &self.auth_error {
            Some(message) => Err(anyhow!("{message}")),
            None => Ok(()),
        }
    }

    fn search_stories(&self, _project: &str, max_results: u32) -> Result<Vec<Story>> {
        self.searches.set(self.searches.get() + 1);
        if let Some(message) = &self.search_error {
            return Err(anyhow!("{message}"));
        }
        Ok(self
            .stories
            .iter()
            .take(max_results as usize)
            .cloned()
            .collect())
    }
}

/// Cloner that writes fixture files instead of running git.
#[derive(Debug, Default)]
pub struct FixtureCloner {
    files: Vec<(String, String)>,
    error: Option<String>,
    destinations: RefCell<Vec<PathBuf>>,
}

impl FixtureCloner {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Every directory a clone was requested into.
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.destinations.borrow().clone()
    }
}

impl RepoCloner for FixtureCloner {
    fn clone_into(&self, _source: &RepoSource, dest: &Path) -> Result<()> {
        self.destinations.borrow_mut().push(dest.to_path_buf());
        if let Some(message) = &self.error {
            return Err(anyhow!("{message}"));
        }
        for (path, content) in &self.files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, content)?;
        }
        Ok(())
    }
}

/// Chat client replaying scripted replies and recording every request.
#[derive(Debug, Default)]
pub struct ScriptedChatClient {
    replies: RefCell<VecDeque<Result<ChatMessage, String>>>,
    requests: RefCell<Vec<ChatRequest>>,
}

impl ScriptedChatClient {
    pub fn new(replies: Vec<ChatMessage>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Queue a transport failure after the replies queued so far.
    pub fn then_fail(self, message: &str) -> Self {
        self.replies.borrow_mut().push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl ChatClient for ScriptedChatClient {
    fn complete(&self, request: &ChatRequest) -> Result<ChatMessage> {
        self.requests.borrow_mut().push(request.clone());
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(message)) => Ok(message),
            Some(Err(message)) => Err(anyhow!("{message}")),
            None => Err(anyhow!("scripted chat client has no replies left")),
        }
    }
}

/// Assistant turn calling `name` with `arguments`.
pub fn tool_call_reply(id: &str, name: &str, arguments: &str) -> ChatMessage {
    ChatMessage {
        content: None,
        tool_calls: vec![ToolCall::new(id, name, arguments)],
        ..ChatMessage::assistant("")
    }
}
