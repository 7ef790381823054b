//! Runtime configuration: `storydiff.toml` plus environment overrides.
//!
//! The configuration is resolved once at process start and passed by
//! reference into every component. Nothing below `main` reads the
//! environment.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::selector::SelectionRule;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "storydiff.toml";

const MASK: &str = "***";

/// Top-level configuration (TOML).
///
/// Missing fields default to values that work against Jira Cloud, GitHub and
/// the DeepSeek chat API. Secrets are normally left out of the file and
/// supplied through the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Maximum number of diff requests after the planning tool ran.
    pub max_diff_attempts: u32,

    /// Directory receiving `<story_key>.patch` files.
    pub output_dir: PathBuf,

    /// Cap on snapshot bytes embedded in the prompt. Unset embeds everything.
    pub prompt_budget_bytes: Option<usize>,

    pub tracker: TrackerConfig,
    pub repository: RepositoryConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Jira base URL, e.g. `https://acme.atlassian.net`.
    pub url: String,
    pub user: String,
    pub token: String,
    /// Project key or board identifier used in `project = <id>`.
    pub project: String,
    /// Custom field holding story points.
    pub story_points_field: String,
    pub max_results: u32,
    pub selection: SelectionRule,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Source-control host used to build the clone URL.
    pub host: String,
    pub owner: String,
    pub name: String,
    /// Access token embedded in the clone URL.
    pub token: String,
    pub clone_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Full chat-completions endpoint URL.
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_diff_attempts: 3,
            output_dir: PathBuf::from("patch"),
            prompt_budget_bytes: None,
            tracker: TrackerConfig::default(),
            repository: RepositoryConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            token: String::new(),
            project: String::new(),
            story_points_field: "customfield_10002".to_string(),
            max_results: 100,
            selection: SelectionRule::default(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            owner: String::new(),
            name: String::new(),
            token: String::new(),
            clone_timeout_secs: 10 * 60,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.deepseek.com/chat/completions".to_string(),
            api_key: String::new(),
            model: "deepseek-coder".to_string(),
            temperature: 0.2,
            request_timeout_secs: 5 * 60,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_diff_attempts == 0 {
            return Err(anyhow!("max_diff_attempts must be > 0"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output_dir must not be empty"));
        }
        if self.prompt_budget_bytes == Some(0) {
            return Err(anyhow!("prompt_budget_bytes must be > 0 when set"));
        }
        require("tracker.url", &self.tracker.url)?;
        require("tracker.user", &self.tracker.user)?;
        require("tracker.token", &self.tracker.token)?;
        require("tracker.project", &self.tracker.project)?;
        require("tracker.story_points_field", &self.tracker.story_points_field)?;
        if self.tracker.max_results == 0 {
            return Err(anyhow!("tracker.max_results must be > 0"));
        }
        if self.tracker.request_timeout_secs == 0 {
            return Err(anyhow!("tracker.request_timeout_secs must be > 0"));
        }
        require("repository.host", &self.repository.host)?;
        require("repository.owner", &self.repository.owner)?;
        require("repository.name", &self.repository.name)?;
        require("repository.token", &self.repository.token)?;
        if self.repository.clone_timeout_secs == 0 {
            return Err(anyhow!("repository.clone_timeout_secs must be > 0"));
        }
        require("model.api_url", &self.model.api_url)?;
        require("model.api_key", &self.model.api_key)?;
        require("model.model", &self.model.model)?;
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(anyhow!("model.temperature must be within 0.0..=2.0"));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(anyhow!("model.request_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Overlay values from environment-style variables.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a map.
    /// Empty values are ignored.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("JIRA_URL") {
            self.tracker.url = v;
        }
        if let Some(v) = get("JIRA_USER") {
            self.tracker.user = v;
        }
        if let Some(v) = get("JIRA_TOKEN") {
            self.tracker.token = v;
        }
        if let Some(v) = get("JIRA_BOARD_ID") {
            self.tracker.project = v;
        }
        if let Some(v) = get("JIRA_STORY_POINTS_FIELD") {
            self.tracker.story_points_field = v;
        }
        if let Some(v) = get("GITHUB_TOKEN") {
            self.repository.token = v;
        }
        if let Some(v) = get("OWNER") {
            self.repository.owner = v;
        }
        if let Some(v) = get("REPO") {
            self.repository.name = v;
        }
        if let Some(v) = get("DEEPSEEK_API_KEY") {
            self.model.api_key = v;
        }
        if let Some(v) = get("DEEPSEEK_API_URL") {
            self.model.api_url = v;
        }
        if let Some(v) = get("DEEPSEEK_MODEL") {
            self.model.model = v;
        }
    }

    /// Copy with every secret replaced by a mask, for display.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        mask(&mut cfg.tracker.token);
        mask(&mut cfg.repository.token);
        mask(&mut cfg.model.api_key);
        cfg
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{field} must be set"));
    }
    Ok(())
}

fn mask(secret: &mut String) {
    if !secret.is_empty() {
        *secret = MASK.to_string();
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AppConfig::default()`. No validation
/// happens here because secrets usually arrive through the environment.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Load the file, overlay the environment, and validate.
pub fn resolve_config<F: Fn(&str) -> Option<String>>(path: &Path, lookup: F) -> Result<AppConfig> {
    let mut cfg = load_config(path)?;
    cfg.apply_env(lookup);
    cfg.validate()
        .with_context(|| format!("invalid configuration ({})", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("JIRA_URL", "https://jira.example.com"),
            ("JIRA_USER", "bot"),
            ("JIRA_TOKEN", "jira-secret"),
            ("JIRA_BOARD_ID", "PROJ"),
            ("GITHUB_TOKEN", "gh-secret"),
            ("OWNER", "acme"),
            ("REPO", "service"),
            ("DEEPSEEK_API_KEY", "ds-secret"),
        ])
    }

    fn lookup<'a>(
        env: &'a HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Option<String> + 'a {
        |key| env.get(key).map(|v| v.to_string())
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn default_config_needs_credentials() {
        let err = AppConfig::default().validate().expect_err("should fail");
        assert!(err.to_string().contains("tracker.url must be set"));
    }

    #[test]
    fn env_fills_required_fields() {
        let temp = tempfile::tempdir().expect("tempdir");
        let env = full_env();
        let cfg = resolve_config(&temp.path().join("missing.toml"), lookup(&env)).expect("resolve");
        assert_eq!(cfg.tracker.project, "PROJ");
        assert_eq!(cfg.repository.owner, "acme");
        assert_eq!(cfg.model.model, "deepseek-coder");
        assert_eq!(cfg.max_diff_attempts, 3);
        assert_eq!(cfg.output_dir, PathBuf::from("patch"));
    }

    #[test]
    fn env_overrides_file_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("storydiff.toml");
        fs::write(
            &path,
            "max_diff_attempts = 5\n\n[tracker]\nproject = \"FILE\"\nselection = \"least_effort\"\n\n[model]\nmodel = \"deepseek-chat\"\n",
        )
        .expect("write");

        let env = full_env();
        let cfg = resolve_config(&path, lookup(&env)).expect("resolve");
        assert_eq!(cfg.max_diff_attempts, 5);
        assert_eq!(cfg.tracker.project, "PROJ");
        assert_eq!(cfg.tracker.selection, SelectionRule::LeastEffort);
        assert_eq!(cfg.model.model, "deepseek-chat");
    }

    #[test]
    fn zero_retry_budget_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("storydiff.toml");
        fs::write(&path, "max_diff_attempts = 0\n").expect("write");

        let env = full_env();
        let err = resolve_config(&path, lookup(&env)).expect_err("should fail");
        assert!(format!("{err:#}").contains("max_diff_attempts must be > 0"));
    }

    #[test]
    fn redacted_masks_secrets_only() {
        let mut cfg = AppConfig::default();
        let env = full_env();
        cfg.apply_env(lookup(&env));
        let shown = cfg.redacted();
        assert_eq!(shown.tracker.token, "***");
        assert_eq!(shown.repository.token, "***");
        assert_eq!(shown.model.api_key, "***");
        assert_eq!(shown.tracker.user, "bot");
    }
}
