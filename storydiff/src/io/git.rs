//! Git adapter: cloning the target repository and inspecting the clone.
//!
//! Everything goes through the `git` binary. The access token only ever
//! appears in the clone URL handed to the subprocess; every string that can
//! reach a log line or a tool result is passed through [`RepoSource::redact`].

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

use crate::io::config::RepositoryConfig;
use crate::io::process::run_with_timeout;

const CLONE_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

/// Identity of the repository to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSource {
    pub host: String,
    pub owner: String,
    pub name: String,
    token: String,
}

impl RepoSource {
    pub fn new(
        host: impl Into<String>,
        owner: impl Into<String>,
        name: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            owner: owner.into(),
            name: name.into(),
            token: token.into(),
        }
    }

    pub fn from_config(cfg: &RepositoryConfig) -> Self {
        Self::new(&cfg.host, &cfg.owner, &cfg.name, &cfg.token)
    }

    /// `owner/name`, safe to log.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// HTTPS clone URL with the token embedded as credentials.
    pub fn clone_url(&self) -> String {
        if self.token.is_empty() {
            return format!("https://{}/{}/{}.git", self.host, self.owner, self.name);
        }
        format!(
            "https://{}@{}/{}/{}.git",
            self.token, self.host, self.owner, self.name
        )
    }

    /// Replace every occurrence of the token in `text`.
    pub fn redact(&self, text: &str) -> String {
        if self.token.is_empty() {
            return text.to_string();
        }
        text.replace(&self.token, "***")
    }
}

/// Boundary for obtaining a working copy of the target repository.
pub trait RepoCloner {
    /// Clone `source` into `dest`, which exists and is empty.
    fn clone_into(&self, source: &RepoSource, dest: &Path) -> Result<()>;
}

/// Cloner backed by `git clone`.
#[derive(Debug, Clone)]
pub struct GitCloner {
    timeout: Duration,
}

impl GitCloner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(cfg: &RepositoryConfig) -> Self {
        Self::new(Duration::from_secs(cfg.clone_timeout_secs))
    }
}

impl RepoCloner for GitCloner {
    #[instrument(skip_all, fields(repo = %source.slug()))]
    fn clone_into(&self, source: &RepoSource, dest: &Path) -> Result<()> {
        info!(dest = %dest.display(), "cloning repository");
        let mut cmd = Command::new("git");
        cmd.arg("clone")
            .arg("--quiet")
            .arg(source.clone_url())
            .arg(dest)
            // Never block on an interactive credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0");

        let output = run_with_timeout(cmd, self.timeout, CLONE_OUTPUT_LIMIT_BYTES)
            .with_context(|| format!("run git clone for {}", source.slug()))?;

        if output.timed_out {
            return Err(anyhow!(
                "git clone {} timed out after {:?}",
                source.slug(),
                self.timeout
            ));
        }
        if !output.success() {
            return Err(anyhow!(
                "git clone {} failed: {}",
                source.slug(),
                source.redact(&output.stderr_lossy())
            ));
        }
        debug!("clone finished");
        Ok(())
    }
}

/// Wrapper for read-only git queries against a working copy.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Return the current HEAD short SHA.
    pub fn head_short_sha(&self, len: usize) -> Result<String> {
        let arg = format!("--short={len}");
        let out = self.run_capture(&["rev-parse", &arg, "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }
}
