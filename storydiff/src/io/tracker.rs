//! Issue-tracker boundary (Jira REST v2).
//!
//! The [`Tracker`] trait splits authentication from querying so callers can
//! tell a connection failure from a query failure.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::types::Story;
use crate::io::config::TrackerConfig;

/// Abstraction over the issue tracker.
pub trait Tracker {
    /// Verify the credentials are accepted.
    fn authenticate(&self) -> Result<()>;

    /// Return issues of `project` in tracker order, at most `max_results`.
    fn search_stories(&self, project: &str, max_results: u32) -> Result<Vec<Story>>;
}

/// Jira client using basic auth against `/rest/api/2`.
#[derive(Debug, Clone)]
pub struct JiraTracker {
    client: Client,
    base_url: String,
    user: String,
    token: String,
    story_points_field: String,
}

impl JiraTracker {
    pub fn new(cfg: &TrackerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .context("build tracker http client")?;
        Ok(Self {
            client,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            user: cfg.user.clone(),
            token: cfg.token.clone(),
            story_points_field: cfg.story_points_field.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/api/2/{}", self.base_url, path)
    }
}

impl Tracker for JiraTracker {
    #[instrument(skip_all, fields(url = %self.base_url))]
    fn authenticate(&self) -> Result<()> {
        self.client
            .get(self.endpoint("myself"))
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .with_context(|| format!("authenticate against {}", self.base_url))?;
        info!("tracker client authenticated");
        Ok(())
    }

    #[instrument(skip_all, fields(project = %project))]
    fn search_stories(&self, project: &str, max_results: u32) -> Result<Vec<Story>> {
        let jql = project_jql(project);
        let max_results = max_results.to_string();
        let fields = format!("summary,{}", self.story_points_field);
        info!(jql = %jql, "searching issues");
        let body: Value = self
            .client
            .get(self.endpoint("search"))
            .basic_auth(&self.user, Some(&self.token))
            .query(&[
                ("jql", jql.as_str()),
                ("maxResults", max_results.as_str()),
                ("fields", fields.as_str()),
            ])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .context("search issues")?
            .json()
            .context("decode search response")?;
        let stories = parse_search_response(&body, &self.story_points_field)?;
        debug!(count = stories.len(), "issues returned");
        Ok(stories)
    }
}

/// JQL restricting results to one project.
pub fn project_jql(project: &str) -> String {
    format!("project = \"{}\"", project.replace('"', "\\\""))
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

/// Convert a `/search` response body into stories, preserving order.
///
/// A missing summary becomes `""`; a missing or non-numeric points field
/// becomes `None`.
pub fn parse_search_response(body: &Value, story_points_field: &str) -> Result<Vec<Story>> {
    let response = SearchResponse::deserialize(body)
        .map_err(|err| anyhow!("unexpected search response shape: {err}"))?;
    Ok(response
        .issues
        .into_iter()
        .map(|issue| Story {
            summary: issue
                .fields
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            effort_points: issue.fields.get(story_points_field).and_then(Value::as_f64),
            key: issue.key,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn jql_scopes_to_project() {
        assert_eq!(project_jql("PROJ"), "project = \"PROJ\"");
        assert_eq!(project_jql("a\"b"), "project = \"a\\\"b\"");
    }

    #[test]
    fn parses_issues_in_order() {
        let body = json!({
            "startAt": 0,
            "total": 3,
            "issues": [
                { "key": "PROJ-7", "fields": { "summary": "Refactor auth", "customfield_10002": 5.0 } },
                { "key": "PROJ-1", "fields": { "summary": "Add health check endpoint", "customfield_10002": 1 } },
                { "key": "PROJ-3", "fields": { "summary": "Unestimated", "customfield_10002": null } }
            ]
        });
        let stories = parse_search_response(&body, "customfield_10002").expect("parse");
        let keys: Vec<&str> = stories.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["PROJ-7", "PROJ-1", "PROJ-3"]);
        assert_eq!(stories[0].effort_points, Some(5.0));
        assert_eq!(stories[1].effort_points, Some(1.0));
        assert_eq!(stories[1].summary, "Add health check endpoint");
        assert_eq!(stories[2].effort_points, None);
    }

    #[test]
    fn tolerates_missing_fields() {
        let body = json!({ "issues": [ { "key": "PROJ-2" } ] });
        let stories = parse_search_response(&body, "customfield_10002").expect("parse");
        assert_eq!(stories[0].summary, "");
        assert_eq!(stories[0].effort_points, None);
    }

    #[test]
    fn empty_response_yields_no_stories() {
        let stories = parse_search_response(&json!({ "issues": [] }), "points").expect("parse");
        assert!(stories.is_empty());
    }

    #[test]
    fn rejects_malformed_body() {
        let err = parse_search_response(&json!({ "issues": "nope" }), "points").expect_err("fail");
        assert!(err.to_string().contains("unexpected search response shape"));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let cfg = TrackerConfig {
            url: "https://jira.example.com/".to_string(),
            ..TrackerConfig::default()
        };
        let tracker = JiraTracker::new(&cfg).expect("client");
        assert_eq!(
            tracker.endpoint("search"),
            "https://jira.example.com/rest/api/2/search"
        );
    }
}
