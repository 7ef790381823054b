//! Tools the model may call, keyed by function name.
//!
//! Arguments are parsed and checked against the tool's parameter schema
//! before the handler runs. Unknown names and bad arguments come back as an
//! in-band `{"error": ...}` result instead of failing the session.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Draft, Validator};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::core::conversation::ToolCall;
use crate::core::types::PlanResult;
use crate::plan::Planner;

/// Name of the planning tool the first turn forces.
pub const PLAN_TOOL_NAME: &str = "plan_least_story";

const PLAN_TOOL_DEFINITION: &str = include_str!("tools/plan_least_story.json");

/// What a tool call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Plan(PlanResult),
    /// The call could not be dispatched.
    Error(String),
}

impl ToolOutput {
    /// JSON text sent back to the model as the tool message content.
    pub fn to_content(&self) -> String {
        let value = match self {
            ToolOutput::Plan(result) => serde_json::to_value(result)
                .unwrap_or_else(|err| json!({ "error": format!("encode plan result: {err}") })),
            ToolOutput::Error(message) => json!({ "error": message }),
        };
        value.to_string()
    }
}

/// A capability the model can invoke.
pub trait ToolHandler {
    /// Wire-format definition: `{"type": "function", "function": {...}}`.
    fn definition(&self) -> &Value;

    /// Run with arguments that already passed the parameter schema.
    fn call(&self, arguments: &Value) -> ToolOutput;
}

struct RegisteredTool<'a> {
    handler: Box<dyn ToolHandler + 'a>,
    parameters: Validator,
}

#[derive(Default)]
pub struct ToolRegistry<'a> {
    tools: BTreeMap<String, RegisteredTool<'a>>,
}

impl<'a> ToolRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry offering only `plan_least_story`.
    pub fn planning(planner: Planner<'a>) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Box::new(PlanLeastStoryTool::new(planner)))?;
        Ok(registry)
    }

    pub fn register(&mut self, handler: Box<dyn ToolHandler + 'a>) -> Result<()> {
        let definition = handler.definition();
        let name = definition
            .pointer("/function/name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("tool definition has no function.name"))?
            .to_string();
        if self.tools.contains_key(&name) {
            return Err(anyhow!("tool {name} is already registered"));
        }
        let schema = definition
            .pointer("/function/parameters")
            .cloned()
            .unwrap_or_else(|| json!({ "type": "object" }));
        let parameters = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .with_context(|| format!("compile parameter schema for {name}"))?;
        debug!(tool = %name, "tool registered");
        self.tools.insert(name, RegisteredTool { handler, parameters });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions of every registered tool, ordered by name.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .values()
            .map(|tool| tool.handler.definition().clone())
            .collect()
    }

    pub fn dispatch(&self, call: &ToolCall) -> ToolOutput {
        let name = call.name();
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, call_id = %call.id, "model called an unknown tool");
            return ToolOutput::Error(format!("unknown tool: {name}"));
        };

        let arguments = match parse_arguments(&call.function.arguments) {
            Ok(arguments) => arguments,
            Err(err) => {
                warn!(tool = %name, error = %err, "tool arguments are not valid JSON");
                return ToolOutput::Error(format!("invalid arguments for {name}: {err}"));
            }
        };
        let violations: Vec<String> = tool
            .parameters
            .iter_errors(&arguments)
            .map(|err| err.to_string())
            .collect();
        if !violations.is_empty() {
            warn!(tool = %name, violations = violations.len(), "tool arguments rejected");
            return ToolOutput::Error(format!(
                "invalid arguments for {name}: {}",
                violations.join("; ")
            ));
        }

        info!(tool = %name, call_id = %call.id, %arguments, "executing tool");
        tool.handler.call(&arguments)
    }
}

/// Parse raw tool arguments. An empty string means `{}`.
pub fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(raw)
}

/// Runs the planner at most once per session; repeated calls get the first
/// result.
pub struct PlanLeastStoryTool<'a> {
    planner: Planner<'a>,
    definition: Value,
    result: OnceCell<PlanResult>,
}

impl<'a> PlanLeastStoryTool<'a> {
    pub fn new(planner: Planner<'a>) -> Self {
        let definition = serde_json::from_str(PLAN_TOOL_DEFINITION)
            .expect("plan_least_story definition should be valid JSON");
        Self {
            planner,
            definition,
            result: OnceCell::new(),
        }
    }
}

impl ToolHandler for PlanLeastStoryTool<'_> {
    fn definition(&self) -> &Value {
        &self.definition
    }

    fn call(&self, _arguments: &Value) -> ToolOutput {
        if let Some(result) = self.result.get() {
            info!(story_key = ?result.story_key(), "plan already computed, reusing it");
            return ToolOutput::Plan(result.clone());
        }
        ToolOutput::Plan(
            self.result
                .get_or_init(|| self.planner.plan_least_story())
                .clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::AppConfig;
    use crate::io::prompt::PromptBuilder;
    use crate::test_support::{FixtureCloner, StaticTracker, sample_config, story};

    struct EchoTool {
        definition: Value,
    }

    impl EchoTool {
        fn new() -> Self {
            Self {
                definition: json!({
                    "type": "function",
                    "function": {
                        "name": "echo",
                        "description": "Echo a word.",
                        "parameters": {
                            "type": "object",
                            "properties": { "word": { "type": "string" } },
                            "required": ["word"]
                        }
                    }
                }),
            }
        }
    }

    impl ToolHandler for EchoTool {
        fn definition(&self) -> &Value {
            &self.definition
        }

        fn call(&self, arguments: &Value) -> ToolOutput {
            ToolOutput::Plan(PlanResult::Ready {
                story_key: arguments["word"].as_str().unwrap_or_default().to_string(),
                story_summary: "echoed".to_string(),
                prompt: String::new(),
            })
        }
    }

    fn echo_registry() -> ToolRegistry<'static> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool::new())).expect("register");
        registry
    }

    #[test]
    fn unknown_tool_is_reported_in_band() {
        let output = echo_registry().dispatch(&ToolCall::new("call_1", "delete_repo", "{}"));
        assert_eq!(output, ToolOutput::Error("unknown tool: delete_repo".to_string()));
        assert_eq!(
            output.to_content(),
            json!({ "error": "unknown tool: delete_repo" }).to_string()
        );
    }

    #[test]
    fn unparseable_arguments_are_reported_in_band() {
        let output = echo_registry().dispatch(&ToolCall::new("call_1", "echo", "{word:"));
        let ToolOutput::Error(message) = output else {
            panic!("expected error");
        };
        assert!(message.starts_with("invalid arguments for echo"), "{message}");
    }

    #[test]
    fn schema_violations_are_reported_in_band() {
        let output = echo_registry().dispatch(&ToolCall::new("call_1", "echo", "{\"word\": 3}"));
        let ToolOutput::Error(message) = output else {
            panic!("expected error");
        };
        assert!(message.starts_with("invalid arguments for echo"), "{message}");
    }

    #[test]
    fn valid_arguments_reach_the_handler() {
        let call = ToolCall::new("call_1", "echo", "{\"word\": \"hi\"}");
        let ToolOutput::Plan(result) = echo_registry().dispatch(&call) else {
            panic!("expected handler output");
        };
        assert_eq!(result.story_key(), Some("hi"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = echo_registry();
        let err = registry
            .register(Box::new(EchoTool::new()))
            .expect_err("duplicate");
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn empty_arguments_mean_empty_object() {
        assert_eq!(parse_arguments("").expect("parse"), json!({}));
        assert_eq!(parse_arguments("  ").expect("parse"), json!({}));
        assert!(parse_arguments("[").is_err());
    }

    fn planning_fixture() -> (StaticTracker, FixtureCloner, AppConfig, PromptBuilder) {
        (
            StaticTracker::with_stories(vec![story("PROJ-1", "Add health check endpoint", None)]),
            FixtureCloner::with_files(&[("app.py", "print('hi')\n")]),
            sample_config(),
            PromptBuilder::new(None),
        )
    }

    #[test]
    fn planning_registry_offers_plan_least_story() {
        let (tracker, cloner, config, prompts) = planning_fixture();
        let registry = ToolRegistry::planning(Planner::new(&tracker, &cloner, &config, &prompts))
            .expect("registry");

        assert!(registry.contains(PLAN_TOOL_NAME));
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0]["function"]["name"], PLAN_TOOL_NAME);
        assert_eq!(definitions[0]["type"], "function");
    }

    #[test]
    fn repeated_plan_calls_reuse_the_first_result() {
        let (tracker, cloner, config, prompts) = planning_fixture();
        let registry = ToolRegistry::planning(Planner::new(&tracker, &cloner, &config, &prompts))
            .expect("registry");

        let first = registry.dispatch(&ToolCall::new("call_1", PLAN_TOOL_NAME, ""));
        let second = registry.dispatch(&ToolCall::new("call_2", PLAN_TOOL_NAME, "{}"));
        assert_eq!(first, second);
        assert_eq!(tracker.search_count(), 1);
        assert_eq!(cloner.destinations().len(), 1);

        let content: Value = serde_json::from_str(&first.to_content()).expect("json");
        assert_eq!(content["story_key"], "PROJ-1");
        assert!(content["prompt"].as_str().expect("prompt").contains("print('hi')"));
    }
}
