//! `storydiff` command-line entry point.
//!
//! Loads `.env`, resolves the configuration once and hands it to the
//! library. Diagnostics go to stderr; stdout carries only command output.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use storydiff::exit_codes;
use storydiff::io::chat::HttpChatClient;
use storydiff::io::config::{DEFAULT_CONFIG_FILE, load_config, resolve_config};
use storydiff::io::git::GitCloner;
use storydiff::io::prompt::PromptBuilder;
use storydiff::io::tracker::JiraTracker;
use storydiff::logging;
use storydiff::pipeline::{RunOptions, RunOutcome, run_pipeline};
use storydiff::plan::Planner;

#[derive(Parser)]
#[command(
    name = "storydiff",
    version,
    about = "Generate a unified diff for the smallest tracker story"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan, request the diff and write it under the output directory.
    Run {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Override `output_dir` from the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Print the accepted diff without writing the patch file.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run only the planning tool and print its result as JSON.
    Plan {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Print the effective configuration with secrets masked.
    Config {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    match dotenvy::dotenv() {
        Err(err) if !err.not_found() => eprintln!("warning: could not load .env: {err}"),
        _ => {}
    }
    logging::init();

    match run(Cli::parse()) {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("{err:#}");
            exit_code(exit_codes::FAILED)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run {
            config,
            output_dir,
            dry_run,
        } => cmd_run(config, output_dir, dry_run),
        Command::Plan { config } => cmd_plan(config),
        Command::Config { config } => cmd_config(config),
    }
}

fn cmd_run(config_path: PathBuf, output_dir: Option<PathBuf>, dry_run: bool) -> Result<i32> {
    let mut config = resolve_config(&config_path, env_lookup)?;
    if let Some(output_dir) = output_dir {
        config.output_dir = output_dir;
    }

    let tracker = JiraTracker::new(&config.tracker)?;
    let cloner = GitCloner::from_config(&config.repository);
    let client = HttpChatClient::new(&config.model)?;

    let outcome = run_pipeline(&client, &tracker, &cloner, &config, RunOptions { dry_run })?;
    match &outcome {
        RunOutcome::Saved { path: Some(path), .. } => {
            info!(path = %path.display(), "patch saved");
        }
        RunOutcome::Saved { path: None, .. } => {}
        RunOutcome::NoToolCall { .. } => info!("model answered without calling the tool"),
        RunOutcome::PlanFailed { error } => error!(error = %error, "planning failed"),
        RunOutcome::Exhausted { attempts } => {
            error!(attempts, "could not obtain a valid diff");
        }
    }
    if let Some(text) = outcome.stdout_text() {
        println!("{text}");
    }
    Ok(outcome.exit_code())
}

fn cmd_plan(config_path: PathBuf) -> Result<i32> {
    let config = resolve_config(&config_path, env_lookup)?;
    let tracker = JiraTracker::new(&config.tracker)?;
    let cloner = GitCloner::from_config(&config.repository);
    let prompts = PromptBuilder::new(config.prompt_budget_bytes);

    let result = Planner::new(&tracker, &cloner, &config, &prompts).plan_least_story();
    let json = serde_json::to_string_pretty(&result).context("serialize plan result")?;
    println!("{json}");
    Ok(if result.is_ready() {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn cmd_config(config_path: PathBuf) -> Result<i32> {
    let mut config = load_config(&config_path)?;
    config.apply_env(env_lookup);
    let rendered = toml::to_string_pretty(&config.redacted()).context("render config")?;
    print!("{rendered}");
    if let Err(err) = config.validate() {
        eprintln!("warning: {err:#}");
    }
    Ok(exit_codes::OK)
}
