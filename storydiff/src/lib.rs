//! Turn the smallest tracker story into a unified diff with a chat model.
//!
//! A session forces the model to call `plan_least_story`, which selects a
//! story, snapshots the target repository and returns a diff request. The
//! model is then asked for the diff until a reply has the shape of a unified
//! diff or the attempt budget runs out. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (selection, diff shape,
//!   conversation model). No I/O.
//! - **[`io`]**: Side-effecting adapters (tracker, git, filesystem, chat
//!   endpoint, config). Each boundary is a trait so tests can script it.
//!
//! [`plan`], [`tools`], [`orchestrate`] and [`pipeline`] combine the two to
//! implement the CLI commands.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrate;
pub mod pipeline;
pub mod plan;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
