//! Boundary adapters: config, tracker, git, filesystem and the chat endpoint.

pub mod chat;
pub mod config;
pub mod git;
pub mod patch;
pub mod process;
pub mod prompt;
pub mod snapshot;
pub mod tracker;
