//! Deterministic, pure logic shared by the storydiff pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod conversation;
pub mod diff_shape;
pub mod selector;
pub mod types;
