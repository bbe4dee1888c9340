//! Shared test utilities for jitcap
//!
//! This module provides common helpers for integration tests:
//! - A small "program" loaded into a mock host
//! - Capture compilers wired to in-memory or JSONL sinks

pub mod fixtures;

pub use fixtures::*;
