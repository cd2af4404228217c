//! Testing utilities for reelflow pipelines.
//!
//! This module provides:
//! - A scripted in-memory HTTP transport
//! - Canned vendor responses
//! - Stand-in stages for orchestrator tests

pub mod fixtures;
mod stages;
mod transport;

pub use stages::{FailingStage, MockStage};
pub use transport::ScriptedTransport;
