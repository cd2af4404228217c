//! Pipeline events and sinks.
//!
//! The orchestrator and its stages report progress as typed
//! [`PipelineEvent`]s. Sinks decide what to do with them: log them, drop
//! them, or collect them for assertions.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
