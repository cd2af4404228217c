//! Event type, sink trait and implementations.

use serde::Serialize;
use tracing::{debug, info, warn, Level};
use uuid::Uuid;

use crate::core::{JobHandle, JobState, TemporaryResource};

/// Progress events emitted during a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A run started at the given stage.
    RunStarted {
        /// Pipeline name.
        pipeline: String,
        /// Run identifier.
        run_id: Uuid,
        /// First stage to execute.
        entry_stage: String,
    },
    /// A stage began executing.
    StageStarted {
        /// Pipeline name.
        pipeline: String,
        /// Stage name.
        stage: String,
    },
    /// A stage finished successfully.
    StageCompleted {
        /// Pipeline name.
        pipeline: String,
        /// Stage name.
        stage: String,
        /// Wall time spent in the stage.
        duration_ms: f64,
    },
    /// A stage failed; the run stops here.
    StageFailed {
        /// Pipeline name.
        pipeline: String,
        /// Stage name.
        stage: String,
        /// Failure reason.
        reason: String,
    },
    /// A remote job was submitted.
    JobSubmitted {
        /// Stage that owns the job.
        stage: String,
        /// The vendor handle.
        handle: JobHandle,
    },
    /// A status fetch completed (or failed, in which case `state` is `None`).
    PollAttempt {
        /// Stage that owns the job.
        stage: String,
        /// 1-based attempt number.
        attempt: u32,
        /// Observed state.
        state: Option<JobState>,
    },
    /// A temporary resource was created.
    ResourceRegistered {
        /// The resource.
        resource: TemporaryResource,
    },
    /// A temporary resource was deleted.
    ResourceReclaimed {
        /// The resource.
        resource: TemporaryResource,
    },
    /// A temporary resource could not be deleted and remains allocated.
    ResourceLeaked {
        /// The resource.
        resource: TemporaryResource,
        /// Why it remains.
        reason: String,
    },
    /// A run ended (done, failed or cancelled back to idle).
    RunFinished {
        /// Pipeline name.
        pipeline: String,
        /// Run identifier.
        run_id: Uuid,
        /// Final state label.
        state: String,
    },
}

impl PipelineEvent {
    /// Dotted event type, e.g. `stage.started`.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::StageStarted { .. } => "stage.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageFailed { .. } => "stage.failed",
            Self::JobSubmitted { .. } => "job.submitted",
            Self::PollAttempt { .. } => "job.polled",
            Self::ResourceRegistered { .. } => "resource.registered",
            Self::ResourceReclaimed { .. } => "resource.reclaimed",
            Self::ResourceLeaked { .. } => "resource.leaked",
            Self::RunFinished { .. } => "run.finished",
        }
    }
}

/// Trait for sinks that receive pipeline events.
///
/// Emitting must never fail or block the run; sinks swallow their own errors.
pub trait EventSink: Send + Sync {
    /// Receives one event.
    fn emit(&self, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: &PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        let event_type = event.event_type();
        let data = serde_json::to_string(event).unwrap_or_default();

        // Leaks always surface, whatever the configured level.
        if matches!(event, PipelineEvent::ResourceLeaked { .. }) {
            warn!(event_type, event_data = %data, "Event: {}", event_type);
            return;
        }

        if self.level == Level::DEBUG {
            debug!(event_type, event_data = %data, "Event: {}", event_type);
        } else {
            info!(event_type, event_data = %data, "Event: {}", event_type);
        }
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type starts with the prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the dotted types of all collected events, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(PipelineEvent::event_type).collect()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}
