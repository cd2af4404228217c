//! Sequential stage runner with a resumable state machine.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::{PipelineContext, PipelineState, RunOutcome, RunSnapshot, Stage, StageScope};
use crate::cancellation::CancellationToken;
use crate::core::TemporaryResource;
use crate::errors::OrchestratorError;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use crate::observability::StageTimer;
use crate::vendors::ResourceReclaimer;

/// Runs stages in order over one [`PipelineContext`], stopping at the first
/// failure.
///
/// ```text
/// Idle{entry} --run--> Running{stage} --...--> Done
///                              |  \
///                              |   `--failure--> Failed{stage} --retry--> Idle{stage}
///                              `--cancel--> Idle{stage}
/// reset: any state --> Idle{0} with a fresh context
/// ```
pub struct Orchestrator {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    state: PipelineState,
    context: PipelineContext,
    last_error: Option<String>,
    cancel: Arc<CancellationToken>,
    events: Arc<dyn EventSink>,
    progress: Option<watch::Sender<RunSnapshot>>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator with no stages.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            state: PipelineState::default(),
            context: PipelineContext::new(),
            last_error: None,
            cancel: Arc::new(CancellationToken::new()),
            events: Arc::new(NoOpEventSink),
            progress: None,
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Appends a shared stage.
    #[must_use]
    pub fn with_shared_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Starts from a prepared context.
    #[must_use]
    pub fn with_context(mut self, context: PipelineContext) -> Self {
        self.context = context;
        self
    }

    /// Sends events to a sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Publishes a snapshot after every state change.
    pub fn set_progress(&mut self, progress: watch::Sender<RunSnapshot>) {
        self.progress = Some(progress);
        self.publish();
    }

    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// The run context.
    #[must_use]
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Token that stops the run at its next waiting point.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancel)
    }

    /// Requests cancellation of the current run.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    /// Presentation view of the run.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        let current_stage = match &self.state {
            PipelineState::Idle { entry } => self.stages.get(*entry).map(|s| s.name().to_string()),
            PipelineState::Running { stage, .. } | PipelineState::Failed { stage, .. } => {
                Some(stage.clone())
            }
            PipelineState::Done => None,
        };
        let ctx = &self.context;
        RunSnapshot {
            pipeline: self.name.clone(),
            run_id: ctx.run_id,
            state: self.state.clone(),
            current_stage,
            last_error: self.last_error.clone(),
            script: ctx.script.clone(),
            voice_id: ctx.voice_id.clone(),
            talking_photo_id: ctx.talking_photo_id.clone(),
            video_url: ctx.video_url.clone(),
            narration_url: ctx.narration_url.clone(),
            final_video_url: ctx.final_video_url.clone(),
            warnings: ctx.warnings().to_vec(),
            updated_at: Utc::now(),
        }
    }

    fn publish(&self) {
        if let Some(progress) = &self.progress {
            progress.send_replace(self.snapshot());
        }
    }

    fn set_state(&mut self, state: PipelineState) {
        self.state = state;
        self.publish();
    }

    fn finish(&self, state: &str) {
        self.events.emit(&PipelineEvent::RunFinished {
            pipeline: self.name.clone(),
            run_id: self.context.run_id,
            state: state.to_string(),
        });
    }

    /// Runs from the idle entry point until done, failed or cancelled.
    ///
    /// Stage failures are reported through the returned [`RunOutcome`] and
    /// the state; only misuse of the state machine is an error.
    pub async fn run(&mut self) -> Result<RunOutcome, OrchestratorError> {
        if self.stages.is_empty() {
            return Err(OrchestratorError::Empty {
                pipeline: self.name.clone(),
            });
        }
        let PipelineState::Idle { entry } = self.state else {
            return Err(OrchestratorError::NotIdle {
                pipeline: self.name.clone(),
                state: self.state.label().to_string(),
            });
        };

        let entry_stage = self
            .stages
            .get(entry)
            .map(|s| s.name().to_string())
            .unwrap_or_default();
        info!(
            pipeline = %self.name,
            run_id = %self.context.run_id,
            entry_stage = %entry_stage,
            "Pipeline run started"
        );
        self.last_error = None;
        self.events.emit(&PipelineEvent::RunStarted {
            pipeline: self.name.clone(),
            run_id: self.context.run_id,
            entry_stage,
        });

        for index in entry..self.stages.len() {
            let stage = Arc::clone(&self.stages[index]);
            let stage_name = stage.name().to_string();

            self.set_state(PipelineState::Running {
                index,
                stage: stage_name.clone(),
            });
            self.events.emit(&PipelineEvent::StageStarted {
                pipeline: self.name.clone(),
                stage: stage_name.clone(),
            });

            let timer = StageTimer::start(&stage_name);
            let scope = StageScope::new(&self.name, &stage_name, &self.cancel, self.events.as_ref());
            let result = stage.execute(&mut self.context, &scope).await;

            match result {
                Ok(()) => {
                    let duration_ms = timer.finish();
                    info!(pipeline = %self.name, stage = %stage_name, duration_ms, "Stage completed");
                    self.events.emit(&PipelineEvent::StageCompleted {
                        pipeline: self.name.clone(),
                        stage: stage_name,
                        duration_ms,
                    });
                }
                Err(failure) if failure.cancelled => {
                    info!(
                        pipeline = %self.name,
                        stage = %stage_name,
                        reason = %failure.reason,
                        "Run cancelled, pipeline idle at interrupted stage"
                    );
                    self.cancel.reset();
                    self.set_state(PipelineState::Idle { entry: index });
                    self.finish("cancelled");
                    return Ok(RunOutcome::Cancelled { stage: stage_name });
                }
                Err(failure) => {
                    error!(
                        pipeline = %self.name,
                        stage = %stage_name,
                        reason = %failure.reason,
                        "Stage failed"
                    );
                    self.events.emit(&PipelineEvent::StageFailed {
                        pipeline: self.name.clone(),
                        stage: stage_name.clone(),
                        reason: failure.reason.clone(),
                    });
                    self.report_leaks();
                    self.last_error = Some(failure.reason.clone());
                    self.set_state(PipelineState::Failed {
                        index,
                        stage: stage_name.clone(),
                        reason: failure.reason.clone(),
                    });
                    self.finish("failed");
                    return Ok(RunOutcome::Failed {
                        stage: stage_name,
                        reason: failure.reason,
                    });
                }
            }
        }

        info!(pipeline = %self.name, run_id = %self.context.run_id, "Pipeline run done");
        self.set_state(PipelineState::Done);
        self.finish("done");
        Ok(RunOutcome::Done)
    }

    fn report_leaks(&self) {
        for resource in self.context.resources() {
            warn!(
                pipeline = %self.name,
                resource = %resource,
                "Temporary resource left allocated after failure"
            );
            self.events.emit(&PipelineEvent::ResourceLeaked {
                resource: resource.clone(),
                reason: "run failed before cleanup".to_string(),
            });
        }
    }

    /// Re-arms a failed pipeline at the failed stage, keeping the context.
    pub fn retry(&mut self) -> Result<(), OrchestratorError> {
        let PipelineState::Failed { index, .. } = self.state else {
            return Err(OrchestratorError::NothingToRetry {
                pipeline: self.name.clone(),
                state: self.state.label().to_string(),
            });
        };
        info!(pipeline = %self.name, entry = index, "Pipeline re-armed for retry");
        self.cancel.reset();
        self.set_state(PipelineState::Idle { entry: index });
        Ok(())
    }

    /// Returns to stage 0 with a fresh context.
    ///
    /// Temporary resources still recorded in the old context are handed
    /// back so the caller can reclaim them.
    pub fn reset(&mut self) -> Vec<TemporaryResource> {
        let leftovers = self.context.take_resources();
        for resource in &leftovers {
            warn!(pipeline = %self.name, resource = %resource, "Reset with unreclaimed resource");
        }
        self.context = PipelineContext::new();
        self.last_error = None;
        self.cancel.reset();
        self.set_state(PipelineState::default());
        leftovers
    }

    /// Deletes every recorded temporary resource.
    ///
    /// Resources that could not be deleted stay recorded and are returned.
    pub async fn reclaim_resources(
        &mut self,
        reclaimer: &dyn ResourceReclaimer,
    ) -> Vec<TemporaryResource> {
        for resource in self.context.take_resources() {
            match reclaimer.reclaim(&resource).await {
                Ok(true) => {
                    info!(resource = %resource, "Temporary resource reclaimed");
                    self.events
                        .emit(&PipelineEvent::ResourceReclaimed { resource });
                }
                Ok(false) => {
                    warn!(resource = %resource, "Vendor did not confirm deletion");
                    self.leak(resource, "vendor did not confirm deletion".to_string());
                }
                Err(e) => {
                    warn!(resource = %resource, error = %e, "Could not reclaim resource");
                    self.leak(resource, e.to_string());
                }
            }
        }
        self.publish();
        self.context.resources().to_vec()
    }

    fn leak(&mut self, resource: TemporaryResource, reason: String) {
        self.events.emit(&PipelineEvent::ResourceLeaked {
            resource: resource.clone(),
            reason,
        });
        self.context.register_resource(resource);
    }
}
