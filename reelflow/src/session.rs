//! Background pipeline runs for presentation layers.
//!
//! A [`PipelineSession`] owns one run on a tokio task. The UI reads
//! [`RunSnapshot`]s from a watch channel, may cancel the run, and gets the
//! orchestrator back when the run ends so it can retry or reset.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cancellation::CancellationToken;
use crate::errors::OrchestratorError;
use crate::pipeline::{Orchestrator, RunOutcome, RunSnapshot};

type RunResult = (Orchestrator, Result<RunOutcome, OrchestratorError>);

/// The result of a finished session.
#[derive(Debug)]
pub struct FinishedRun {
    /// The orchestrator, ready for `retry`, `reset` or reclamation.
    pub orchestrator: Orchestrator,
    /// How the run ended.
    pub outcome: RunOutcome,
}

/// A session that ended without a run outcome.
///
/// When the orchestrator rejected the run it is handed back, so resources
/// registered by an earlier run can still be reclaimed.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct SessionError {
    /// The orchestrator, unless the background task was aborted.
    pub orchestrator: Option<Box<Orchestrator>>,
    /// Why no outcome was produced.
    pub source: OrchestratorError,
}

impl SessionError {
    /// Takes the orchestrator back, if the task returned it.
    #[must_use]
    pub fn into_orchestrator(self) -> Option<Orchestrator> {
        self.orchestrator.map(|o| *o)
    }
}

/// One pipeline run executing in the background.
#[derive(Debug)]
pub struct PipelineSession {
    snapshots: watch::Receiver<RunSnapshot>,
    cancel: Arc<CancellationToken>,
    task: JoinHandle<RunResult>,
}

impl PipelineSession {
    /// Spawns `orchestrator.run()` on the current tokio runtime.
    ///
    /// The orchestrator should be idle; a run it rejects surfaces from
    /// [`PipelineSession::finish`] together with the orchestrator.
    pub fn start(mut orchestrator: Orchestrator) -> Self {
        let (progress, snapshots) = watch::channel(orchestrator.snapshot());
        orchestrator.set_progress(progress);
        let cancel = orchestrator.cancellation_token();

        info!(pipeline = %orchestrator.name(), "Starting pipeline session");
        let task = tokio::spawn(async move {
            let result = orchestrator.run().await;
            (orchestrator, result)
        });

        Self {
            snapshots,
            cancel,
            task,
        }
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshots.clone()
    }

    /// Stops the run at its next waiting point. The pipeline ends idle at the
    /// interrupted stage.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.cancel.cancel(reason);
    }

    /// Whether the background task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to end and hands the orchestrator back.
    pub async fn finish(self) -> Result<FinishedRun, SessionError> {
        let (orchestrator, result) = self.task.await.map_err(|e| {
            warn!(error = %e, "Pipeline task did not complete");
            SessionError {
                orchestrator: None,
                source: OrchestratorError::TaskAborted {
                    message: e.to_string(),
                },
            }
        })?;
        match result {
            Ok(outcome) => Ok(FinishedRun {
                orchestrator,
                outcome,
            }),
            Err(source) => {
                warn!(pipeline = %orchestrator.name(), error = %source, "Pipeline rejected the run");
                Err(SessionError {
                    orchestrator: Some(Box::new(orchestrator)),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TemporaryResource;
    use crate::errors::StageFailure;
    use crate::pipeline::{PipelineContext, PipelineState, Stage, StageScope};
    use crate::testing::{FailingStage, MockStage};
    use async_trait::async_trait;
    use std::time::Duration;

    struct WaitingStage;

    #[async_trait]
    impl Stage for WaitingStage {
        fn name(&self) -> &str {
            "waiting"
        }

        async fn execute(
            &self,
            ctx: &mut PipelineContext,
            scope: &StageScope<'_>,
        ) -> Result<(), StageFailure> {
            scope.pause(Duration::from_secs(3600)).await?;
            ctx.script = Some("done waiting".to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_session_runs_to_done() {
        let session = PipelineSession::start(
            Orchestrator::new("demo")
                .with_stage(MockStage::new("a"))
                .with_stage(MockStage::new("b")),
        );
        let mut updates = session.subscribe();

        let finished = session.finish().await.unwrap();
        assert!(finished.outcome.is_done());
        assert_eq!(finished.orchestrator.state(), &PipelineState::Done);
        assert_eq!(updates.borrow_and_update().state, PipelineState::Done);
    }

    #[tokio::test]
    async fn test_session_reports_failure_in_snapshot() {
        let session = PipelineSession::start(
            Orchestrator::new("demo").with_stage(FailingStage::new("broken", "HTTP 401: bad key")),
        );
        let mut updates = session.subscribe();
        updates
            .wait_for(|s| s.state.is_terminal())
            .await
            .unwrap();
        assert_eq!(session.snapshot().last_error.as_deref(), Some("HTTP 401: bad key"));

        let finished = session.finish().await.unwrap();
        assert!(!finished.outcome.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_pipeline_idle_and_resumable() {
        let session = PipelineSession::start(
            Orchestrator::new("demo")
                .with_stage(MockStage::new("a"))
                .with_stage(WaitingStage),
        );
        let mut updates = session.subscribe();
        updates
            .wait_for(|s| s.current_stage.as_deref() == Some("waiting"))
            .await
            .unwrap();
        session.cancel("operator stop");

        let finished = session.finish().await.unwrap();
        assert_eq!(
            finished.outcome,
            RunOutcome::Cancelled {
                stage: "waiting".to_string()
            }
        );
        assert_eq!(finished.orchestrator.state(), &PipelineState::Idle { entry: 1 });

        let resumed = PipelineSession::start(finished.orchestrator).finish().await.unwrap();
        assert!(resumed.outcome.is_done());
        assert_eq!(
            resumed.orchestrator.context().script.as_deref(),
            Some("done waiting")
        );
    }

    #[tokio::test]
    async fn test_finish_reports_misuse() {
        let empty = PipelineSession::start(Orchestrator::new("empty"));
        let err = empty.finish().await.unwrap_err();
        assert!(matches!(err.source, OrchestratorError::Empty { .. }));
        assert!(err.orchestrator.is_some());
    }

    #[tokio::test]
    async fn test_rejected_run_returns_orchestrator_with_resources() {
        let mut done = Orchestrator::new("demo").with_stage(
            MockStage::new("prepare").registering(TemporaryResource::avatar_group("g-1", "prepare")),
        );
        assert!(done.run().await.unwrap().is_done());

        let err = PipelineSession::start(done).finish().await.unwrap_err();
        assert!(matches!(err.source, OrchestratorError::NotIdle { .. }));

        let mut orchestrator = err.into_orchestrator().unwrap();
        assert_eq!(orchestrator.state(), &PipelineState::Done);
        let leftovers = orchestrator.reset();
        assert_eq!(leftovers.len(), 1);
        assert_eq!(leftovers[0].id, "g-1");
    }
}
