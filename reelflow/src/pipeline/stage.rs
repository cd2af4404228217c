//! Stage trait and the per-stage execution scope.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

use super::PipelineContext;
use crate::cancellation::CancellationToken;
use crate::core::{JobHandle, JobStatus};
use crate::errors::{JobError, StageFailure};
use crate::events::{EventSink, PipelineEvent};
use crate::poller::{poll, PollPolicy};
use crate::vendors::StatusSource;

/// One step of a pipeline.
///
/// A stage reads what it needs from the context, performs its vendor calls
/// and writes its outputs back. It must tolerate being re-executed after a
/// cancellation or a retry: values already present in the context (or an
/// active job handle) mean the work was done or submitted before.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable stage name used in states, events and logs.
    fn name(&self) -> &str;

    /// Runs the stage.
    async fn execute(
        &self,
        ctx: &mut PipelineContext,
        scope: &StageScope<'_>,
    ) -> Result<(), StageFailure>;
}

/// A job that reached a successful terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    /// The job's handle.
    pub handle: JobHandle,
    /// The terminal status.
    pub status: JobStatus,
}

/// What a stage may use from its orchestrator while executing.
pub struct StageScope<'a> {
    pipeline: &'a str,
    stage: &'a str,
    cancel: &'a CancellationToken,
    events: &'a dyn EventSink,
}

impl<'a> StageScope<'a> {
    /// Creates a scope.
    #[must_use]
    pub fn new(
        pipeline: &'a str,
        stage: &'a str,
        cancel: &'a CancellationToken,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            pipeline,
            stage,
            cancel,
            events,
        }
    }

    /// Pipeline name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        self.pipeline
    }

    /// Stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        self.stage
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        self.cancel
    }

    /// Sends an event to the pipeline's sink.
    pub fn emit(&self, event: PipelineEvent) {
        self.events.emit(&event);
    }

    /// Fails with a cancellation if the run was cancelled.
    pub fn check_cancelled(&self) -> Result<(), StageFailure> {
        if self.cancel.is_cancelled() {
            Err(self.cancellation_failure())
        } else {
            Ok(())
        }
    }

    fn cancellation_failure(&self) -> StageFailure {
        StageFailure::cancelled(
            self.cancel
                .reason()
                .unwrap_or_else(|| format!("{} cancelled", self.stage)),
        )
    }

    /// Sleeps, waking early with a cancellation failure.
    pub async fn pause(&self, duration: Duration) -> Result<(), StageFailure> {
        if duration.is_zero() {
            return self.check_cancelled();
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            () = self.cancel.cancelled() => Err(self.cancellation_failure()),
        }
    }

    /// Submits a job (or resumes the one already submitted by this stage)
    /// and polls it to a terminal status.
    ///
    /// Only a successful terminal status is returned; vendor failure states
    /// become a [`StageFailure`] carrying the vendor's detail. On cancellation
    /// the handle stays in the context so the next run resumes polling it
    /// instead of submitting again.
    pub async fn track_job<S, F, Fut>(
        &self,
        ctx: &mut PipelineContext,
        source: &S,
        policy: &PollPolicy,
        submit: F,
    ) -> Result<CompletedJob, StageFailure>
    where
        S: StatusSource + ?Sized,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<JobHandle, JobError>> + Send,
    {
        let handle = if let Some(handle) = ctx.active_job(self.stage) {
            info!(stage = self.stage, vendor = %handle.vendor, job_id = %handle.id, "Resuming job");
            handle.clone()
        } else {
            self.check_cancelled()?;
            let handle = submit().await?;
            info!(stage = self.stage, vendor = %handle.vendor, job_id = %handle.id, "Job submitted");
            self.emit(PipelineEvent::JobSubmitted {
                stage: self.stage.to_string(),
                handle: handle.clone(),
            });
            ctx.begin_job(self.stage, handle.clone());
            handle
        };

        let result = poll(
            |attempt| {
                let handle = &handle;
                async move {
                    let result = source.fetch_status(handle).await;
                    self.emit(PipelineEvent::PollAttempt {
                        stage: self.stage.to_string(),
                        attempt,
                        state: result.as_ref().ok().map(|status| status.state),
                    });
                    result
                }
            },
            |status| handle.vendor.is_terminal(status),
            policy,
            self.cancel,
        )
        .await;

        match result {
            Ok(status) => {
                ctx.finish_job(self.stage);
                if status.state.is_success() {
                    info!(
                        stage = self.stage,
                        vendor = %handle.vendor,
                        job_id = %handle.id,
                        status = %status.describe(),
                        "Job completed"
                    );
                    Ok(CompletedJob { handle, status })
                } else {
                    let reason = status.failure_reason();
                    error!(
                        stage = self.stage,
                        vendor = %handle.vendor,
                        job_id = %handle.id,
                        reason = %reason,
                        "Job failed"
                    );
                    Err(StageFailure::new(reason))
                }
            }
            Err(e) if e.is_cancelled() => {
                info!(stage = self.stage, job_id = %handle.id, "Polling interrupted, job kept for resume");
                Err(e.into())
            }
            Err(e) => {
                ctx.finish_job(self.stage);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JobState, Vendor};
    use crate::events::CollectingEventSink;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct ScriptedSource {
        statuses: Mutex<VecDeque<JobStatus>>,
    }

    impl ScriptedSource {
        fn new(statuses: Vec<JobStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
            }
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self, _handle: &JobHandle) -> Result<JobStatus, JobError> {
            self.statuses
                .lock()
                .pop_front()
                .ok_or_else(|| JobError::transport("no more statuses"))
        }
    }

    fn fast() -> PollPolicy {
        PollPolicy::new(5, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_track_job_success_clears_handle() {
        let cancel = CancellationToken::new();
        let sink = CollectingEventSink::new();
        let scope = StageScope::new("p", "generate_video", &cancel, &sink);
        let mut ctx = PipelineContext::new();
        let source = ScriptedSource::new(vec![
            JobStatus::new(JobState::Processing),
            JobStatus::completed().with_result_url("https://v/1.mp4"),
        ]);

        let job = scope
            .track_job(&mut ctx, &source, &fast(), || async {
                Ok(JobHandle::new(Vendor::HeyGenVideo, "v-1"))
            })
            .await
            .unwrap();

        assert_eq!(job.handle.id, "v-1");
        assert_eq!(job.status.result_url.as_deref(), Some("https://v/1.mp4"));
        assert!(ctx.active_job("generate_video").is_none());
        assert_eq!(
            sink.event_types(),
            vec!["job.submitted", "job.polled", "job.polled"]
        );
    }

    #[tokio::test]
    async fn test_track_job_vendor_failure() {
        let cancel = CancellationToken::new();
        let sink = CollectingEventSink::new();
        let scope = StageScope::new("p", "train", &cancel, &sink);
        let mut ctx = PipelineContext::new();
        let source = ScriptedSource::new(vec![JobStatus::failed("bad photo")]);

        let failure = scope
            .track_job(&mut ctx, &source, &fast(), || async {
                Ok(JobHandle::new(Vendor::HeyGenTraining, "t-1"))
            })
            .await
            .unwrap_err();

        assert!(!failure.cancelled);
        assert!(failure.reason.contains("bad photo"));
        assert!(ctx.active_job("train").is_none());
    }

    #[tokio::test]
    async fn test_track_job_resumes_existing_handle() {
        let cancel = CancellationToken::new();
        let sink = CollectingEventSink::new();
        let scope = StageScope::new("p", "render", &cancel, &sink);
        let mut ctx = PipelineContext::new();
        ctx.begin_job("render", JobHandle::new(Vendor::ShotstackRender, "r-1"));
        let source = ScriptedSource::new(vec![JobStatus::completed()]);

        scope
            .track_job(&mut ctx, &source, &fast(), || async {
                Err(JobError::validation("must not resubmit"))
            })
            .await
            .unwrap();

        assert!(sink.events_of_type("job.submitted").is_empty());
    }

    #[tokio::test]
    async fn test_track_job_cancelled_keeps_handle() {
        let cancel = CancellationToken::new();
        let sink = CollectingEventSink::new();
        let scope = StageScope::new("p", "render", &cancel, &sink);
        let mut ctx = PipelineContext::new();
        ctx.begin_job("render", JobHandle::new(Vendor::ShotstackRender, "r-1"));
        cancel.cancel("user stop");

        let failure = scope
            .track_job(&mut ctx, &ScriptedSource::new(vec![]), &fast(), || async {
                Ok(JobHandle::new(Vendor::ShotstackRender, "r-2"))
            })
            .await
            .unwrap_err();

        assert!(failure.cancelled);
        assert_eq!(failure.reason, "user stop");
        assert_eq!(ctx.active_job("render").unwrap().id, "r-1");
    }

    #[tokio::test]
    async fn test_track_job_submit_error() {
        let cancel = CancellationToken::new();
        let sink = CollectingEventSink::new();
        let scope = StageScope::new("p", "render", &cancel, &sink);
        let mut ctx = PipelineContext::new();

        let failure = scope
            .track_job(&mut ctx, &ScriptedSource::new(vec![]), &fast(), || async {
                Err(JobError::http(401, "bad key"))
            })
            .await
            .unwrap_err();

        assert_eq!(failure.reason, "HTTP 401: bad key");
        assert!(ctx.active_job("render").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_cancellable() {
        let cancel = CancellationToken::new();
        let sink = CollectingEventSink::new();
        let scope = StageScope::new("p", "resolve_voice", &cancel, &sink);

        scope.pause(Duration::from_secs(1)).await.unwrap();
        cancel.cancel("stop");
        let failure = scope.pause(Duration::from_secs(10)).await.unwrap_err();
        assert!(failure.cancelled);
    }
}
