//! Stand-in stages for orchestrator tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::TemporaryResource;
use crate::errors::StageFailure;
use crate::pipeline::{PipelineContext, Stage, StageScope};

/// A stage that records calls and optionally registers temporary resources.
#[derive(Debug)]
pub struct MockStage {
    name: String,
    resources: Vec<TemporaryResource>,
    call_count: Mutex<usize>,
}

impl MockStage {
    /// Creates a stage that succeeds without touching the context.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
            call_count: Mutex::new(0),
        }
    }

    /// Registers `resource` in the context on every call.
    #[must_use]
    pub fn registering(mut self, resource: TemporaryResource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Stage for MockStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &mut PipelineContext, _scope: &StageScope<'_>) -> Result<(), StageFailure> {
        *self.call_count.lock() += 1;
        for resource in &self.resources {
            ctx.register_resource(resource.clone());
        }
        Ok(())
    }
}

/// A stage that fails, forever or for its first few calls.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    reason: String,
    failures: Option<usize>,
    call_count: Mutex<usize>,
}

impl FailingStage {
    /// Creates a stage that always fails with `reason`.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
            failures: None,
            call_count: Mutex::new(0),
        }
    }

    /// Fails only the first `times` calls, then succeeds.
    #[must_use]
    pub fn failing_times(mut self, times: usize) -> Self {
        self.failures = Some(times);
        self
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &mut PipelineContext, _scope: &StageScope<'_>) -> Result<(), StageFailure> {
        let call = {
            let mut count = self.call_count.lock();
            *count += 1;
            *count
        };
        match self.failures {
            Some(times) if call > times => Ok(()),
            _ => Err(StageFailure::new(self.reason.clone())),
        }
    }
}
