//! # Reelflow
//!
//! Orchestration of long-running vendor jobs for short marketing videos.
//!
//! Reelflow drives HeyGen avatar video generation, HeyGen photo-avatar
//! training and Shotstack template rendering, with Gemini script writing,
//! OpenAI speech synthesis and Supabase storage as supporting services.
//! It provides:
//!
//! - **Job clients**: typed wrappers that turn vendor JSON envelopes into a
//!   uniform [`JobStatus`](core::JobStatus) / [`JobError`](errors::JobError) shape
//! - **Polling**: a bounded fixed-delay loop with cooperative cancellation
//! - **Orchestration**: a stage-by-stage state machine that carries ids and
//!   urls forward and stops at the first failure
//! - **Sessions**: a background run that publishes progress snapshots for a UI
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reelflow::prelude::*;
//!
//! let settings = Settings::load()?;
//! let transport = Arc::new(ReqwestTransport::new(settings.http_timeout));
//! let clients = VendorClients::from_settings(&settings, transport)?;
//!
//! let pipeline = avatar_video_pipeline(&clients, request, &settings.pacing)?;
//! let session = PipelineSession::start(pipeline);
//! let finished = session.finish().await?;
//! println!("{:?}", finished.orchestrator.snapshot().final_video_url);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod poller;
pub mod session;
pub mod testing;
pub mod vendors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{Pacing, Settings};
    pub use crate::core::{
        JobHandle, JobState, JobStatus, ResourceKind, TemporaryResource, Vendor,
    };
    pub use crate::errors::{
        ConfigError, JobError, OrchestratorError, PollError, ReelflowError, StageFailure,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
    };
    #[cfg(feature = "reqwest-transport")]
    pub use crate::http::ReqwestTransport;
    pub use crate::http::{HttpRequest, HttpResponse, HttpTransport};
    pub use crate::pipeline::{
        avatar_video_pipeline, group_training_pipeline, render_pipeline, AvatarSource,
        AvatarVideoRequest, Orchestrator, PipelineContext, PipelineState, RunOutcome,
        RunSnapshot, Stage, StageScope, TrainingRequest, VendorClients, VoiceSource,
    };
    pub use crate::poller::{poll, PollPolicy};
    pub use crate::session::{FinishedRun, PipelineSession, SessionError};
    pub use crate::vendors::{
        GeminiClient, HeyGenClient, MergeField, OpenAiSpeechClient, RenderTemplate,
        ShotstackClient, StatusSource, SupabaseStorage, VideoDimension, VideoRequest,
    };
}
