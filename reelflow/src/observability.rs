//! Tracing setup and stage timing.

use std::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::errors::ConfigError;

/// Installs the global tracing subscriber.
///
/// The filter comes from the config (normally `RUST_LOG`); JSON output is
/// selected with `REELFLOW_LOG_FORMAT=json`. Installing twice is an error.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(&config.filter).map_err(|e| {
        ConfigError::invalid("RUST_LOG", config.filter.clone(), e.to_string())
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| ConfigError::Logging {
        message: e.to_string(),
    })
}

/// Measures how long a stage ran.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    stage: String,
}

impl StageTimer {
    /// Starts timing a stage.
    #[must_use]
    pub fn start(stage: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            stage: stage.into(),
        }
    }

    /// Elapsed milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// The stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Stops the timer and returns the elapsed milliseconds.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start("generate_video");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(timer.stage(), "generate_video");
        assert!(timer.finish() >= 5.0);
    }

    #[test]
    fn test_invalid_filter() {
        let config = LoggingConfig {
            filter: "reelflow=loud".to_string(),
            json: false,
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RUST_LOG"));
    }
}
