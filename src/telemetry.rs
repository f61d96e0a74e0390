use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

// HTTP and runtime crates stay at this level unless `RUST_LOG` says otherwise.
const DEPENDENCY_LEVEL: &str = "warn";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level '{value}': unable to build EnvFilter")]
    EnvFilter { value: String, source: ParseError },
    #[error("telemetry error: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

/// `RUST_LOG` wins over the configured level when set. Otherwise the
/// configured level applies to this crate and dependencies log warnings only.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

fn default_directives(log_level: &str) -> String {
    format!(
        "{DEPENDENCY_LEVEL},{crate_name}={log_level}",
        crate_name = env!("CARGO_CRATE_NAME")
    )
}

fn default_filter(log_level: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(default_directives(log_level)).map_err(|source| {
        TelemetryError::EnvFilter {
            value: log_level.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_scoped_to_this_crate() {
        assert_eq!(default_directives("debug"), "warn,route_risk=debug");
        assert!(default_filter("debug").is_ok());
    }

    #[test]
    fn unknown_level_is_reported() {
        let err = default_filter("chatty").expect_err("not a level");
        assert!(matches!(err, TelemetryError::EnvFilter { ref value, .. } if value == "chatty"));
    }
}
