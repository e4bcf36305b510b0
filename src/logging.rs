//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging retry storms and
//! interleaved async task execution.

use std::sync::OnceLock;

use chrono::Utc;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(log_level)),
        );

        // A global subscriber may already be set by the embedding application
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized, continuing");
        }

        tracing::info!(
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("TASK_CORE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for task operations
pub fn log_task_operation(
    operation: &str,
    task_id: &str,
    parent_id: &str,
    capability: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = %task_id,
        parent_id = %parent_id,
        capability = %capability,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}

/// Log structured data for remote invocations
pub fn log_invocation(
    function: &str,
    attempt: u32,
    status: &str,
    elapsed_ms: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        function = %function,
        attempt = attempt,
        status = %status,
        elapsed_ms = elapsed_ms,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📡 INVOCATION"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("TASK_CORE_ENV", "test_override");
        let env = get_environment();
        assert_eq!(env, "test_override");
        std::env::remove_var("TASK_CORE_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("unknown"), "debug");
    }
}
