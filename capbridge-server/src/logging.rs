use crate::config::BridgeConfig;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    prelude::*,
    EnvFilter,
};

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize console logging, plus daily rolling files when the config
/// names a log directory.
pub fn init_logging(config: &BridgeConfig) -> anyhow::Result<()> {
    match &config.log_dir {
        Some(dir) => init_file_logging(dir, &config.log_prefix, &config.effective_filter()),
        None => {
            tracing_subscriber::registry()
                .with(env_filter(&config.effective_filter()))
                .with(console_layer())
                .try_init()?;
            tracing::info!("Logging initialized (console only)");
            Ok(())
        }
    }
}

fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr)
}

fn init_file_logging(log_dir: &Path, log_prefix: &str, filter: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_prefix)
        .build(log_dir)?;

    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter(filter))
        .with(console_layer())
        .with(file_layer)
        .try_init()?;

    // The writer flushes until the process exits.
    std::mem::forget(guard);

    tracing::info!("Logging initialized with file output to {:?}", log_dir);
    Ok(())
}

/// Initialize simple console-only logging for tests
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("capbridge=trace,debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::debug!("still usable");
    }
}
