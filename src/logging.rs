use anyhow::Context;
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE: &str = "botgpt.log";
const DEFAULT_FILTER: &str = "info,tower_http=debug";

// Flushes the file writer on drop, so it lives for the whole process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber: stdout plus a daily-rolling
/// `<log_dir>/botgpt.log` without ANSI colours. `RUST_LOG` replaces
/// the default filter.
pub fn init(log_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE));
    if FILE_GUARD.set(guard).is_err() {
        anyhow::bail!("logging already initialised");
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(dir = %log_dir.display(), file = LOG_FILE, "logging initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_log_dir_is_reported() {
        let dir = std::env::temp_dir().join(format!("botgpt-log-{}", uuid::Uuid::new_v4()));
        std::fs::write(&dir, b"not a directory").unwrap();

        let err = init(&dir).unwrap_err();
        assert!(err.to_string().starts_with("failed to create log directory"));

        std::fs::remove_file(&dir).unwrap();
    }
}
