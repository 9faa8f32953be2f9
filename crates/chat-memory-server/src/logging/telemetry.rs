//! Telemetry setup

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "info,chat_memory_server=debug";

/// Install the global subscriber. Keep the returned guard alive for the
/// whole process, dropping it flushes the file writer.
pub fn init_telemetry(config: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout_layer = if config.json {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).boxed()
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "chat-memory-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .json()
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}
