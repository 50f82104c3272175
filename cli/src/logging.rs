//! Logging setup for the `weft` binary: a daily-rotating file appender
//! formatted with [`crate::log_format::TextWithSpanIds`], plus a concise
//! stderr layer gated by `-v`/`RUST_LOG`. Library crates never install a
//! subscriber themselves — only this binary does.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::log_format::TextWithSpanIds;

/// Installs the global subscriber. Returns the file-appender's [`WorkerGuard`]
/// — it must be kept alive for the process lifetime or buffered log lines
/// are dropped on exit.
pub fn init(log_dir: &Path, verbose: bool) -> WorkerGuard {
    std::fs::create_dir_all(log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(log_dir, "weft.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(TextWithSpanIds::new())
        .with_writer(non_blocking)
        .with_ansi(false);

    let default_directive = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let stderr_layer = tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr);

    tracing_subscriber::registry().with(env_filter).with(file_layer).with(stderr_layer).init();

    guard
}
