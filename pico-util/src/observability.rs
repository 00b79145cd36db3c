use std::error::Error;
use std::path::Path;

use log::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::env_var::log_level;

/** create a non blocking tracing file appender, without rolling */
pub fn setup_file_appender<P: AsRef<Path>>(datadir: P, who: &str) -> (NonBlocking, WorkerGuard) {
    let file_appender = rolling::never(datadir.as_ref(), format!("{}.log", who));

    tracing_appender::non_blocking(file_appender)
}

fn to_level(filter: LevelFilter) -> Option<Level> {
    match filter {
        LevelFilter::Off => None,
        LevelFilter::Error => Some(Level::ERROR),
        LevelFilter::Warn => Some(Level::WARN),
        LevelFilter::Info => Some(Level::INFO),
        LevelFilter::Debug => Some(Level::DEBUG),
        LevelFilter::Trace => Some(Level::TRACE),
    }
}

/**
 * create a RUST_LOG env based log filter.  The default level is taken from
 * PICO_LOG_LEVEL, or info if unset.
 */
pub fn env_filter() -> EnvFilter {
    let default_level = match log_level() {
        Some(filter) => to_level(filter),
        None => Some(Level::INFO),
    };
    let builder = EnvFilter::builder();
    match default_level {
        Some(level) => builder.with_default_directive(level.into()).from_env_lossy(),
        None => builder
            .with_default_directive(tracing_subscriber::filter::LevelFilter::OFF.into())
            .from_env_lossy(),
    }
}

/**
 * Initialize tracing-subscriber with env filter based on RUST_LOG env variable.
 * fmt layer is used to print logs to stderr.
 * If a datadir is given, a second fmt layer writes to `<who>.log` there.
 * `log` records from the channel crates are forwarded to tracing.
 */
pub fn init_tracing_subscriber<P: AsRef<Path>>(
    datadir: Option<P>,
    who: &str,
) -> Result<LogGuard, Box<dyn Error>> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    let (file_layer, file_guard) = match datadir {
        Some(datadir) => {
            let (file_writer, file_guard) = setup_file_appender(datadir, who);
            (Some(fmt::layer().with_ansi(false).with_writer(file_writer)), Some(file_guard))
        }
        None => (None, None),
    };

    let default_subscriber =
        tracing_subscriber::registry().with(stderr_layer).with(file_layer).with(env_filter());

    match default_subscriber.try_init() {
        Ok(_) => Ok(LogGuard::new(file_guard)),
        Err(err) => Err(Box::new(err)),
    }
}

/// Flushes the log file when dropped
pub struct LogGuard {
    _file_appender_guard: Option<WorkerGuard>,
}

impl LogGuard {
    pub fn new(file_appender_guard: Option<WorkerGuard>) -> Self {
        Self { _file_appender_guard: file_appender_guard }
    }
}
