use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Directory the rolling log files are written to
pub const LOG_DIR: &str = "logs";

/// Installs the global subscriber.
///
/// `log_level` is an `EnvFilter` directive such as `info` or
/// `taskweave=debug,reqwest=warn`; an invalid directive falls back to `info`.
/// With `with_file`, output is also written to a daily rotating
/// `logs/taskweave.log`.
///
/// ```ignore
/// init_logging("info", true)?;
/// ```
pub fn init_logging(log_level: &str, with_file: bool) -> Result<(), TryInitError> {
    let filter = match EnvFilter::try_new(log_level) {
        Ok(f) => f,
        Err(_) => {
            eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
            EnvFilter::new("info")
        }
    };

    let stdout_layer = fmt::layer().with_line_number(true).with_target(false);

    if with_file {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, "taskweave.log");
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_line_number(true)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .try_init()
    }
}
