//! Logging: per-job files plus application-wide tracing.
//!
//! Jobs log through [`JobLogger`], which writes one file per job and can
//! mirror lines to a frontend callback. Crate-internal diagnostics go
//! through `tracing`; [`init_tracing`] installs the global subscriber.
//!
//! ```no_run
//! use vob_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("beach_day", "logs", LogConfig::default(), None).unwrap();
//! logger.phase("Encoding");
//! logger.progress(40);
//! logger.success("Encode completed");
//! ```

mod job_logger;
mod types;

pub use job_logger::{JobLogger, JobLoggerBuilder};
pub use types::{LogConfig, LogLevel, MessagePrefix, UiLogCallback};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. Call once
/// at startup; repeat calls are no-ops.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_tracing_level().to_string()));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .try_init();
}

/// Subscriber for tests: warnings and above, routed to the test writer.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_test_tracing();
        init_tracing(LogLevel::Info);
        init_tracing(LogLevel::Debug);
    }
}
