use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{io_error, Error, Result};

/// Log file of the current day in `dir`.
pub fn log_file(dir: &Path) -> PathBuf {
    dir.join(format!("gatekeeper-{}.log", Local::now().format("%Y-%m-%d")))
}

/// Installs the global subscriber: stderr always, plus an appending plain-text file per
/// day in `dir` when file logging is enabled. `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig, dir: &Path) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let stderr = fmt::layer().with_writer(io::stderr).with_target(true);

    let file = if config.file {
        fs::create_dir_all(dir).map_err(io_error(dir))?;
        let path = log_file(dir);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .try_init()
        .map_err(|error| Error::Logging(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_named_by_day() {
        let path = log_file(Path::new("/var/log/gatekeeper"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("gatekeeper-"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "gatekeeper-2024-01-01.log".len());
    }
}
