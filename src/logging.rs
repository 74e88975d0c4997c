// Logging bootstrap

use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use env_logger::{Builder, Target};

use crate::config::LoggingConfig;

/// Install the `env_logger` backend. `RUST_LOG` overrides the configured
/// level. Safe to call more than once; later calls only log a debug line.
///
/// With `log_to_file` set, records go to `log_file` instead of stderr. If
/// the file cannot be opened the logger falls back to stderr and says so.
pub fn init_logging(config: &LoggingConfig) {
    let (mut builder, file_error) = match build_logger(config) {
        Ok(builder) => (builder, None),
        Err(err) => {
            let mut fallback = config.clone();
            fallback.log_to_file = false;
            match build_logger(&fallback) {
                Ok(builder) => (builder, Some(err)),
                Err(_) => return,
            }
        }
    };
    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
        return;
    }
    if let Some(err) = file_error {
        log::warn!("Could not open log file {}: {}, logging to stderr", config.log_file, err);
    }
}

/// Configured `env_logger` builder, not yet installed.
pub fn build_logger(config: &LoggingConfig) -> io::Result<Builder> {
    let mut builder = Builder::new();
    builder.filter_level(config.level_filter());
    builder.parse_default_env();
    if config.log_to_file {
        let file = open_log_file(&config.log_file)?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    Ok(builder)
}

/// Create or clear the log file and write the session banner.
fn open_log_file(path: &str) -> io::Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    writeln!(file, "=== Shader Layout Compiler Log ===")?;
    writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;
    Ok(file)
}
