//! Tracing setup: console output plus a flat WARN+ log file.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{
  filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Default filter when RUST_LOG is not set
const DEFAULT_FILTER: &str = "graphite_costing=debug,tower_http=debug";

fn open_log_file(path: &Path) -> std::io::Result<File> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber.
///
/// If the log file cannot be opened the server still starts with console
/// logging only.
pub fn init(log_file: &Path) {
  let file_layer = match open_log_file(log_file) {
    Ok(file) => Some(
      fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(LevelFilter::WARN),
    ),
    Err(e) => {
      eprintln!("Cannot open log file {}: {}", log_file.display(), e);
      None
    }
  };

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into()))
    .with(fmt::layer())
    .with(file_layer)
    .init();

  tracing::debug!("Warnings and errors are also written to {}", log_file.display());
}
