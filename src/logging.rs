#![forbid(unsafe_code)]

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Installs the global subscriber. `RUST_LOG` wins over `log.level`.
///
/// With `file` set, events go there instead of stderr so a full-screen UI is
/// not drawn over. Calling this twice is harmless.
pub fn init(cfg: &LogConfig, file: Option<&Path>) -> anyhow::Result<()> {
    let filter = env_filter(&cfg.level);

    let Some(path) = file else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(f))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.trim();
        EnvFilter::new(if level.is_empty() { "warn" } else { level })
    })
}
