//! Log setup for the RealmGate binary.
//!
//! The subscriber starts at `info` before the configuration file is read and
//! is switched to `logging.level` once it is. The level applies to the
//! RealmGate crates and request traces; HTTP client and database internals
//! stay at `warn` unless `RUST_LOG` asks for more.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Crates whose chatter is capped at `warn`.
const QUIET_TARGETS: [&str; 4] = ["hyper", "hyper_util", "reqwest", "sqlx"];

/// Builds the filter for a configured level such as `debug`.
pub fn level_filter(level: &str) -> EnvFilter {
    let level = level.to_ascii_lowercase();
    let mut directives = vec![level.clone()];
    if level != "off" {
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    }
    EnvFilter::new(directives.join(","))
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Installs the global subscriber. `RUST_LOG`, when set and valid, wins
/// over `level` for the lifetime of the process.
pub fn init_tracing_with_level(level: &str) {
    let filter = std::env::var_os("RUST_LOG")
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| level_filter(level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches to the configured level, unless `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Some(handle) = FILTER_HANDLE.get()
        && let Err(e) = handle.modify(|filter| *filter = level_filter(level))
    {
        eprintln!("Failed to apply logging level {level}: {e}");
    }
}
