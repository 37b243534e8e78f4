use std::env;

use realmgate_server::ServerBuilder;
use realmgate_server::config::loader::{DEFAULT_CONFIG_FILE, load_config};

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    realmgate_server::observability::init_tracing();

    let config_path = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    realmgate_server::observability::apply_logging_level(&cfg.logging.level);
    tracing::info!(
        path = %config_path,
        base_url = %cfg.sso.base_url,
        storage = ?cfg.storage.backend,
        admin_api = cfg.sso.admin_token.is_some(),
        "Configuration loaded"
    );

    let server = match ServerBuilder::new().with_config(cfg).build().await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e:#}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: REALMGATE_CONFIG
/// 3. Default: realmgate.toml
fn resolve_config_path() -> String {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return path;
        }
    }

    if let Ok(path) = env::var("REALMGATE_CONFIG")
        && !path.is_empty()
    {
        return path;
    }

    DEFAULT_CONFIG_FILE.to_string()
}
