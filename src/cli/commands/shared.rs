//! Shared components for CLI commands
//!
//! Logging setup and configuration loading used by every subcommand.

use crate::cli::args::CommonArgs;
use crate::config::Config;
use crate::error::Result;
use std::path::PathBuf;
use tracing::{debug, info};

/// Set up structured logging
pub fn setup_logging(args: &CommonArgs) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("seismo_cern={}", log_level)));

    if args.quiet {
        // Minimal logging for quiet mode
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Resolve which configuration file to read, if any
pub fn config_file_path(args: &CommonArgs) -> Option<PathBuf> {
    match &args.config_file {
        Some(path) => Some(path.clone()),
        None => Config::default_config_path()
            .ok()
            .filter(|path| path.exists()),
    }
}

/// Load configuration from defaults and the optional TOML file.
///
/// Command-specific overrides are applied by the caller, which validates
/// the final result.
pub fn load_configuration(args: &CommonArgs) -> Result<Config> {
    let config_file = config_file_path(args);
    match &config_file {
        Some(path) => info!("Using config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    Config::load_layered(config_file.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn common(config_file: Option<PathBuf>) -> CommonArgs {
        CommonArgs {
            config_file,
            verbose: 0,
            quiet: true,
        }
    }

    #[test]
    fn test_explicit_config_file_is_used() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("seismo.toml");
        std::fs::write(&path, "[acquisition]\nradius_deg = 0.2\n").unwrap();

        let config = load_configuration(&common(Some(path.clone()))).unwrap();
        assert_eq!(config.acquisition.radius_deg, 0.2);
        assert_eq!(config_file_path(&common(Some(path.clone()))), Some(path));
    }

    #[test]
    fn test_missing_explicit_config_file_fails() {
        let result = load_configuration(&common(Some(PathBuf::from("/nonexistent/seismo.toml"))));
        assert!(result.is_err());
    }
}
