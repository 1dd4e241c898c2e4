//! dropboard-server - HTTP entry point
//!
//! Configuration precedence: command line, then environment, then the TOML
//! config file, then compiled defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dropboard_common::config::Config;
use dropboard_server::{build_router, AppState, DropService};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for dropboard-server
#[derive(Parser, Debug)]
#[command(name = "dropboard-server")]
#[command(about = "Room leaderboards, streaks and badges for scored submissions")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "DROPBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "DROPBOARD_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "DROPBOARD_BIND_HOST")]
    bind_host: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = "DROPBOARD_DATABASE")]
    database: Option<PathBuf>,

    /// Image analyzer endpoint
    #[arg(long, env = "DROPBOARD_ANALYZER_URL")]
    analyzer_url: Option<String>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind_host) = self.bind_host {
            config.bind_host = bind_host;
        }
        if let Some(database) = self.database {
            config.database_path = database;
        }
        if let Some(url) = self.analyzer_url {
            config.analyzer.url = Some(url);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging starts before the config file is read; its level is applied once loaded
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(log_filter("info"))));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if !from_env {
        match EnvFilter::try_new(log_filter(&config.logging.level)) {
            Ok(filter) => {
                if let Err(e) = filter_handle.reload(filter) {
                    warn!("Failed to apply log level {}: {}", config.logging.level, e);
                }
            }
            Err(e) => warn!("Ignoring log level {}: {}", config.logging.level, e),
        }
    }

    info!(
        "Starting dropboard-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    info!("Database path: {}", config.database_path.display());
    let pool = dropboard_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let service = DropService::from_config(pool, &config).context("Failed to build service")?;
    let app = build_router(AppState::new(service));

    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_host, config.port))?;

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Default directives when RUST_LOG is unset
fn log_filter(level: &str) -> String {
    format!("dropboard_server={level},dropboard_common={level},tower_http=info")
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_covers_both_crates() {
        let directives = log_filter("debug");
        assert!(directives.contains("dropboard_server=debug"));
        assert!(directives.contains("dropboard_common=debug"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from(["dropboard-server", "--port", "9100", "--analyzer-url", "http://a"]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.port, 9100);
        assert_eq!(config.analyzer.url.as_deref(), Some("http://a"));
        assert_eq!(config.bind_host, Config::default().bind_host);
    }
}
