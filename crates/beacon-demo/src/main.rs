use anyhow::{Context, Result};
use beacon_http::{CompletionPolicy, RequestLogging};
use beacon_log::{FileOutputConfig, Logger, LoggerConfig, Severity};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

mod app;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Logger configuration file
    #[arg(long, help = "Path to logger configuration file (TOML)")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080", help = "Address to bind the HTTP server to")]
    bind: SocketAddr,

    /// Deployment environment ("development" selects text output)
    #[arg(long, help = "Set deployment environment")]
    environment: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, help = "Set log level")]
    log_level: Option<String>,

    /// Write logs to a size-rotated file instead of stderr
    #[arg(long, help = "Path of the rotating log file")]
    log_file: Option<PathBuf>,

    /// Log request completion even when a handler panics or is cancelled
    #[arg(long, help = "Always emit the request completion record")]
    always_log_completion: bool,
}

/// Create logger configuration from file, environment and CLI arguments,
/// later sources overriding earlier ones
fn create_logger_config(cli: &Cli) -> Result<LoggerConfig> {
    let mut config = match &cli.config {
        Some(path) => LoggerConfig::load(path)
            .with_context(|| format!("Failed to load logger config {}", path.display()))?,
        None => LoggerConfig::default(),
    };

    if config.business.is_empty() {
        config.business = "beacon".to_string();
    }
    if config.service.is_empty() {
        config.service = env!("CARGO_PKG_NAME").to_string();
    }
    if config.version.is_empty() {
        config.version = env!("CARGO_PKG_VERSION").to_string();
    }

    config.load_env_overrides();

    if let Some(environment) = &cli.environment {
        config.environment = environment.clone();
    }

    if let Some(level) = &cli.log_level {
        config.level = level
            .parse::<Severity>()
            .with_context(|| format!("Invalid --log-level '{}'", level))?;
    }

    if let Some(log_file) = &cli.log_file {
        config
            .file_output
            .get_or_insert_with(FileOutputConfig::default)
            .filename = log_file.clone();
    }

    Ok(config)
}

async fn shutdown_signal(logger: Logger) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => logger.info("Shutdown signal received"),
        Err(e) => logger.error(e, "Failed to listen for shutdown signal"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before building configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = create_logger_config(&cli)?;
    let logger = Logger::new(config);

    let policy = if cli.always_log_completion {
        CompletionPolicy::Always
    } else {
        CompletionPolicy::SkipOnPanic
    };
    let app = app::router(RequestLogging::new(logger.clone()).with_policy(policy));

    let listener = match tokio::net::TcpListener::bind(cli.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            logger
                .with_field("bind", cli.bind.to_string())
                .error(&e, "Failed to bind listener");
            return Err(e).with_context(|| format!("Failed to bind {}", cli.bind));
        }
    };

    logger
        .with_field("bind", cli.bind.to_string())
        .with_field("completion_policy", format!("{:?}", policy))
        .info("Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(logger.clone()))
    .await
    .context("HTTP server failed")?;

    logger.info("Server stopped");
    Ok(())
}
