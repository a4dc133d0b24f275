//! sunplan-ai - Rooftop solar analysis service
//!
//! **Module Identity:**
//! - Name: sunplan-ai
//! - Port: 5790 (configurable in `[server]`)
//!
//! Subcommands:
//! - `serve` - run the HTTP API (default)
//! - `analyze <image>` - analyze one photo and print the report as JSON

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sunplan_ai::engine::{CostOptions, PanelTier, RoofMaterial};
use sunplan_ai::{build_router, AnalysisPipeline, AnalysisRequest, AppState};
use sunplan_common::config::{load_config, ConfigResolver, TomlConfig};
use sunplan_common::models::{Address, AnalysisMode};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for sunplan-ai
#[derive(Parser, Debug)]
#[command(name = "sunplan-ai")]
#[command(about = "Rooftop solar analysis service")]
#[command(version)]
struct Args {
    /// Config file (overrides SUNPLAN_CONFIG and the default locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides [server] port)
        #[arg(short, long, env = "SUNPLAN_PORT")]
        port: Option<u16>,
    },
    /// Analyze one rooftop photo and print the report
    Analyze {
        /// JPEG or PNG file
        image: PathBuf,

        /// Street address of the property
        #[arg(long, default_value = "")]
        street: String,

        #[arg(long, default_value = "")]
        city: String,

        #[arg(long, default_value = "")]
        country: String,

        /// Assess mounted panels instead of planning a new installation
        #[arg(long)]
        existing: bool,

        /// Monthly electricity bill, caps projected savings
        #[arg(long)]
        bill: Option<f64>,

        /// Use premium panels for the cost estimate
        #[arg(long)]
        premium: bool,

        /// Roof covering: asphalt, metal, tile or slate
        #[arg(long, default_value = "asphalt")]
        roof_material: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new("sunplan");
    let config_path = resolver.resolve(args.config.as_deref());
    let config = load_config(config_path.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over [logging] level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting sunplan-ai v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using built-in defaults"),
    }

    let pipeline =
        AnalysisPipeline::from_config(&config).context("Failed to build analysis pipeline")?;

    match args.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(&config, pipeline, port).await,
        Command::Analyze {
            image,
            street,
            city,
            country,
            existing,
            bill,
            premium,
            roof_material,
        } => {
            let roof_material: RoofMaterial =
                serde_json::from_value(serde_json::Value::String(roof_material.to_lowercase()))
                    .context("Unknown roof material (asphalt, metal, tile, slate)")?;
            let request = AnalysisRequest {
                image: tokio::fs::read(&image)
                    .await
                    .with_context(|| format!("Failed to read {}", image.display()))?,
                mime: mime_from_extension(&image).to_string(),
                address: Address {
                    street,
                    city,
                    region: None,
                    postal_code: None,
                    country,
                },
                mode: if existing {
                    AnalysisMode::ExistingInstallation
                } else {
                    AnalysisMode::NewInstallation
                },
                monthly_bill: bill,
                cost_options: CostOptions {
                    panel_tier: if premium {
                        PanelTier::Premium
                    } else {
                        PanelTier::Standard
                    },
                    roof_material,
                },
            };
            analyze_once(pipeline, request).await
        }
    }
}

async fn serve(config: &TomlConfig, pipeline: AnalysisPipeline, port: Option<u16>) -> Result<()> {
    let state = AppState::new(pipeline);
    let app = build_router(state);

    let port = port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn analyze_once(pipeline: AnalysisPipeline, request: AnalysisRequest) -> Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let report = pipeline
        .run(request, &cancel)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e.code()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize report")?
    );
    Ok(())
}

/// Declared type from the file extension; the pipeline checks the content
fn mime_from_extension(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
