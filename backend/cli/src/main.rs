mod api;
mod config_cmd;
mod doctor_cmd;
mod estimate_cmd;
mod status_cmd;
mod terminal_output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use kaitai_config::KaitaiConfig;
use kaitai_session::{Estimator, EstimatorOptions};
use kaitai_understanding::GeminiClient;

use api::AppState;

#[derive(Parser)]
#[command(name = "kaitai")]
#[command(about = "Kaitai — AI demolition-survey estimates from building photos")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.kaitai/kaitai.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload photos and request an estimate
    Estimate {
        /// Photos of the building (at most 10 are used)
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Print the final session as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Start the local HTTP surface
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the instruction sent with every estimate
    Prompt,
    /// Print the effective configuration with secrets masked
    Config,
    /// Query a running server
    Status,
    /// Check credential and configuration health
    Doctor,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = kaitai_config::load_and_prepare(cli.config.as_deref()).await?;

    // Dropped on return so the file writer flushes, including on failure exits.
    let _log_guard = kaitai_logging::init_logger(&config.log_level, config.log_dir.as_deref());
    kaitai_config::log_warnings(&config);

    let code = match cli.command {
        Commands::Estimate { files, json } => {
            let estimator = build_estimator(&config);
            let phase = estimate_cmd::run(&estimator, files, json).await?;
            estimate_cmd::exit_status(phase)
        }
        Commands::Serve { port } => {
            let config = KaitaiConfig {
                port: port.unwrap_or(config.port),
                ..config
            };
            run_server(config).await?;
            0
        }
        Commands::Prompt => {
            println!("{}", config.instruction());
            0
        }
        Commands::Config => {
            config_cmd::run(&config)?;
            0
        }
        Commands::Status => {
            status_cmd::run(&config).await?;
            0
        }
        Commands::Doctor => u8::from(!doctor_cmd::run(&config)),
    };

    Ok(ExitCode::from(code))
}

/// Wire the Gemini client and session driver from the loaded config.
fn build_estimator(config: &KaitaiConfig) -> Estimator<GeminiClient> {
    let client = GeminiClient::new(config.api_key.clone())
        .with_model(&config.model)
        .with_base_url(&config.base_url)
        .with_timeout(config.request_timeout());
    Estimator::new(client, EstimatorOptions::from_config(config))
}

async fn run_server(config: KaitaiConfig) -> Result<()> {
    info!(
        port = config.port,
        bind = %config.bind_address,
        model = %config.model,
        "Starting Kaitai server"
    );

    let state = Arc::new(AppState::new(build_estimator(&config)));
    let app = api::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let addr = format!("{}:{}", config.bind_address, config.port);

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app).await?;

    Ok(())
}
