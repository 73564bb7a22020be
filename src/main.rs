use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use student_counsellor::{
    catalog,
    cohere::CohereClient,
    config::{Config, LogFormat},
    server::{AppState, McpServer},
    slots::FileSlotStore,
    storage::SqliteStorage,
};

/// Learning-style assessment and counselling MCP server.
#[derive(Parser, Debug)]
#[command(name = "student-counsellor", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP over stdin/stdout (default)
    Serve,
    /// Print the question catalog
    Questions {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Questions { json } => print_questions(json),
    }
}

async fn serve() -> anyhow::Result<()> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Student counsellor server starting..."
    );

    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    let slots = FileSlotStore::new(config.state.dir.clone());
    info!(dir = %slots.dir().display(), "State slots ready");

    let cohere = match CohereClient::new(&config.cohere, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.cohere.base_url, "Cohere client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Cohere client");
            return Err(e.into());
        }
    };

    let state = Arc::new(AppState::new(
        config,
        Arc::new(storage),
        Arc::new(slots),
        Arc::new(cohere),
    ));
    let server = McpServer::new(state);

    info!("Server ready, waiting for requests on stdin...");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

fn print_questions(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(catalog::questions())?);
        return Ok(());
    }

    for question in catalog::questions() {
        println!("{}. {}", question.id, question.text);
        for option in question.options {
            println!("   {}) {}", option.key, option.label);
        }
    }
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // stdout carries the protocol, so logs go to stderr
    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
