use anyhow::Context;
use clap::Parser;
use kontrol_scaffold::config::build_store;
use kontrol_scaffold::server::{router, AppState};
use kontrol_scaffold::utils::{logger, validation::Validate};
use kontrol_scaffold::{ScaffoldConfig, ScaffoldEngine, TemplateRegistry};

#[derive(Parser)]
#[command(name = "scaffold-server")]
#[command(about = "HTTP API that turns service graphs into downloadable scaffolds")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "SCAFFOLD_CONFIG")]
    config: Option<String>,

    /// Override the listening port from config
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ScaffoldConfig::from_file(path)
            .with_context(|| format!("failed to load config file '{}'", path))?,
        None => ScaffoldConfig::default(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    logger::init_server_logger(&config.logging.level, config.logging.json);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let registry = TemplateRegistry::builtin();
    tracing::info!("Loaded {} service templates", registry.len());

    let engine = ScaffoldEngine::with_settings(registry, config.engine_settings());
    let store = build_store(&config.store).context("failed to set up project store")?;
    let state = AppState::new(engine).with_store(store);
    let app = router(state, &config.server.cors_origin).context("invalid server configuration")?;

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!("🚀 Scaffold API listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
