use anyhow::Context;
use clap::Parser;
use kontrol_scaffold::core::naming::project_slug;
use kontrol_scaffold::utils::error::{ErrorSeverity, ScaffoldError};
use kontrol_scaffold::utils::monitor::SystemMonitor;
use kontrol_scaffold::utils::{logger, validation::Validate};
use kontrol_scaffold::{CliConfig, EngineSettings, ProjectGraph, ScaffoldConfig, ScaffoldEngine, TemplateRegistry};
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting kontrol-scaffold CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let settings = load_settings(config.config.as_deref())?;
    let monitor = SystemMonitor::new(config.monitor);
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    let content = std::fs::read_to_string(&config.input)
        .with_context(|| format!("failed to read project graph '{}'", config.input))?;

    let engine = ScaffoldEngine::with_settings(TemplateRegistry::builtin(), settings);
    let result = ProjectGraph::from_json_str(&content)
        .and_then(|graph| write_archive(&engine, graph, Path::new(&config.output), &monitor));
    monitor.log_final_stats();

    match result {
        Ok(path) => {
            tracing::info!("✅ Scaffold generated successfully!");
            println!("✅ Scaffold generated successfully!");
            println!("📁 Output saved to: {}", path.display());
        }
        Err(e) => {
            tracing::error!(
                "❌ Generation failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e);
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn load_settings(path: Option<&str>) -> anyhow::Result<EngineSettings> {
    let Some(path) = path else {
        return Ok(EngineSettings::default());
    };
    tracing::info!("📁 Loading configuration from: {}", path);
    let config = ScaffoldConfig::from_file(path)
        .with_context(|| format!("failed to load config file '{}'", path))?;
    config.validate().context("invalid configuration")?;
    Ok(config.engine_settings())
}

/// Writes `<output>/<slug>.zip` through a temp file in the same directory so
/// a failed run never leaves a partial archive behind.
fn write_archive(
    engine: &ScaffoldEngine,
    graph: ProjectGraph,
    output: &Path,
    monitor: &SystemMonitor,
) -> Result<PathBuf, ScaffoldError> {
    std::fs::create_dir_all(output)?;
    let target = output.join(format!("{}.zip", project_slug(&graph.name)));

    let mut temp = tempfile::NamedTempFile::new_in(output)?;
    engine.generate_into(graph, temp.as_file_mut(), monitor)?;
    temp.as_file().sync_all()?;
    temp.persist(&target).map_err(|e| ScaffoldError::IoError(e.error))?;
    Ok(target)
}
