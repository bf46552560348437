use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use telebridge::config::{BridgeConfig, ConfigLoadError};
use telebridge::logging::init_logging;
use telebridge::loopback::LoopbackTransport;
use telebridge::model::{EntityKind, EntityResolver, SystemModel};
use telebridge::scripting::{ScriptEngine, ScriptOutcome, ScriptRunner};
use telebridge::scripts::create_registry;

#[derive(Parser)]
#[command(
    version = env!("TELEBRIDGE_VERSION"),
    about = "Run automation scripts against a telemetry system model",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a system model and print a summary
    Check {
        #[arg(short, long)]
        model: PathBuf,
    },
    /// Run built-in scripts against loopback collaborators
    Run {
        /// Config file (default: the per-user config.toml, if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// System model, overriding the config's `model`
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Script IDs; defaults to `scripting.enabled_scripts`
        scripts: Vec<String>,
    },
}

fn load_model(path: &Path) -> anyhow::Result<SystemModel> {
    SystemModel::load(path).with_context(|| format!("loading model {}", path.display()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => match BridgeConfig::load() {
            Ok(config) => Ok(config),
            Err(ConfigLoadError::NotFound) => Ok(BridgeConfig::default()),
            Err(e) => Err(e).context("loading default config"),
        },
    }
}

fn check(model_path: &Path) -> anyhow::Result<()> {
    let model = load_model(model_path)?;
    let resolver = EntityResolver::build(&model)?;

    println!("{}: {} entities", model_path.display(), resolver.len());
    for kind in [
        EntityKind::Parameter,
        EntityKind::Event,
        EntityKind::Activity,
        EntityKind::Container,
    ] {
        let count = resolver.entities().filter(|e| e.kind == kind).count();
        println!("  {:<10} {}", kind.to_string(), count);
    }
    Ok(())
}

async fn run(
    config_path: Option<PathBuf>,
    model_override: Option<PathBuf>,
    requested: Vec<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref())?;
    let _guard = init_logging("run", config.logging.file)?;

    if !config.scripting.enabled {
        bail!("scripting is disabled in the configuration");
    }

    let Some(model_path) = model_override.or_else(|| config.model.clone()) else {
        bail!("no system model given (use --model or set `model` in the config)");
    };
    let model = load_model(&model_path)?;

    let mut builder = ScriptEngine::builder(model)
        .waits(config.waits.clone())
        .activities(config.activities.clone());
    for (name, connector) in &config.connectors {
        let transport = Arc::new(LoopbackTransport::with_drain_delay(Duration::from_millis(
            connector.drain_ms,
        )));
        builder = builder.connector(
            name.clone(),
            connector.description.clone(),
            connector.properties.clone(),
            transport,
        );
    }
    let engine = builder.build()?;

    let ids = if requested.is_empty() {
        config.scripting.enabled_scripts.clone()
    } else {
        requested
    };
    if ids.is_empty() {
        bail!("no scripts to run");
    }

    let registry = create_registry();
    let mut runner = ScriptRunner::new(engine);
    for script in registry.create_scripts(&ids, &config.scripting) {
        runner.start(script)?;
    }

    // Poll so Ctrl-C can abort scripts blocked in long waits
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, aborting scripts");
                runner.abort_all();
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {
                if runner.running().is_empty() {
                    break;
                }
            }
        }
    }

    let outcomes = tokio::task::spawn_blocking(move || runner.join_all()).await?;
    let mut failed = 0;
    for (id, outcome) in &outcomes {
        info!("{}: {:?}", id, outcome);
        if !matches!(outcome, ScriptOutcome::Completed) {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} scripts did not complete", failed, outcomes.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check { model } => check(&model),
        Command::Run {
            config,
            model,
            scripts,
        } => run(config, model, scripts).await,
    }
}
