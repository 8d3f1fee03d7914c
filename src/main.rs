//! broca CLI: drive grounded episodes against a NARS backend.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use broca::action::ActionMap;
use broca::agent::Agent;
use broca::bridge::{OnaBridge, OpenNarsBridge, Reasoner};
use broca::config::{Backend, BrocaConfig};
use broca::quantizer::Snapshot;
use broca::world::{ClusteredWorld, CyclicWorld, World};

#[derive(Parser)]
#[command(name = "broca", version, about = "Symbol grounding bridge for NARS agents")]
struct Cli {
    /// Path to a TOML config file; flags below override its fields.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Knowledge snapshot location.
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run grounded episodes against a reasoner backend.
    Run {
        /// Reasoner backend.
        #[arg(long, value_enum, default_value = "ona")]
        backend: CliBackend,

        /// Built-in demo environment id.
        #[arg(long, default_value = "cyclic")]
        env: String,

        /// Path to the ONA `NAR` executable.
        #[arg(long)]
        nar: Option<PathBuf>,

        /// Path to the OpenNARS jar (opennars backend).
        #[arg(long)]
        jar: Option<PathBuf>,

        /// Number of episodes.
        #[arg(long)]
        episodes: Option<usize>,
    },

    /// Print the live symbol table of a snapshot as JSON.
    ExportSymbols,

    /// Show snapshot statistics.
    SnapshotInfo,

    /// Write the default config as TOML.
    InitConfig {
        /// Destination path.
        #[arg(long, default_value = "broca.toml")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliBackend {
    Ona,
    Opennars,
}

impl From<CliBackend> for Backend {
    fn from(value: CliBackend) -> Self {
        match value {
            CliBackend::Ona => Backend::Ona,
            CliBackend::Opennars => Backend::Opennars,
        }
    }
}

fn load_config(cli: &Cli) -> Result<BrocaConfig> {
    let mut config = match &cli.config {
        Some(path) => BrocaConfig::load(path)?,
        None => BrocaConfig::default(),
    };
    if let Some(snapshot) = &cli.snapshot {
        config.snapshot_path = snapshot.clone();
    }
    Ok(config)
}

fn spawn_reasoner(config: &BrocaConfig) -> Result<Box<dyn Reasoner>> {
    let timeouts = config.bridge_timeouts();
    let reasoner: Box<dyn Reasoner> = match config.backend {
        Backend::Ona => Box::new(OnaBridge::spawn(&config.nar_path, timeouts)?),
        Backend::Opennars => Box::new(OpenNarsBridge::spawn(&config.jar_path, timeouts)?),
    };
    Ok(reasoner)
}

fn make_world(env: &str, dimension: usize) -> Result<Box<dyn World>> {
    match env {
        "cyclic" => Ok(Box::new(CyclicWorld::standard())),
        "clustered" => Ok(Box::new(ClusteredWorld::standard(dimension, 1))),
        other => Err(miette::miette!(
            "unknown environment {other:?}; built-ins are \"cyclic\" and \"clustered\""
        )),
    }
}

fn run(mut config: BrocaConfig, env: &str) -> Result<()> {
    let mut world = make_world(env, config.dimension)?;
    // The built-in worlds dictate the embedding dimension.
    config.dimension = world.dimension();

    let reasoner = spawn_reasoner(&config)?;
    let mut agent = if config.snapshot_path.exists() {
        let snapshot = Snapshot::load(&config.snapshot_path)?;
        Agent::resume(&config, ActionMap::minigrid(), reasoner, &snapshot)?
    } else {
        tracing::info!("no snapshot found, starting with a fresh vocabulary");
        Agent::new(&config, ActionMap::minigrid(), reasoner)?
    };

    let result = (|| -> Result<()> {
        for episode in 1..=config.episodes {
            let outcome = agent.run_episode(world.as_mut())?;
            println!(
                "episode {episode}: {} steps, reward {:.1}, {} decided / {} babbled, \
                 {} symbols ({} novelty, {} retired), {} rules",
                outcome.steps,
                outcome.total_reward,
                outcome.decided,
                outcome.babbled,
                agent.mapper().len(),
                outcome.novelty_events,
                outcome.retired,
                outcome.derived.len(),
            );
            for rule in &outcome.derived {
                println!("  rule: <{}> =/> <{}> {}", rule.antecedent, rule.consequent, rule.truth);
            }
            agent.save_snapshot(&config.snapshot_path)?;
        }
        Ok(())
    })();

    // Deterministic release of the reasoner process on every exit path.
    agent.shutdown();
    result
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Run {
            backend,
            env,
            nar,
            jar,
            episodes,
        } => {
            config.backend = backend.into();
            if let Some(nar) = nar {
                config.nar_path = nar;
            }
            if let Some(jar) = jar {
                config.jar_path = jar;
            }
            if let Some(episodes) = episodes {
                config.episodes = episodes;
            }
            run(config, &env)?;
        }

        Commands::ExportSymbols => {
            let snapshot = Snapshot::load(&config.snapshot_path)?;
            let gas = broca::quantizer::GrowingGas::restore(&snapshot, snapshot.dimension)?;
            let mapper = broca::symbol::SymbolMapper::rebuild_from(&gas);
            let entries: Vec<_> = mapper.entries().collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).into_diagnostic()?
            );
        }

        Commands::SnapshotInfo => {
            let snapshot = Snapshot::load(&config.snapshot_path)?;
            println!("snapshot:   {}", config.snapshot_path.display());
            println!("dimension:  {}", snapshot.dimension);
            println!("nodes:      {}", snapshot.nodes.len());
            println!("next id:    {}", snapshot.next_id);
            println!("steps seen: {}", snapshot.step_counter);
            let edges: usize = snapshot.nodes.iter().map(|n| n.neighbor_ids.len()).sum();
            println!("edges:      {}", edges / 2);
        }

        Commands::InitConfig { path } => {
            config.save(&path)?;
            println!("wrote default config to {}", path.display());
        }
    }

    Ok(())
}
