//! hsk-study CLI
//!
//! Interactive flashcard drilling plus a few maintenance commands.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use hsk_algo::{diagnose_weights, ranked_probabilities, Drafter};

use hsk_study::catalog::{Catalog, CatalogProvider, PartitionKey, StudyMode};
use hsk_study::config::Config;
use hsk_study::logging;
use hsk_study::presenter::Presenter;
use hsk_study::session::{remembered_partition, StudySession};
use hsk_study::storage::{open_store, KeyValueStore, StoreBackend};
use hsk_study::weight_store::WeightStore;

/// HSK flashcards with weighted drafting
#[derive(Parser)]
#[command(name = "hsk-study")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drill HSK vocabulary, texts and Q&A dialogues")]
struct Cli {
    /// Catalog JSON file [env: HSK_DATA_PATH]
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Weight store location [env: HSK_STORE_PATH]
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Storage backend: json, sqlite or memory [env: HSK_STORE_BACKEND]
    #[arg(long, global = true)]
    backend: Option<StoreBackend>,

    /// Fixed RNG seed [env: HSK_SEED]
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Study interactively (default)
    Study {
        /// Level to study; defaults to the last one studied
        #[arg(long)]
        level: Option<String>,
        /// vocab, text or qna; defaults to the last one studied
        #[arg(long)]
        mode: Option<StudyMode>,
        /// Stop after this many reviewed cards
        #[arg(long)]
        rounds: Option<usize>,
    },

    /// Show weight diagnostics and the most likely next cards
    Stats {
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        mode: Option<StudyMode>,
        /// How many likely cards to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// List levels and item counts per mode
    Levels,

    /// Put every card of a partition back to the neutral weight
    Reset {
        #[arg(long)]
        level: String,
        #[arg(long)]
        mode: StudyMode,
    },
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(backend) = cli.backend {
        config.set_backend(backend);
    }
    if let Some(data) = cli.data {
        config.data_path = data;
    }
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let _log_guard = logging::init_tracing(&config.log_level);

    let catalog = Catalog::load(&config.data_path)
        .with_context(|| format!("failed to load catalog {}", config.data_path.display()))?;

    if let Some(parent) = config.store_path.parent() {
        if config.store_backend != StoreBackend::Memory && !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let store = open_store(config.store_backend, &config.store_path).with_context(|| {
        format!(
            "failed to open {} store at {}",
            config.store_backend,
            config.store_path.display()
        )
    })?;
    let weights = WeightStore::new(store);

    match cli.command.unwrap_or(Commands::Study {
        level: None,
        mode: None,
        rounds: None,
    }) {
        Commands::Study {
            level,
            mode,
            rounds,
        } => run_study(&config, catalog, weights, level, mode, rounds),
        Commands::Stats { level, mode, top } => run_stats(&config, &catalog, &weights, level, mode, top),
        Commands::Levels => {
            run_levels(&catalog);
            Ok(())
        }
        Commands::Reset { level, mode } => run_reset(&catalog, &weights, PartitionKey::new(level, mode)),
    }
}

/// Flags win piecewise over the remembered partition, which wins over config
fn resolve_partition<S: KeyValueStore>(
    config: &Config,
    weights: &WeightStore<S>,
    level: Option<String>,
    mode: Option<StudyMode>,
) -> PartitionKey {
    let remembered = remembered_partition(weights.store(), &config.default_partition());
    PartitionKey::new(
        level.unwrap_or(remembered.level),
        mode.unwrap_or(remembered.mode),
    )
}

fn run_study<S: KeyValueStore>(
    config: &Config,
    catalog: Catalog,
    weights: WeightStore<S>,
    level: Option<String>,
    mode: Option<StudyMode>,
    rounds: Option<usize>,
) -> anyhow::Result<()> {
    let partition = resolve_partition(config, &weights, level, mode);
    if !catalog.has_level(&partition.level) {
        tracing::warn!(level = %partition.level, "level not found in catalog");
    }

    let drafter = match config.seed {
        Some(seed) => Drafter::with_seed(seed),
        None => Drafter::new(),
    };
    let mut session = StudySession::new(catalog, weights, drafter);
    let summary = session.activate(partition)?;
    println!(
        "{} {} ({} items)",
        "Studying".green().bold(),
        summary.partition,
        summary.item_count
    );

    let stdin = io::stdin();
    let mut presenter = Presenter::new(stdin.lock(), io::stdout());
    let stats = presenter.run(&mut session, rounds)?;
    tracing::info!(
        rounds = stats.rounds,
        successes = stats.successes,
        failures = stats.failures,
        "study session finished"
    );
    Ok(())
}

fn run_stats<S: KeyValueStore>(
    config: &Config,
    catalog: &Catalog,
    weights: &WeightStore<S>,
    level: Option<String>,
    mode: Option<StudyMode>,
    top: usize,
) -> anyhow::Result<()> {
    let partition = resolve_partition(config, weights, level, mode);
    let valid: BTreeSet<String> = catalog.valid_keys(&partition);
    let (pool, stale) = weights.load_split(&partition, &valid)?;
    let diagnostics = diagnose_weights(&pool);

    println!("{}", format!("=== {} ===", partition).cyan().bold());
    println!("{}: {}", "Items".white().bold(), diagnostics.count);
    println!("{}: {}", "Stale persisted keys".white().bold(), stale.len());
    println!("{}: {:.4}", "Total weight".white().bold(), diagnostics.total);
    println!(
        "{}: {:.4} .. {:.4}",
        "Weight range".white().bold(),
        diagnostics.min_weight,
        diagnostics.max_weight
    );
    println!("{}: {}", "Missed (elevated)".white().bold(), diagnostics.elevated_count);
    println!("{}: {}", "Known (suppressed)".white().bold(), diagnostics.suppressed_count);
    if !diagnostics.is_healthy {
        println!("{}: {}", "Warning".yellow().bold(), diagnostics.message);
    }

    if pool.is_empty() {
        println!("{}", "Nothing to study here.".dimmed());
        return Ok(());
    }

    println!();
    println!("{}", "Most likely next:".yellow().bold());
    for (key, p) in ranked_probabilities(&pool, top) {
        let weight = pool.get(&key).unwrap_or_default();
        println!("  {:>6.2}%  w={:<8.4} {}", p * 100.0, weight, key);
    }
    Ok(())
}

fn run_levels(catalog: &Catalog) {
    println!("{}", "=== Levels ===".cyan().bold());
    for level in catalog.levels() {
        let counts: Vec<String> = StudyMode::ALL
            .iter()
            .map(|mode| {
                let count = catalog.item_count(&PartitionKey::new(level.clone(), *mode));
                format!("{mode}: {count}")
            })
            .collect();
        println!("{}  {}", level.white().bold(), counts.join("  "));
    }
}

fn run_reset<S: KeyValueStore>(
    catalog: &Catalog,
    weights: &WeightStore<S>,
    partition: PartitionKey,
) -> anyhow::Result<()> {
    if !catalog.has_level(&partition.level) {
        anyhow::bail!("unknown level `{}`", partition.level);
    }
    let valid = catalog.valid_keys(&partition);
    let reset = weights
        .reset(&partition, &valid)
        .with_context(|| format!("failed to reset {partition}"))?;
    println!(
        "{} {} ({} items at neutral weight)",
        "Reset".green().bold(),
        partition,
        reset.len()
    );
    Ok(())
}
