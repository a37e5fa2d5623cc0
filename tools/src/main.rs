mod repl;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use softkey_core::{Candidate, Config, Dictionary, HistoryStore, KeyBindingRegistry, Session};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "softkey")]
#[command(about = "On-screen keyboard input engine: catalog, suggestions and history")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Key binding definition (overrides the config)
    #[arg(long, global = true)]
    bindings: Option<PathBuf>,

    /// Word list or dictionary snapshot (overrides the config)
    #[arg(long, global = true)]
    dictionary: Option<PathBuf>,

    /// History file (overrides the config)
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog labels, or the symbols of one label
    Catalog {
        label: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show suggestions for a pending input
    Suggest {
        input: String,
        #[arg(long)]
        json: bool,
    },
    /// Interactive editing session
    Repl,
    /// Inspect or clear the input history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Convert a JSON word list into a dictionary snapshot
    Dict {
        /// JSON word list
        #[arg(short, long)]
        input: PathBuf,
        /// Snapshot to write
        #[arg(short, long, default_value = "dictionary.bin")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Print records, oldest first
    List,
    /// Remove every record and the history file
    Clear,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_toml(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(path) = &self.bindings {
            config.bindings_path = Some(path.clone());
        }
        if let Some(path) = &self.dictionary {
            config.dictionary_path = Some(path.clone());
        }
        if let Some(path) = &self.history {
            config.history_path = Some(path.clone());
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.load_config()?;

    match cli.command {
        Commands::Catalog { label, json } => run_catalog(&config, label.as_deref(), json),
        Commands::Suggest { input, json } => run_suggest(config, &input, json),
        Commands::Repl => repl::run(config),
        Commands::History { action } => run_history(&config, action),
        Commands::Dict { input, output } => run_dict(&config, &input, &output),
    }
}

fn load_registry(config: &Config) -> KeyBindingRegistry {
    match &config.bindings_path {
        Some(path) => {
            let outcome = KeyBindingRegistry::load(path, config.catalog_max_expansion);
            if let Some(err) = outcome.error {
                eprintln!("warning: {err}");
            }
            outcome.registry
        }
        None => KeyBindingRegistry::packaged_default(config.catalog_max_expansion),
    }
}

fn run_catalog(config: &Config, label: Option<&str>, json: bool) -> Result<()> {
    let registry = load_registry(config);
    let catalog = registry.catalog();

    match label {
        Some(label) => {
            let symbols = catalog
                .get(label)
                .with_context(|| format!("no catalog label '{label}'"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(symbols)?);
            } else {
                println!("{label} ({} symbols)", symbols.len());
                for row in symbols.chunks(16) {
                    println!("  {}", row.concat());
                }
            }
        }
        None => {
            if json {
                let labels: Vec<_> = catalog
                    .iter()
                    .map(|(label, symbols)| serde_json::json!({ "label": label, "count": symbols.len() }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&labels)?);
            } else {
                for key in registry.keys() {
                    let detail = match catalog.get(&key.label) {
                        Some(symbols) => format!("{} symbols", symbols.len()),
                        None => key.literal_text().to_string(),
                    };
                    println!("{:>4}  {:<8} {:<12} {}", key.key_no, key.kind.as_str(), key.label, detail);
                }
            }
        }
    }
    Ok(())
}

fn run_suggest(config: Config, input: &str, json: bool) -> Result<()> {
    let mut session = softkey_core::init(config)?;
    if !session.append(input, true) {
        anyhow::bail!("'{input}' does not fit in the memo");
    }
    let candidates = session.candidates();
    if json {
        println!("{}", serde_json::to_string_pretty(candidates)?);
    } else {
        print_candidates(candidates);
    }
    Ok(())
}

fn run_history(config: &Config, action: HistoryAction) -> Result<()> {
    let path = config
        .history_path
        .as_ref()
        .context("no history file configured (use --history or the config file)")?;
    let mut store = HistoryStore::load(path, config.history_max_count)?;

    match action {
        HistoryAction::List => {
            for record in store.records() {
                match &record.sub_key {
                    Some(key) => println!("{}\t{}", key, record.value),
                    None => println!("\t{}", record.value),
                }
            }
        }
        HistoryAction::Clear => {
            let removed = store.len();
            store.clear();
            println!("Removed {removed} records from {}", path.display());
        }
    }
    Ok(())
}

fn run_dict(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let dictionary = Dictionary::load_json(input, config.dictionary_cache_size)
        .with_context(|| format!("reading {}", input.display()))?;
    dictionary.save_bincode(output)?;
    println!("Wrote {} entries to {}", dictionary.len(), output.display());
    Ok(())
}

pub(crate) fn print_candidates(candidates: &[Candidate]) {
    for (i, c) in candidates.iter().enumerate() {
        if c.is_sentinel() {
            continue;
        }
        match &c.source_tag {
            Some(tag) => println!("  {i}. {}  [{tag}]", c.value),
            None => println!("  {i}. {}", c.value),
        }
    }
}

pub(crate) fn describe(session: &Session) -> String {
    let state = session.state();
    format!("{}[{}]", state.confirmed, state.pending).replace('\n', "⏎")
}
