//! fxrack: multi-effect signal chain on the command line
//!
//! Usage:
//!   fxrack render <input> [-o out.wav]   - Render through the chain to WAV
//!   fxrack chain show|set|move|reset     - Manage the persisted chain order
//!   fxrack catalog [--json]              - List effects and parameters
//!   fxrack info <input>                  - Describe a source file
//!   fxrack play <input>                  - Live monitoring (`playback` feature)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use rack_core::{CATALOG, ChainOrder, Decibels, EffectKind, ParameterState, format_time};
use rack_offline::{RenderJob, load_source};
use rack_state::ChainStore;

#[cfg(feature = "playback")]
mod playback;

#[derive(Parser)]
#[command(name = "fxrack", version, about = "Multi-effect audio signal chain")]
struct Cli {
    /// Chain file to use instead of the platform default
    #[arg(long, global = true)]
    chain_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a source through the chain and export 16-bit WAV
    Render {
        input: PathBuf,
        /// Output file (default: Studio_Export_<millis>.wav in --dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for the default-named export
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        chain: ChainArgs,
    },
    /// Manage the persisted chain order
    Chain {
        #[command(subcommand)]
        action: ChainAction,
    },
    /// List effects and their parameters
    Catalog {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Describe a source file
    Info { input: PathBuf },
    /// Monitor a source live through the chain
    #[cfg(feature = "playback")]
    Play {
        input: PathBuf,
        #[command(flatten)]
        chain: ChainArgs,
    },
}

#[derive(Subcommand)]
enum ChainAction {
    /// Print the current order
    Show,
    /// Replace the order, e.g. `chain set reverb eq`
    Set { ids: Vec<String> },
    /// Move the unit at FROM to TO (zero-based)
    Move { from: usize, to: usize },
    /// Forget the persisted order
    Reset,
}

/// Chain and parameter overrides shared by render and play
#[derive(Args, Clone, Default)]
struct ChainArgs {
    /// Order for this run only, comma separated (e.g. `eq,delay`)
    #[arg(long, value_delimiter = ',')]
    order: Option<Vec<String>>,
    /// Parameter value, `effect.param=value` (repeatable)
    #[arg(long = "set", value_name = "EFFECT.PARAM=VALUE")]
    sets: Vec<String>,
    /// Bypass an effect (repeatable)
    #[arg(long)]
    bypass: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = cli
        .chain_file
        .map(ChainStore::new)
        .unwrap_or_else(ChainStore::at_default_path);

    match cli.command {
        Commands::Render {
            input,
            output,
            dir,
            chain,
        } => render(&store, &input, output.as_deref(), &dir, &chain),
        Commands::Chain { action } => chain_command(&store, action),
        Commands::Catalog { json } => catalog(json),
        Commands::Info { input } => info(&input),
        #[cfg(feature = "playback")]
        Commands::Play { input, chain } => {
            let (order, params) = resolve_chain(&store, &chain)?;
            playback::play(&input, order, params)
        }
    }
}

fn render(store: &ChainStore, input: &Path, output: Option<&Path>, dir: &Path, args: &ChainArgs) -> Result<()> {
    let (order, params) = resolve_chain(store, args)?;
    let source = load_source(input).with_context(|| format!("Failed to load source {}", input.display()))?;
    println!(
        "Rendering {} ({}) through {order}",
        input.display(),
        format_time(source.duration())
    );

    let file = RenderJob::new(Arc::new(source), &order, &params)
        .run()
        .context("Render failed")?;

    let path = match output {
        Some(path) => {
            file.write_to(path)?;
            path.to_path_buf()
        }
        None => file.save_in(dir)?,
    };
    println!("Exported {} ({} bytes)", path.display(), file.bytes.len());
    Ok(())
}

fn chain_command(store: &ChainStore, action: ChainAction) -> Result<()> {
    match action {
        ChainAction::Show => {}
        ChainAction::Set { ids } => {
            let order = strict_order(&ids)?;
            store.save(&order)?;
        }
        ChainAction::Move { from, to } => {
            let mut order = store.load();
            order.move_unit(from, to)?;
            store.save(&order)?;
        }
        ChainAction::Reset => {
            store.reset()?;
        }
    }
    println!("{}", store.load());
    Ok(())
}

fn catalog(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&CATALOG)?);
        return Ok(());
    }

    for effect in &CATALOG {
        println!("{} ({}) [{}]", effect.name, effect.id(), effect.icon);
        for p in effect.params {
            println!(
                "  {:<10} {:<7} {} .. {}  step {}  default {}",
                p.id,
                p.name,
                p.format_value(p.min),
                p.format_value(p.max),
                p.step,
                p.format_value(p.default)
            );
        }
    }
    Ok(())
}

fn info(input: &Path) -> Result<()> {
    let source = load_source(input).with_context(|| format!("Failed to load source {}", input.display()))?;
    println!("File:        {}", input.display());
    println!("Sample rate: {} Hz", source.sample_rate());
    println!("Frames:      {}", source.frames());
    println!("Duration:    {}", format_time(source.duration()));
    println!("Peak:        {:.1} dBFS", Decibels::from_gain(source.peak()).0);
    Ok(())
}

/// Persisted order (or `--order`) plus parameter overrides
fn resolve_chain(store: &ChainStore, args: &ChainArgs) -> Result<(ChainOrder, ParameterState)> {
    let order = match &args.order {
        Some(ids) => strict_order(ids)?,
        None => store.load(),
    };

    let mut params = ParameterState::new();
    for set in &args.sets {
        let (target, value) = set
            .split_once('=')
            .with_context(|| format!("expected EFFECT.PARAM=VALUE, got `{set}`"))?;
        let (effect, param) = target
            .split_once('.')
            .with_context(|| format!("expected EFFECT.PARAM, got `{target}`"))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("`{value}` is not a number"))?;
        let edit = params.set_by_id(effect, param, value)?;
        let stored = params.value(edit.kind, param)?;
        if stored != value {
            log::warn!("{effect}.{param} clamped to {stored}");
        }
    }
    for id in &args.bypass {
        let kind = EffectKind::from_id(id).with_context(|| format!("unknown effect `{id}`"))?;
        params.set_bypass(kind, true);
    }

    Ok((order, params))
}

/// Order from user input; unknown ids are an error here
fn strict_order(ids: &[String]) -> Result<ChainOrder> {
    let mut kinds = Vec::with_capacity(ids.len());
    for id in ids {
        match EffectKind::from_id(id.trim()) {
            Some(kind) => kinds.push(kind),
            None => bail!(
                "unknown effect `{id}` (known: {})",
                EffectKind::ALL.map(EffectKind::id).join(", ")
            ),
        }
    }
    Ok(ChainOrder::new(kinds)?)
}
