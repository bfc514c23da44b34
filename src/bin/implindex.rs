//! Query the trait implementor tables of a rustdoc build.
//!
//! Loads every `trait.impl/**/trait.*.js` file under the doc root (or a saved
//! snapshot) into a registry keyed by crate, then prints what was asked for.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use implindex::{
    Format, GroupKey, ImplRegistry, ParseMode, TraitPath, find_doc_root, load_registry, render,
    snapshot, split_list,
};
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "IMPLINDEX_LOG";

#[derive(Parser, Debug)]
#[command(name = "implindex")]
#[command(about = "Index rustdoc trait implementor tables by crate")]
struct Cli {
    /// rustdoc output directory (contains trait.impl/)
    #[arg(long, value_name = "PATH", global = true)]
    doc_root: Option<PathBuf>,

    /// Load a snapshot written by `export` instead of parsing the doc root
    #[arg(long, value_name = "PATH", global = true, conflicts_with = "doc_root")]
    snapshot: Option<PathBuf>,

    /// Fail on the first malformed implementor entry instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print per-batch and per-crate counts
    Summary,
    /// List crates in load order
    Groups,
    /// Print the facts recorded for one or more crates
    Query {
        /// Crate names, comma- or space-separated
        #[arg(required = true)]
        groups: Vec<String>,
        /// Only facts for this trait path
        #[arg(long = "trait", value_name = "PATH")]
        trait_path: Option<String>,
        /// Collapse repeated listings of the same impl
        #[arg(long)]
        distinct: bool,
        #[arg(long, default_value = "text")]
        format: Format,
        /// Prefix for relative doc links in markdown output
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
    /// Print every implementor of a trait across crates
    Implementors {
        trait_path: String,
        #[arg(long, default_value = "text")]
        format: Format,
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
    /// Write the loaded registry as a JSON snapshot
    Export {
        #[arg(long, value_name = "PATH")]
        out: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let registry = load(&cli)?;

    match cli.command {
        Command::Summary => print_summary(&registry)?,
        Command::Groups => {
            for key in registry.groups() {
                println!("{key}");
            }
        }
        Command::Query {
            groups,
            trait_path,
            distinct,
            format,
            base_url,
        } => {
            let keys: Vec<GroupKey> = groups
                .iter()
                .flat_map(|raw| split_list(raw))
                .map(GroupKey)
                .collect();
            if keys.is_empty() {
                bail!("no crate names given");
            }
            let trait_path = trait_path.map(TraitPath);
            let mut facts = Vec::new();
            for key in &keys {
                let selected: Vec<_> = if distinct {
                    registry.distinct(key)
                } else {
                    registry.query(key).iter().collect()
                };
                if selected.is_empty() {
                    debug!(group = %key, "no facts recorded");
                }
                facts.extend(selected.into_iter().filter(|fact| {
                    trait_path
                        .as_ref()
                        .is_none_or(|t| &fact.trait_ref.path == t)
                }));
            }
            print!("{}", render::render(facts, format, base_url.as_deref())?);
        }
        Command::Implementors {
            trait_path,
            format,
            base_url,
        } => {
            let trait_path = TraitPath(trait_path);
            let facts = registry.implementors(&trait_path);
            print!("{}", render::render(facts, format, base_url.as_deref())?);
        }
        Command::Export { out } => snapshot::export(&registry, &out)?,
    }
    Ok(())
}

fn load(cli: &Cli) -> Result<ImplRegistry> {
    if let Some(path) = &cli.snapshot {
        return snapshot::import(path);
    }
    let doc_root = find_doc_root(cli.doc_root.as_deref())?;
    debug!(doc_root = %doc_root.display(), "resolved doc root");
    let mode = if cli.strict {
        ParseMode::Strict
    } else {
        ParseMode::Lenient
    };
    load_registry(&doc_root, mode)
}

fn print_summary(registry: &ImplRegistry) -> Result<()> {
    let groups: Vec<_> = registry
        .groups()
        .map(|key| {
            json!({
                "group": key,
                "facts": registry.query(key).len(),
                "traits": registry.traits_for(key),
            })
        })
        .collect();
    let summary = json!({
        "batches": registry.receipts(),
        "groups": groups,
        "facts": registry.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
