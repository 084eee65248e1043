//! `ending-note` command-line tool.
//!
//! Works on family-tree export files: every command replays the file through
//! the validated graph operations, then reports on the resulting tree.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use ending_note_core::config::FamilyTreeConfig;
use ending_note_core::family_tree::{Bearer, FamilyTreeExport, FamilyTreeRegistry};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "ending-note")]
#[command(about = "Validate, resolve and query family-tree export files", long_about = None)]
#[command(version)]
struct Cli {
    /// User id recorded as the owner of imported trees
    #[arg(long, env = "ENDING_NOTE_OWNER", default_value = "cli")]
    owner: String,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import a file and print the import report; fails if anything was rejected
    Check {
        /// Export file, or `-` for stdin
        file: PathBuf,
        /// Do not fail on generation conflicts, only on rejected records
        #[arg(long)]
        allow_conflicts: bool,
    },

    /// Import a file and print the resolved tree with generation warnings
    Resolve {
        file: PathBuf,
    },

    /// Import a file and print it back as a fresh export envelope
    Normalize {
        file: PathBuf,
    },

    /// List relatives of a member, found by name
    Query {
        file: PathBuf,
        /// Member name as written in the file
        #[arg(long)]
        member: String,
        #[arg(long, value_enum)]
        relation: Relation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Relation {
    Parents,
    Children,
    Spouses,
    Siblings,
    Ancestors,
    Descendants,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ending_note_cli=info,ending_note_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = FamilyTreeConfig::from_env().context("invalid family tree configuration")?;
    let registry = FamilyTreeRegistry::new(config);
    let owner = Bearer::user(cli.owner.clone());

    match cli.command {
        Commands::Check {
            file,
            allow_conflicts,
        } => {
            let report = commands::import(&registry, &cli.owner, &file)?.1;
            print_json(&report, cli.pretty)?;
            if !report.rejected.is_empty() {
                bail!("{} record(s) rejected", report.rejected.len());
            }
            if !allow_conflicts && !report.warnings.is_empty() {
                bail!("{} generation conflict(s)", report.warnings.len());
            }
        }
        Commands::Resolve { file } => {
            let (tree_id, report) = commands::import(&registry, &cli.owner, &file)?;
            let resolved = commands::Resolved {
                tree: registry.snapshot(tree_id, &owner)?,
                warnings: report.warnings,
            };
            print_json(&resolved, cli.pretty)?;
        }
        Commands::Normalize { file } => {
            let (tree_id, _) = commands::import(&registry, &cli.owner, &file)?;
            let export: FamilyTreeExport = registry.export(tree_id, &owner)?;
            print_json(&export, cli.pretty)?;
        }
        Commands::Query {
            file,
            member,
            relation,
        } => {
            let (tree_id, _) = commands::import(&registry, &cli.owner, &file)?;
            let relatives = commands::query(&registry, tree_id, &owner, &member, relation)?;
            print_json(&relatives, cli.pretty)?;
        }
    }
    Ok(())
}
