//! Dassie CLI
//!
//! - `dassie build FILE.nt`: full rebuild of the term database from an LCSH
//!   N-Triples dump (terms, narrower links, topmost roots, indexes).
//! - `dassie rederive`: rerun the narrower and topmost passes in place.
//! - `dassie query`: describe / find / trace / summarize / outline.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dassie_hierarchy::{
    build_streaming, build_two_pass, derive_narrower, derive_narrower_parallel, resolve_topmost,
    HierarchyError,
};
use dassie_ingest_rdf::{IngestError, NTriples};
use dassie_store::{DbInfo, StoreError, TermDb, TermStore};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod query;
mod render;

use config::DassieConfig;
use query::{QueryArgs, QueryError};

#[derive(Parser)]
#[command(name = "dassie")]
#[command(
    author,
    version,
    about = "Dassie: build and query a Library of Congress Subject Headings database"
)]
struct Cli {
    /// Database directory
    #[arg(long, global = true, env = "DASSIE_DB")]
    db: Option<PathBuf>,

    /// JSON config file (db, build, traversal sections)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Do not color-code the output
    #[arg(short = 'x', long, global = true)]
    no_color: bool,

    /// More log output on stderr (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a fresh database from an LCSH N-Triples file.
    ///
    /// Replaces whatever is in the database directory.
    Build {
        /// Input `.nt` file
        input: PathBuf,
        /// Read the file twice so triple order does not matter
        #[arg(long)]
        two_pass: bool,
        /// Derive narrower links on all cores
        #[arg(long)]
        parallel: bool,
        /// Issue date of the LCSH dump (shown by `query --summarize`)
        #[arg(long)]
        issued: Option<String>,
    },

    /// Recompute narrower links and topmost roots of an existing database.
    Rederive {
        #[arg(long)]
        parallel: bool,
    },

    /// Query the database.
    Query(QueryArgs),
}

/// Default log filter: pass progress from the hierarchy crate is always
/// shown; `-v` / `-vv` open up everything else.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,dassie_hierarchy=info",
        1 => "info",
        _ => "debug",
    }
}

fn init_tracing(verbose: u8, no_color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color && std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }
    init_tracing(cli.verbose, cli.no_color);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (category, code) = categorize(&err);
            eprintln!("{} {:#}", format!("{category}:").red().bold(), err);
            ExitCode::from(code)
        }
    }
}

/// User-facing category and exit status for a failure.
fn categorize(err: &anyhow::Error) -> (&'static str, u8) {
    if err.downcast_ref::<QueryError>().is_some() {
        return ("usage error", 2);
    }
    let store_error = err.downcast_ref::<StoreError>().or_else(|| {
        match err.downcast_ref::<HierarchyError>() {
            Some(HierarchyError::Store(e)) => Some(e),
            _ => None,
        }
    });
    match store_error {
        Some(StoreError::Unreachable { .. }) => return ("database unreachable", 3),
        Some(StoreError::Unavailable { .. }) => return ("database unavailable", 3),
        Some(StoreError::MissingTerm(_)) => return ("missing term", 4),
        _ => {}
    }
    if let Some(e) = err.downcast_ref::<HierarchyError>() {
        if e.is_missing_term() {
            return ("missing term", 4);
        }
        if e.is_structural() {
            return ("hierarchy error", 5);
        }
        if matches!(e, HierarchyError::Ingest(_)) {
            return ("input error", 6);
        }
    }
    if err.downcast_ref::<IngestError>().is_some() {
        return ("input error", 6);
    }
    ("error", 1)
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => DassieConfig::load(path)?,
        None => DassieConfig::default(),
    };
    let db_dir = config.db_dir(cli.db.as_deref());

    match cli.command {
        Commands::Build {
            input,
            two_pass,
            parallel,
            issued,
        } => {
            println!("{} {}", "Building".green().bold(), db_dir.display());
            let db = TermDb::create(&db_dir)?;
            let report = if two_pass {
                build_two_pass(&db, || NTriples::open(&input), &config.build)?
            } else {
                build_streaming(&db, NTriples::open(&input)?, &config.build)?
            };
            db.checkpoint()?;
            println!(
                "  {} {} triples, {} terms, {} skipped",
                "→".yellow(),
                render::intcomma(report.triples as usize),
                render::intcomma(report.terms_created as usize),
                render::intcomma(report.skipped() as usize)
            );

            rederive(&db, parallel, &config)?;
            db.ensure_indexes()?;
            db.set_info(DbInfo {
                source: input.display().to_string(),
                issued,
                built_at: Utc::now(),
            })?;
            db.checkpoint()?;
            println!("{} {}", "wrote".green().bold(), db_dir.display().to_string().bold());
        }

        Commands::Rederive { parallel } => {
            let db = TermDb::open(&db_dir)?;
            rederive(&db, parallel, &config)?;
            db.checkpoint()?;
            println!("{} {}", "updated".green().bold(), db_dir.display().to_string().bold());
        }

        Commands::Query(args) => {
            // Usage errors win over a missing database.
            args.validate()?;
            let db = TermDb::open(&db_dir)?;
            let output = query::run(&db, &args, config.traversal)?;
            print!("{}", output.text);
            if !output.missing.is_empty() {
                return Err(HierarchyError::MissingTerm(output.missing.join(", ")).into());
            }
        }
    }
    Ok(())
}

/// Narrower links, then topmost roots. Strictly in that order.
fn rederive(db: &TermDb, parallel: bool, config: &DassieConfig) -> Result<()> {
    let narrower = if parallel {
        derive_narrower_parallel(db, config.traversal)?
    } else {
        derive_narrower(db, config.traversal)?
    };
    println!(
        "  {} {} narrower links from {} terms",
        "→".yellow(),
        render::intcomma(narrower.links),
        render::intcomma(narrower.children)
    );

    let topmost = resolve_topmost(db, config.traversal)?;
    println!(
        "  {} {} roots, {} terms resolved",
        "→".yellow(),
        render::intcomma(topmost.roots),
        render::intcomma(topmost.resolved)
    );
    info!(?narrower, ?topmost, "derived relations");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_errors_are_hierarchy_errors() {
        let dangling = anyhow::Error::from(HierarchyError::DanglingReference {
            child: "sh2".to_string(),
            parent: "sh404".to_string(),
        });
        assert_eq!(categorize(&dangling), ("hierarchy error", 5));

        let cycle = anyhow::Error::from(HierarchyError::Cycle {
            chain: vec!["sh1".to_string(), "sh1".to_string()],
        });
        assert_eq!(categorize(&cycle), ("hierarchy error", 5));
    }

    #[test]
    fn test_lookup_and_store_errors() {
        let missing = anyhow::Error::from(HierarchyError::MissingTerm("sh9".to_string()));
        assert_eq!(categorize(&missing), ("missing term", 4));

        let unreachable = anyhow::Error::from(StoreError::Unreachable {
            path: PathBuf::from("nowhere"),
            reason: "no such directory".to_string(),
        });
        assert_eq!(categorize(&unreachable), ("database unreachable", 3));

        let usage = anyhow::Error::from(QueryError::NoAction);
        assert_eq!(categorize(&usage), ("usage error", 2));
    }

    #[test]
    fn test_default_filter_keeps_pass_progress() {
        assert!(default_filter(0).contains("dassie_hierarchy=info"));
        assert_eq!(default_filter(2), "debug");
    }
}
