use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use symgraph::indexer::scan::{self, ScanOptions};
use symgraph::{Indexer, SourceFile, cli, logging};

fn default_db_path(repo: &Path) -> PathBuf {
    repo.join(scan::STATE_DIR).join("graph.sqlite")
}

fn open(repo: &Path, db: Option<PathBuf>) -> Result<Indexer> {
    let db_path = db.unwrap_or_else(|| default_db_path(repo));
    Indexer::open(&db_path)
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = cli::Args::parse();
    logging::init(args.verbose)?;

    match args.command {
        cli::Command::Index {
            repo,
            db,
            no_ignore,
        } => {
            let mut indexer = open(&repo, db)?;
            let scanned = scan::scan_repo_with_options(&repo, ScanOptions::new(no_ignore))?;
            let mut files = Vec::with_capacity(scanned.len());
            for file in &scanned {
                match SourceFile::read(&file.abs_path) {
                    Ok(source) => files.push(source),
                    Err(err) => tracing::warn!("skipping {}: {err:#}", file.path),
                }
            }

            let present: HashSet<&str> = scanned.iter().map(|f| f.path.as_str()).collect();
            let mut removed = 0;
            for record in indexer.db().list_files()? {
                if !present.contains(record.path.as_str()) && indexer.remove_file(&record.path)? {
                    removed += 1;
                }
            }
            if removed > 0 {
                tracing::info!("removed {removed} files that no longer exist");
            }

            let stats = indexer.index_batch(&files)?;
            print(&json!({ "stats": stats, "removed_files": removed }))
        }
        cli::Command::Stats { repo, db } => print(&open(&repo, db)?.stats()?),
        cli::Command::Symbols {
            repo,
            db,
            name,
            file,
        } => {
            let indexer = open(&repo, db)?;
            let symbols = match (name, file) {
                (Some(name), _) => indexer.query_symbols_by_name(&name)?,
                (None, Some(file)) => {
                    let path = if file.is_absolute() { file } else { repo.join(file) };
                    let path = std::fs::canonicalize(&path).unwrap_or(path);
                    indexer.query_symbols_by_file(&path.to_string_lossy())?
                }
                (None, None) => Vec::new(),
            };
            print(&symbols)
        }
        cli::Command::Context { repo, db, id } => {
            let indexer = open(&repo, db)?;
            match indexer.symbol_context(id)? {
                Some(context) => print(&context),
                None => anyhow::bail!("no symbol with id {id}"),
            }
        }
        cli::Command::BlastRadius { repo, db, id } => {
            let indexer = open(&repo, db)?;
            print(&json!({ "symbol_id": id, "blast_radius": indexer.blast_radius(id)? }))
        }
        cli::Command::Trace {
            repo,
            db,
            id,
            depth,
            upstream_depth,
        } => {
            let indexer = open(&repo, db)?;
            let config = symgraph::config::Config::get();
            let trace = indexer.function_trace_with_depth(
                id,
                depth.unwrap_or(config.trace_downstream_depth),
                upstream_depth.or(config.trace_upstream_depth),
            )?;
            print(&trace)
        }
        cli::Command::Skeleton { repo, db, refine } => {
            print(&open(&repo, db)?.architecture_skeleton(refine)?)
        }
        cli::Command::Export { repo, db } => print(&open(&repo, db)?.export_graph()?),
        cli::Command::Clear { repo, db } => {
            open(&repo, db)?.clear_index()?;
            print(&json!({ "cleared": true }))
        }
    }
}
