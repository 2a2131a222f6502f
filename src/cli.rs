use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "symgraph",
    version,
    about = "Symbol and call graph indexer for JavaScript and TypeScript",
    after_help = r#"Examples:
  symgraph index --repo .
  symgraph symbols --name fetchUser
  symgraph context --id 42
  symgraph trace --id 42
  symgraph skeleton --refine
"#
)]
pub struct Args {
    /// Log at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Index every supported file under the repository.
    Index {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Print symbol, edge and file counts.
    Stats {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Look up symbols by name or by file.
    Symbols {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        name: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show a symbol with its direct neighbours.
    Context {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        id: i64,
    },
    /// Count transitive callers of a symbol.
    BlastRadius {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        id: i64,
    },
    /// Trace callers and callees of a symbol.
    Trace {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        id: i64,
        /// Downstream depth, overriding SYMGRAPH_TRACE_DEPTH.
        #[arg(long)]
        depth: Option<usize>,
        /// Upstream depth; unlimited unless set here or in the environment.
        #[arg(long)]
        upstream_depth: Option<usize>,
    },
    /// Print the folder/file architecture skeleton.
    Skeleton {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        /// Rebuild instead of reading the cached skeleton.
        #[arg(long)]
        refine: bool,
    },
    /// Dump all symbols, edges, files and domains as JSON.
    Export {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Delete everything from the index.
    Clear {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
}
