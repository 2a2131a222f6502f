pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod skeleton;
pub mod subgraph;
pub mod util;

pub use error::IndexError;
pub use indexer::{CancelFlag, Checkpoint, Indexer, SourceFile};
