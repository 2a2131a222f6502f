// Configuration module for symgraph
// Reads from environment variables with sensible defaults

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database read pool size (SYMGRAPH_POOL_SIZE)
    pub pool_size: u32,

    /// Database read pool minimum idle connections (SYMGRAPH_POOL_MIN_IDLE)
    pub pool_min_idle: u32,

    /// Depth cap for blast radius traversal (SYMGRAPH_BLAST_RADIUS_DEPTH)
    pub blast_radius_depth: usize,

    /// Downstream depth cap for function traces (SYMGRAPH_TRACE_DEPTH)
    pub trace_downstream_depth: usize,

    /// Upstream depth cap for function traces, unlimited when unset
    /// (SYMGRAPH_TRACE_UPSTREAM_DEPTH)
    pub trace_upstream_depth: Option<usize>,

    /// Contents larger than this are refused (SYMGRAPH_MAX_FILE_BYTES)
    pub max_file_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: 4,
            pool_min_idle: 1,
            blast_radius_depth: 5,
            trace_downstream_depth: 3,
            trace_upstream_depth: None,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();
        read_var("SYMGRAPH_POOL_SIZE", &mut config.pool_size);
        read_var("SYMGRAPH_POOL_MIN_IDLE", &mut config.pool_min_idle);
        read_var("SYMGRAPH_BLAST_RADIUS_DEPTH", &mut config.blast_radius_depth);
        read_var("SYMGRAPH_TRACE_DEPTH", &mut config.trace_downstream_depth);
        read_var("SYMGRAPH_MAX_FILE_BYTES", &mut config.max_file_bytes);
        if let Ok(val) = env::var("SYMGRAPH_TRACE_UPSTREAM_DEPTH") {
            match val.parse() {
                Ok(parsed) => config.trace_upstream_depth = Some(parsed),
                Err(_) => tracing::warn!(
                    "invalid SYMGRAPH_TRACE_UPSTREAM_DEPTH value: {val}, using unlimited"
                ),
            }
        }
        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

/// Overrides `slot` from the environment variable `name`, warning and
/// keeping the current value when it does not parse.
pub(crate) fn read_var<T>(name: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    apply_var(name, env::var(name).ok().as_deref(), slot);
}

fn apply_var<T>(name: &str, value: Option<&str>, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    let Some(val) = value else {
        return;
    };
    if let Ok(parsed) = val.parse() {
        *slot = parsed;
    } else {
        tracing::warn!("invalid {name} value: {val}, using default: {slot}");
    }
}
