//! Runtime configuration.
//!
//! Every setting can be given on the command line or through the matching
//! `RANKSHELF_*` environment variable. Security settings live in
//! [`crate::api::SecurityConfig`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::rating::SelectionPolicy;

const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

/// Settings for [`crate::rating::RatingEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub selection: SelectionPolicy,
    /// Seed for the random selector. Ignored by deterministic policies.
    pub seed: Option<u64>,
    /// Idle sessions older than this are dropped when new sessions start.
    pub session_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            selection: SelectionPolicy::Random,
            seed: None,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct EngineArgs {
    /// How comparison candidates are picked
    #[arg(long, env = "RANKSHELF_SELECTION", value_enum, default_value_t = SelectionPolicy::Random)]
    pub selection: SelectionPolicy,

    /// Seed for random candidate selection
    #[arg(long, env = "RANKSHELF_SEED")]
    pub seed: Option<u64>,

    /// Seconds before an idle rating session is discarded
    #[arg(long, env = "RANKSHELF_SESSION_TTL", default_value_t = DEFAULT_SESSION_TTL_SECS)]
    pub session_ttl: u64,
}

impl From<EngineArgs> for EngineConfig {
    fn from(args: EngineArgs) -> Self {
        Self {
            selection: args.selection,
            seed: args.seed,
            session_ttl: Duration::from_secs(args.session_ttl),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// Path to the SQLite database (defaults to the platform data directory)
    #[arg(long, env = "RANKSHELF_DB")]
    pub database: Option<PathBuf>,
}
