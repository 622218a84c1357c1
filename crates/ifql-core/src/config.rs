//! Engine configuration shared by the CLI and embedders.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard cap on bytes held in block builder caches. Exceeding it fails
    /// the query with a resource-exhausted error.
    pub mem_cap_bytes: usize,

    /// Upper bound on concurrently running source threads.
    pub max_source_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 512 * 1024 * 1024,
            max_source_threads: 8,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `IFQL_MEM_CAP_BYTES`: memory cap in bytes
    /// - `IFQL_MAX_SOURCE_THREADS`: max source threads
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("IFQL_MEM_CAP_BYTES") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.mem_cap_bytes = v;
            }
        }

        if let Ok(s) = std::env::var("IFQL_MAX_SOURCE_THREADS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_source_threads = v;
            }
        }

        cfg
    }
}
