//! Service configuration read from the environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::persistence::SNAPSHOT_FILE;

/// Default listen address (all interfaces, port 3000).
const DEFAULT_LISTEN_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3000);

/// Environment variable holding the listen address.
pub const LISTEN_ADDR_VAR: &str = "BISECT_QUEUE_LISTEN_ADDR";

/// Environment variable holding the state directory.
pub const STATE_DIR_VAR: &str = "BISECT_QUEUE_STATE_DIR";

/// Configuration for the queue service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    ///
    /// Default: `0.0.0.0:3000`. Configure via `BISECT_QUEUE_LISTEN_ADDR`.
    pub listen_addr: SocketAddr,

    /// Directory holding the queue snapshot.
    ///
    /// When unset the queue lives only in memory. Configure via
    /// `BISECT_QUEUE_STATE_DIR`.
    pub state_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates a `ServerConfig` with default values.
    pub fn new() -> Self {
        ServerConfig {
            listen_addr: SocketAddr::from(DEFAULT_LISTEN_ADDR),
            state_dir: None,
        }
    }

    /// Creates a `ServerConfig` from environment variables.
    ///
    /// Unparseable or empty values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a `ServerConfig` from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::new();

        let listen_addr = lookup(LISTEN_ADDR_VAR)
            .and_then(|s| s.trim().parse::<SocketAddr>().ok())
            .unwrap_or(defaults.listen_addr);

        let state_dir = lookup(STATE_DIR_VAR)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        ServerConfig {
            listen_addr,
            state_dir,
        }
    }

    /// Path of the snapshot file, if persistence is enabled.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.state_dir.as_deref().map(snapshot_file_in)
    }
}

fn snapshot_file_in(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}
