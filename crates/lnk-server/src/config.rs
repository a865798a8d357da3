use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lnk_protocol::ClientConfig;
use lnk_store::{PrimaryConfig, SyncMode, DEFAULT_MAX_PUT_ATTEMPTS, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Settings for one Lnk process, primary or replica.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub http_addr: SocketAddr,
    /// RPC listen address; `None` disables the RPC listener.
    pub rpc_addr: Option<SocketAddr>,
    /// Host name printed in the short links handed back by `/add`.
    pub hostname: String,
    /// Durable log of the primary store.
    pub log_path: PathBuf,
    /// RPC address of a primary. When set this process is a replica.
    pub master: Option<String>,
    pub queue_capacity: usize,
    pub max_put_attempts: usize,
    /// `fsync` after every log append.
    pub sync_every_write: bool,
    pub connect_timeout_ms: u64,
    pub call_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            rpc_addr: Some(SocketAddr::from(([127, 0, 0, 1], 8081))),
            hostname: "localhost:8080".into(),
            log_path: PathBuf::from("file/store.json"),
            master: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_put_attempts: DEFAULT_MAX_PUT_ATTEMPTS,
            sync_every_write: false,
            connect_timeout_ms: 5_000,
            call_timeout_ms: 10_000,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn is_replica(&self) -> bool {
        self.master.is_some()
    }

    pub fn role(&self) -> &'static str {
        if self.is_replica() {
            "replica"
        } else {
            "primary"
        }
    }

    pub fn primary_config(&self) -> PrimaryConfig {
        PrimaryConfig {
            log_path: Some(self.log_path.clone()),
            queue_capacity: self.queue_capacity,
            max_put_attempts: self.max_put_attempts,
            sync_mode: if self.sync_every_write {
                SyncMode::EveryWrite
            } else {
                SyncMode::OsDefault
            },
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }
}
