use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::db::SqliteGateway;
use crate::error::GatewayError;
use crate::gateway::{Gateway, MemoryGateway};
use crate::remote::RemoteGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Keep everything in memory
    Memory,
    /// Local SQLite file
    Sqlite,
    /// REST record store
    Remote,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "taskboard", version)]
#[command(about = "Personal task board with categories and checklists", long_about = None)]
pub struct Config {
    /// Address the web interface listens on
    #[arg(long, env = "TASKBOARD_BIND", default_value = "0.0.0.0:5876")]
    pub bind: SocketAddr,

    /// Where tasks are persisted
    #[arg(long, env = "TASKBOARD_BACKEND", value_enum, default_value_t = Backend::Sqlite)]
    pub backend: Backend,

    /// SQLite database file (sqlite backend)
    #[arg(long, env = "TASKBOARD_DB", default_value = "taskboard.db")]
    pub db_path: PathBuf,

    /// Base URL of the record store (remote backend)
    #[arg(long, env = "TASKBOARD_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// API key sent to the record store
    #[arg(long, env = "TASKBOARD_REMOTE_KEY", hide_env_values = true)]
    pub remote_key: Option<String>,

    /// Per-request timeout for the record store
    #[arg(long, env = "TASKBOARD_REMOTE_TIMEOUT", default_value_t = 10)]
    pub remote_timeout_secs: u64,

    /// Skip creating starter categories on an empty board
    #[arg(long, env = "TASKBOARD_NO_SEED")]
    pub no_seed: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the remote backend needs --remote-url (or TASKBOARD_REMOTE_URL)")]
    MissingRemoteUrl,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl Config {
    pub fn open_gateway(&self) -> Result<Arc<dyn Gateway>, ConfigError> {
        let gateway: Arc<dyn Gateway> = match self.backend {
            Backend::Memory => Arc::new(MemoryGateway::new()),
            Backend::Sqlite => Arc::new(SqliteGateway::connect(&self.db_path)?),
            Backend::Remote => {
                let url = self
                    .remote_url
                    .clone()
                    .ok_or(ConfigError::MissingRemoteUrl)?;
                Arc::new(RemoteGateway::new(
                    url,
                    self.remote_key.clone(),
                    Duration::from_secs(self.remote_timeout_secs),
                )?)
            }
        };
        Ok(gateway)
    }

    pub fn seed_defaults(&self) -> bool {
        !self.no_seed
    }
}
