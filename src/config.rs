use crate::database::Database;
use crate::driver::ConnectionSpec;
use crate::error::{DbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub debug: Option<bool>,
}

/// Connection addressing, one of the two mutually exclusive modes.
#[derive(Debug, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// File-path-addressed embedded store
    Embedded { path: PathBuf },
    /// Host/port/credential-addressed networked store
    Networked {
        host: String,
        port: u16,
        username: String,
        password: String,
        database: String,
    },
}

impl Config {
    /// Resolves the parsed connection section to a `ConnectionSpec`.
    pub fn connection_spec(&self) -> ConnectionSpec {
        match &self.connection {
            ConnectionConfig::Embedded { path } => ConnectionSpec::Embedded { path: path.clone() },
            ConnectionConfig::Networked {
                host,
                port,
                username,
                password,
                database,
            } => ConnectionSpec::Networked {
                host: host.clone(),
                port: *port,
                username: username.clone(),
                password: password.clone(),
                database: database.clone(),
            },
        }
    }

    /// Builds an unconnected `Database` from this configuration.
    pub fn into_database(self) -> Database {
        let debug = self.debug.unwrap_or(false);
        Database::new(self.connection_spec()).with_debug(debug)
    }
}

/// Loads configuration from a TOML file at the given path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| DbError::Config(e.to_string()))?;
    toml::from_str(&content).map_err(|e| DbError::Config(e.to_string()))
}
