//! Server configuration loaded from the environment (and `.env`, if present).
//!
//! Every setting has a default, so the server starts with no configuration.

use std::{net::SocketAddr, path::PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address.
    /// Env: `PARTYLINE_ADDR`
    /// Default: `0.0.0.0:8080`
    pub addr: SocketAddr,

    /// Directory holding one SQLite database per room.
    /// Env: `PARTYLINE_DATA_DIR`
    /// Default: `./data`
    pub data_dir: PathBuf,

    /// Static assets served for paths outside the room prefix.
    /// Env: `PARTYLINE_ASSETS_DIR`
    /// Default: `./public`
    pub assets_dir: PathBuf,

    /// Frames a session may fall behind by before it starts skipping.
    /// Env: `PARTYLINE_CHANNEL_CAPACITY`
    /// Default: `256`
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: ([0, 0, 0, 0], 8080).into(),
            data_dir: PathBuf::from("./data"),
            assets_dir: PathBuf::from("./public"),
            channel_capacity: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unparseable values are
    /// logged and left at their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("PARTYLINE_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.addr = parsed,
                Err(err) => tracing::warn!(value = %addr, error = %err, "invalid PARTYLINE_ADDR, using default"),
            }
        }

        if let Some(dir) = lookup("PARTYLINE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("PARTYLINE_ASSETS_DIR") {
            config.assets_dir = PathBuf::from(dir);
        }

        if let Some(capacity) = lookup("PARTYLINE_CHANNEL_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(n) if n > 0 => config.channel_capacity = n,
                _ => tracing::warn!(value = %capacity, "invalid PARTYLINE_CHANNEL_CAPACITY, using default"),
            }
        }

        config
    }
}
