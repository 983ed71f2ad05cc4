// SPDX-License-Identifier: Apache-2.0
// Copyright © 2025 Au-Zone Technologies. All Rights Reserved.

//! Layered run settings.
//!
//! Settings are assembled from, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `config.toml` in the platform config directory (e.g.
//!    `~/.config/komp-keys/config.toml` on Linux), or the file named by
//!    `KOMP_KEYS_CONFIG`
//! 3. `KOMP_KEYS_*` environment variables (`KOMP_KEYS_SERVER`,
//!    `KOMP_KEYS_PORT`, `KOMP_KEYS_USER`, `KOMP_KEYS_GROUP`,
//!    `KOMP_KEYS_SUDO`, `KOMP_KEYS_TIMEOUT`, `KOMP_KEYS_SUDO_TTL`)
//!
//! Command line flags override all of these.
//!
//! ```toml
//! server = "bhomero01lp.jax.org"
//! port = 4064
//! user = "mpk"
//! group = "KOMP_eye"
//! timeout = 30
//! ```

use crate::Error;
use ::config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use log::debug;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_SERVER: &str = "bhomero01lp.jax.org";
/// The repository's Ice port.  Set `port` when the JSON-RPC gateway listens
/// elsewhere.
pub const DEFAULT_PORT: u16 = 4064;
pub const DEFAULT_USER: &str = "mpk";
pub const DEFAULT_GROUP: &str = "KOMP_eye";

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV: &str = "KOMP_KEYS_CONFIG";

const ENV_PREFIX: &str = "KOMP_KEYS";

/// Connection defaults for a run.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Repository gateway hostname or URL.
    pub server: String,
    /// Repository gateway port.
    pub port: u16,
    /// User that will own the annotations.
    pub user: String,
    /// Group the targets live in.
    pub group: String,
    /// Administrator account to act through.
    #[serde(default)]
    pub sudo: Option<String>,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Elevated session lifetime in milliseconds.
    pub sudo_ttl: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            group: DEFAULT_GROUP.to_string(),
            sudo: None,
            timeout: 30,
            sudo_ttl: 600_000,
        }
    }
}

impl Settings {
    /// Load settings from the default file location and the environment.
    pub fn load() -> Result<Self, Error> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => default_path(),
        };
        Self::load_from(path.as_deref())
    }

    /// Load settings from `path` (if it exists) and the environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self, Error> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("server", defaults.server)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("user", defaults.user)?
            .set_default("group", defaults.group)?
            .set_default("timeout", i64::try_from(defaults.timeout).unwrap_or(i64::MAX))?
            .set_default("sudo_ttl", i64::try_from(defaults.sudo_ttl).unwrap_or(i64::MAX))?;

        if let Some(path) = path {
            debug!("Settings file {:?}", path);
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn sudo_ttl(&self) -> Duration {
        Duration::from_millis(self.sudo_ttl)
    }
}

/// `config.toml` in the platform config directory, when one can be found.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "jax", "komp-keys").map(|dirs| dirs.config_dir().join("config.toml"))
}
