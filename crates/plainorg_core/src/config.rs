//! Repository configuration and user identity provider.
//!
//! # Responsibility
//! - Load and persist `.config.json` at the repository root.
//! - Supply the stable user tuple used for default `authour`/`assignees`
//!   values and as the identity-minting namespace.
//!
//! # Invariants
//! - `user_id` is minted once per install and never regenerated.
//! - `counter` only ever advances; it is persisted before a minted identity
//!   is handed out.

use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the per-repository configuration, relative to the root.
pub const CONFIG_FILE: &str = ".config.json";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "config file io failure: {err}"),
            Self::Json(err) => write!(f, "config file is not valid json: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Persistent per-repository user configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Date of birth as `YYYYMMDD`; part of the stable user tuple.
    #[serde(default)]
    pub dob: String,
    /// Per-install UUIDv7 namespace for identity minting.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Monotonic mint counter; 32-bit by contract with the id layout.
    #[serde(default)]
    pub counter: u32,
}

impl Config {
    /// Loads the config from `root`, creating it with a fresh namespace when
    /// it does not exist. A pre-existing file missing `user_id` has one
    /// minted and persisted.
    pub fn load_or_create(root: &Path) -> ConfigResult<Self> {
        let path = Self::path(root);
        let mut cfg = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Config>(&text)?
        } else {
            Config::default()
        };

        if cfg.user_id.is_none() {
            cfg.user_id = Some(Uuid::now_v7().to_string());
            cfg.save(root)?;
            info!("event=config_init module=config status=ok minted_namespace=true");
        }

        Ok(cfg)
    }

    /// Writes the config back to `root`.
    pub fn save(&self, root: &Path) -> ConfigResult<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::path(root), text)?;
        Ok(())
    }

    /// Path of the config file under `root`.
    pub fn path(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// User handle used as the default `authour` and `assignees` value.
    ///
    /// Whitespace-free by construction: inline metadata tokens are
    /// whitespace-delimited, so a value with spaces would not survive a
    /// rewrite round trip. Falls back to `anonymous` when no name is
    /// configured.
    pub fn user_handle(&self) -> String {
        let joined = format!("{}.{}", self.first_name.trim(), self.last_name.trim());
        let handle = joined
            .trim_matches('.')
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_");
        if handle.is_empty() {
            "anonymous".to_string()
        } else {
            handle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn user_handle_is_lowercase_and_whitespace_free() {
        let mut cfg = Config::default();
        assert_eq!(cfg.user_handle(), "anonymous");

        cfg.first_name = "Ada".to_string();
        assert_eq!(cfg.user_handle(), "ada");

        cfg.last_name = "Lovelace".to_string();
        assert_eq!(cfg.user_handle(), "ada.lovelace");

        cfg.first_name = "Mary Jane".to_string();
        assert_eq!(cfg.user_handle(), "mary_jane.lovelace");
    }

    #[test]
    fn load_or_create_mints_namespace_once() {
        let dir = tempfile::tempdir().unwrap();
        let first = Config::load_or_create(dir.path()).unwrap();
        let ns = first.user_id.clone().unwrap();
        assert!(!ns.is_empty());

        let second = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(second.user_id.as_deref(), Some(ns.as_str()));
    }
}
