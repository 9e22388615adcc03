//! Identity resolution and minting.
//!
//! # Responsibility
//! - Recover a previously assigned identity through the ordered fallback
//!   chain: path-keyed row, then embedded token, then mint.
//! - Provide the shipped generator: per-install UUIDv7 namespace plus a
//!   persisted 32-bit counter, scrambled and base32-encoded to an opaque
//!   fixed-width string.
//!
//! # Invariants
//! - A recovered identity is never overwritten by a freshly minted one.
//! - Minting is the only path that creates identities.
//! - The counter advance is persisted before a minted identity is returned.

use crate::config::{Config, ConfigError};
use log::debug;
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug)]
pub enum IdentityError {
    /// The config carries no namespace to mint from.
    MissingNamespace,
    /// The configured namespace is not a parseable UUID.
    BadNamespace(String),
    /// The 32-bit mint counter is exhausted.
    CounterExhausted,
    Config(ConfigError),
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingNamespace => write!(f, "config has no identity namespace"),
            Self::BadNamespace(value) => {
                write!(f, "identity namespace `{value}` is not a valid uuid")
            }
            Self::CounterExhausted => write!(f, "identity counter is exhausted"),
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for IdentityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for IdentityError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Contract consumed by the reconciliation core: each call returns a fresh
/// globally-unique opaque string and advances the generator's persisted
/// state.
pub trait IdentityGenerator {
    fn mint(&mut self) -> IdentityResult<String>;
}

/// Outcome of the identity fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Reused from a path-keyed row or an embedded token.
    Recovered(String),
    /// Freshly minted; the only path that creates identities.
    Minted(String),
}

impl Resolution {
    pub fn id(&self) -> &str {
        match self {
            Self::Recovered(id) | Self::Minted(id) => id,
        }
    }

    pub fn into_id(self) -> String {
        match self {
            Self::Recovered(id) | Self::Minted(id) => id,
        }
    }
}

/// Recovers an entity identity, minting only when both recovery routes are
/// exhausted.
pub fn resolve_identity(
    row_id: Option<&str>,
    embedded: Option<&str>,
    generator: &mut dyn IdentityGenerator,
) -> IdentityResult<Resolution> {
    if let Some(id) = row_id {
        return Ok(Resolution::Recovered(id.to_string()));
    }
    if let Some(id) = embedded {
        return Ok(Resolution::Recovered(id.to_string()));
    }

    let id = generator.mint()?;
    debug!("event=identity_mint module=identity status=ok id={id}");
    Ok(Resolution::Minted(id))
}

/// Generator backed by the repository config: UUIDv7 namespace plus a
/// persisted counter, scrambled through a six-round Feistel network and
/// base32-encoded to 32 lowercase characters.
pub struct ConfigIdentityGenerator {
    root: PathBuf,
    config: Config,
}

impl ConfigIdentityGenerator {
    pub fn new(root: &Path, config: Config) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// The current config snapshot, counter advances included.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl IdentityGenerator for ConfigIdentityGenerator {
    fn mint(&mut self) -> IdentityResult<String> {
        let namespace = self
            .config
            .user_id
            .as_deref()
            .ok_or(IdentityError::MissingNamespace)?;
        let namespace = Uuid::parse_str(namespace)
            .map_err(|_| IdentityError::BadNamespace(namespace.to_string()))?;

        let id = base32_lower(&scramble160(namespace.as_u128(), self.config.counter));

        self.config.counter = self
            .config
            .counter
            .checked_add(1)
            .ok_or(IdentityError::CounterExhausted)?;
        self.config.save(&self.root)?;

        Ok(id)
    }
}

const MASK_80: u128 = (1 << 80) - 1;
const FEISTEL_DOMAIN: &[u8] = b"plainorg-feistel-160";
const FEISTEL_ROUNDS: u8 = 6;

/// Bijective scramble of the 160-bit `namespace << 32 | counter` value,
/// worked as two 80-bit halves.
fn scramble160(namespace: u128, counter: u32) -> [u8; 20] {
    let mut left = (namespace >> 48) & MASK_80;
    let mut right = (((namespace & ((1 << 48) - 1)) << 32) | u128::from(counter)) & MASK_80;

    for round in 1..=FEISTEL_ROUNDS {
        let mixed = (left ^ round_value(left, round)) & MASK_80;
        left = right;
        right = mixed;
    }

    let mut out = [0u8; 20];
    out[..10].copy_from_slice(&left.to_be_bytes()[6..]);
    out[10..].copy_from_slice(&right.to_be_bytes()[6..]);
    out
}

fn round_value(half: u128, round: u8) -> u128 {
    let mut hasher = Sha256::new();
    hasher.update(&half.to_be_bytes()[6..]);
    hasher.update(FEISTEL_DOMAIN);
    hasher.update([round]);
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes[6..].copy_from_slice(&digest[..10]);
    u128::from_be_bytes(bytes)
}

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Lowercase unpadded base32; 20 input bytes yield exactly 32 characters.
fn base32_lower(bytes: &[u8; 20]) -> String {
    let mut out = String::with_capacity(32);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = (buffer >> bits) & 0x1f;
            out.push(BASE32_ALPHABET[index as usize] as char);
        }
    }

    out
}
