//! Configuration Module
//!
//! Handles policy bounds and server configuration loaded from environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CacheError, Result};
use crate::store::OpenFlag;

/// Default LRU bound used when none is configured.
pub const DEFAULT_MAXSIZE: u64 = 300;

/// Default TTL in seconds used when none is configured.
pub const DEFAULT_TIMEOUT: u64 = 300;

// == Limit ==
/// A policy bound: either the policy is disabled, or it is active with a
/// concrete value where `0` means unlimited (LRU) or never expire (TTL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Disabled,
    Bound(u64),
}

impl Limit {
    /// Returns the bound if the policy is active.
    pub fn bound(self) -> Option<u64> {
        match self {
            Limit::Disabled => None,
            Limit::Bound(n) => Some(n),
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Limit::Bound(_))
    }
}

impl From<Option<u64>> for Limit {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Limit::Disabled, Limit::Bound)
    }
}

impl FromStr for Limit {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" => Err(CacheError::InvalidConfig(
                "bound is missing; use a non-negative integer or 'disabled'".to_string(),
            )),
            "disabled" | "none" | "off" => Ok(Limit::Disabled),
            _ => s.parse::<u64>().map(Limit::Bound).map_err(|_| {
                CacheError::InvalidConfig(format!(
                    "'{}' is not a non-negative integer",
                    s
                ))
            }),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Disabled => f.write_str("disabled"),
            Limit::Bound(n) => write!(f, "{}", n),
        }
    }
}

/// Server configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the backing shelf file
    pub path: PathBuf,
    /// How the shelf file is opened
    pub flag: OpenFlag,
    /// LRU bound on the number of keys
    pub maxsize: Limit,
    /// Default TTL in seconds for new keys
    pub timeout: Limit,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_PATH` - Shelf file path (default: cache.db)
    /// - `CACHE_FLAG` - Open flag r/w/c/n (default: c)
    /// - `CACHE_MAXSIZE` - LRU bound or `disabled` (default: 300)
    /// - `CACHE_TIMEOUT` - Default TTL seconds or `disabled` (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    ///
    /// Unlike the port, a malformed bound is rejected rather than defaulted.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            path: lookup("CACHE_PATH").map(PathBuf::from).unwrap_or(defaults.path),
            flag: match lookup("CACHE_FLAG") {
                Some(v) => v.parse()?,
                None => defaults.flag,
            },
            maxsize: match lookup("CACHE_MAXSIZE") {
                Some(v) => v.parse()?,
                None => defaults.maxsize,
            },
            timeout: match lookup("CACHE_TIMEOUT") {
                Some(v) => v.parse()?,
                None => defaults.timeout,
            },
            server_port: lookup("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cache.db"),
            flag: OpenFlag::Create,
            maxsize: Limit::Bound(DEFAULT_MAXSIZE),
            timeout: Limit::Bound(DEFAULT_TIMEOUT),
            server_port: 3000,
        }
    }
}
