//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables.

use crate::constants::{
    DEFAULT_BCRYPT_COST, DEFAULT_DATA_DIR, DEFAULT_MAX_FAILED_SIGN_INS, MAX_BCRYPT_COST,
    MIN_BCRYPT_COST,
};
use crate::dashboard::DashboardPolicy;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_STORE: &str = "FEMCARE_STORE";
pub const ENV_DATA_DIR: &str = "FEMCARE_DATA_DIR";
pub const ENV_BCRYPT_COST: &str = "FEMCARE_BCRYPT_COST";
pub const ENV_MAX_FAILED_SIGN_INS: &str = "FEMCARE_MAX_FAILED_SIGN_INS";
pub const ENV_DASHBOARD_POLICY: &str = "FEMCARE_DASHBOARD_POLICY";

/// Which [`DocumentStore`](crate::store::DocumentStore) implementation backs the services.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            other => Err(format!("expected 'memory' or 'file', got '{other}'")),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    store_backend: StoreBackend,
    bcrypt_cost: u32,
    max_failed_sign_ins: u32,
    dashboard_policy: DashboardPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`, validating the numeric settings.
    pub fn new(
        data_dir: PathBuf,
        store_backend: StoreBackend,
        bcrypt_cost: u32,
        max_failed_sign_ins: u32,
        dashboard_policy: DashboardPolicy,
    ) -> ConfigResult<Self> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                key: ENV_BCRYPT_COST,
                value: bcrypt_cost.to_string(),
                reason: format!("must be between {MIN_BCRYPT_COST} and {MAX_BCRYPT_COST}"),
            });
        }

        if max_failed_sign_ins == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_MAX_FAILED_SIGN_INS,
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            data_dir,
            store_backend,
            bcrypt_cost,
            max_failed_sign_ins,
            dashboard_policy,
        })
    }

    /// Resolve configuration from a key lookup, normally `std::env::var`.
    ///
    /// Absent or blank values fall back to defaults; present but unparsable values are errors.
    pub fn resolve<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = value_of(&lookup, ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let store_backend = parse_or(&lookup, ENV_STORE, StoreBackend::File)?;
        let bcrypt_cost = parse_or(&lookup, ENV_BCRYPT_COST, DEFAULT_BCRYPT_COST)?;
        let max_failed_sign_ins =
            parse_or(&lookup, ENV_MAX_FAILED_SIGN_INS, DEFAULT_MAX_FAILED_SIGN_INS)?;
        let dashboard_policy =
            parse_or(&lookup, ENV_DASHBOARD_POLICY, DashboardPolicy::default())?;

        Self::new(
            data_dir,
            store_backend,
            bcrypt_cost,
            max_failed_sign_ins,
            dashboard_policy,
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    pub fn max_failed_sign_ins(&self) -> u32 {
        self.max_failed_sign_ins
    }

    pub fn dashboard_policy(&self) -> DashboardPolicy {
        self.dashboard_policy
    }
}

fn value_of<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> ConfigResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value_of(lookup, key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value: raw,
        }),
    }
}
