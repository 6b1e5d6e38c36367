// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::access::{AccessSettings, AccessValues};
use crate::constants::{access, defaults};
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// What a single run of the binary does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Deploy,
    Destroy,
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deploy" => Ok(Action::Deploy),
            "destroy" => Ok(Action::Destroy),
            other => Err(anyhow!("unknown action {:?}, expected deploy or destroy", other)),
        }
    }
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Control-plane namespace of the fleet member on the management cluster
    pub namespace: String,
    pub action: Action,
    pub values: AccessValues,
    pub settings: AccessSettings,
    pub apply_max_attempts: u32,
    pub reconcile_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let namespace = lookup("NAMESPACE").context("NAMESPACE environment variable not set")?;
        let server = lookup("SERVER_IN_CLUSTER")
            .context("SERVER_IN_CLUSTER environment variable not set")?;

        let action = match lookup("ACTION") {
            Some(value) => value.parse()?,
            None => Action::Deploy,
        };

        let mut values = AccessValues::new(&server)
            .with_context(|| format!("invalid SERVER_IN_CLUSTER {:?}", server))?;
        values.probe_interval = Duration::from_secs(parse_or(
            &mut lookup,
            "PROBE_INTERVAL_SECS",
            defaults::PROBE_INTERVAL_SECS,
        )?);
        values.watch_duration = Duration::from_secs(parse_or(
            &mut lookup,
            "WATCH_DURATION_SECS",
            defaults::WATCH_DURATION_SECS,
        )?);

        let settings = AccessSettings {
            ca_secret_name: lookup("CA_SECRET_NAME").unwrap_or_else(|| access::CA_SECRET_NAME.to_string()),
            lease_namespace: lookup("LEASE_NAMESPACE")
                .unwrap_or_else(|| access::LEASE_NAMESPACE.to_string()),
            lease_lock_name: lookup("LEASE_LOCK_NAME").unwrap_or_else(|| access::PROBE_NAME.to_string()),
        };

        let apply_max_attempts = parse_or(&mut lookup, "APPLY_MAX_ATTEMPTS", defaults::APPLY_MAX_ATTEMPTS)?;
        if apply_max_attempts == 0 {
            bail!("APPLY_MAX_ATTEMPTS must be at least 1");
        }

        let reconcile_timeout = Duration::from_secs(parse_or(
            &mut lookup,
            "RECONCILE_TIMEOUT_SECS",
            defaults::RECONCILE_TIMEOUT_SECS,
        )?);

        Ok(Config {
            namespace,
            action,
            values,
            settings,
            apply_max_attempts,
            reconcile_timeout,
        })
    }
}

fn parse_or<F, T>(lookup: &mut F, key: &str, default: T) -> Result<T>
where
    F: FnMut(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{} has invalid value {:?}", key, value)),
        None => Ok(default),
    }
}
