use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(anyhow!("unknown store '{}'; expected 'postgres' or 'memory'", other)),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Postgres => f.write_str("postgres"),
            StoreKind::Memory => f.write_str("memory"),
        }
    }
}

pub struct Config {
    pub store: StoreKind,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Config {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store = match lookup("POLLVAULT_STORE") {
            None => StoreKind::Postgres,
            Some(v) => v.parse().context("POLLVAULT_STORE is invalid")?,
        };

        let database_url = lookup("POLLVAULT_DATABASE_URL");
        if store == StoreKind::Postgres && database_url.is_none() {
            bail!("expected POLLVAULT_DATABASE_URL");
        }

        let max_connections = match lookup("POLLVAULT_MAX_CONNECTIONS") {
            None => Self::DEFAULT_MAX_CONNECTIONS,
            Some(v) => v.trim().parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| anyhow!("POLLVAULT_MAX_CONNECTIONS must be a positive integer, got '{}'", v))?,
        };

        Ok(Self {
            store,
            database_url,
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn postgres_needs_a_url() {
        assert!(load(&[]).is_err());

        let config = load(&[("POLLVAULT_DATABASE_URL", "postgres://localhost/polls")]).unwrap();
        assert_eq!(config.store, StoreKind::Postgres);
        assert_eq!(config.max_connections, Config::DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn memory_store_needs_nothing_else() {
        let config = load(&[("POLLVAULT_STORE", "Memory"), ("POLLVAULT_MAX_CONNECTIONS", "12")]).unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.max_connections, 12);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(load(&[("POLLVAULT_STORE", "mongo")]).is_err());
        assert!(load(&[("POLLVAULT_STORE", "memory"), ("POLLVAULT_MAX_CONNECTIONS", "0")]).is_err());
    }
}
