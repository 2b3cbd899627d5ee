use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const DEFAULT_TOKEN_TTL_HOURS: i64 = 168; // 7 days

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("WELLNESS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("WELLNESS_JWT_SECRET is unset or still a placeholder");
        }

        let db_path = lookup("WELLNESS_DB_PATH")
            .unwrap_or_else(|| "wellness.db".into())
            .into();
        let host = lookup("WELLNESS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("WELLNESS_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("WELLNESS_PORT must be a port number")?;
        let token_ttl_hours = match lookup("WELLNESS_TOKEN_TTL_HOURS") {
            Some(v) => v
                .parse()
                .context("WELLNESS_TOKEN_TTL_HOURS must be a whole number of hours")?,
            None => DEFAULT_TOKEN_TTL_HOURS,
        };
        if token_ttl_hours <= 0 {
            bail!("WELLNESS_TOKEN_TTL_HOURS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            token_ttl_hours,
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("WELLNESS_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("wellness.db"));
        assert_eq!(config.token_ttl(), chrono::Duration::hours(168));
        assert_eq!(config.addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        let placeholder = ("WELLNESS_JWT_SECRET", "dev-secret-change-me");
        assert!(Config::from_lookup(lookup(&[placeholder])).is_err());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let secret = ("WELLNESS_JWT_SECRET", "s3cret");
        let bad_port = ("WELLNESS_PORT", "http");
        let zero_ttl = ("WELLNESS_TOKEN_TTL_HOURS", "0");
        assert!(Config::from_lookup(lookup(&[secret, bad_port])).is_err());
        assert!(Config::from_lookup(lookup(&[secret, zero_ttl])).is_err());
    }
}
