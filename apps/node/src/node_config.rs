use std::env;
use std::time::Duration;

use rolegate_application::RoleManagerSettings;
use rolegate_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

const DEFAULT_KEYSPACE: &str = "auth";
const DEFAULT_LEASE_SECONDS: u32 = 60;
const DEFAULT_AGREEMENT_POLL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct RoleManagerConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub keyspace: String,
    pub holder_id: String,
    pub lease_seconds: u32,
    pub agreement_poll_interval: Duration,
}

impl RoleManagerConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = optional_env("REDIS_URL");
        let keyspace =
            optional_env("ROLE_MANAGER_KEYSPACE").unwrap_or_else(|| DEFAULT_KEYSPACE.to_owned());
        let holder_id = optional_env("ROLE_MANAGER_HOLDER_ID")
            .unwrap_or_else(|| format!("node-{}", uuid::Uuid::new_v4()));
        let lease_seconds = parse_positive(
            "ROLE_MANAGER_LEASE_SECONDS",
            env::var("ROLE_MANAGER_LEASE_SECONDS").ok(),
            DEFAULT_LEASE_SECONDS,
        )?;
        let agreement_poll_ms = parse_positive(
            "ROLE_MANAGER_AGREEMENT_POLL_MS",
            env::var("ROLE_MANAGER_AGREEMENT_POLL_MS").ok(),
            DEFAULT_AGREEMENT_POLL_MS,
        )?;

        Ok(Self {
            database_url,
            redis_url,
            keyspace,
            holder_id,
            lease_seconds,
            agreement_poll_interval: Duration::from_millis(agreement_poll_ms),
        })
    }

    pub fn settings(&self) -> RoleManagerSettings {
        RoleManagerSettings {
            keyspace: self.keyspace.clone(),
            holder_id: self.holder_id.clone(),
            lease_seconds: self.lease_seconds,
        }
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_positive<T>(name: &str, raw: Option<String>, default: T) -> AppResult<T>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(value) = raw else {
        return Ok(default);
    };

    let parsed = value
        .trim()
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name} value '{value}': {error}")))?;
    if parsed == T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(parsed)
}
