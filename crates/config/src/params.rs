use crate::{env::EnvManager, error::ConfigError};
use serde::{Deserialize, Serialize};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// Connection parameters for one database operation. Resolved fresh from
/// process-wide configuration on every call; callers may cache but nothing
/// here does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl ConnectionParams {
    /// Read connection parameters from the process environment
    /// (`PGHOST`, `PGPORT`, `PGDATABASE`, `PGUSER`, `PGPASSWORD`).
    pub fn resolve() -> Result<Self, ConfigError> {
        Self::resolve_from(&EnvManager::new())
    }

    pub fn resolve_from(env: &EnvManager) -> Result<Self, ConfigError> {
        let host = env.get("PGHOST").unwrap_or(DEFAULT_HOST).to_string();
        let port = match env.get("PGPORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid(format!("PGPORT is not a port number: {raw}")))?,
            None => DEFAULT_PORT,
        };
        let database = required(env, "PGDATABASE")?;
        let username = required(env, "PGUSER")?;
        // Empty password is legal (trust / peer auth).
        let password = env.get("PGPASSWORD").unwrap_or_default().to_string();

        Ok(ConnectionParams {
            host,
            port,
            database,
            username,
            password,
        })
    }
}

fn required(env: &EnvManager, key: &str) -> Result<String, ConfigError> {
    env.get(key)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}
