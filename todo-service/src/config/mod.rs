use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Connection string used when `MONGODB_URI` is unset outside production.
/// It names no real cluster; connecting with it always fails.
pub const PLACEHOLDER_MONGODB_URI: &str = "mongodb+srv://<username>:<password>@<cluster-name>.mongodb.net/<database-name>?retryWrites=true&w=majority";

#[derive(Debug, Clone, Deserialize)]
pub struct TodoConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub mongodb: MongoConfig,
    pub store: StoreConfig,
    pub environment: String,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    /// Used when the connection string does not name a database.
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Empty means any origin is allowed.
    pub allowed_origins: Vec<String>,
}

impl TodoConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let is_prod = matches!(environment.as_str(), "prod" | "production");

        let backend: StoreBackend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mongodb".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        Ok(TodoConfig {
            common: common_config,
            mongodb: MongoConfig {
                uri: get_env(
                    "MONGODB_URI",
                    Some(PLACEHOLDER_MONGODB_URI),
                    is_prod && backend == StoreBackend::Mongodb,
                )?,
                database: get_env("MONGODB_DATABASE", Some("todo_db"), false)?,
            },
            store: StoreConfig { backend },
            environment,
            cors: CorsConfig {
                allowed_origins: parse_origins(
                    &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
                ),
            },
        })
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::Mongodb),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .map(str::to_string)
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("MongoDB".parse::<StoreBackend>(), Ok(StoreBackend::Mongodb));
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn wildcard_origin_means_any() {
        assert!(parse_origins("*").is_empty());
        assert_eq!(
            parse_origins("http://localhost:3000, https://todo.example.com"),
            vec!["http://localhost:3000", "https://todo.example.com"]
        );
    }
}
