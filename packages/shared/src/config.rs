use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rooms_table: String,
    pub matches_table: String,
    pub cases_table: String,
    pub profiles_table: String,
    pub queue_table: String,
    pub memberships_table: String,
    pub connections_table: String,
    pub jwt_secret: String,
    pub case_generator_url: Option<String>,
    pub websocket_endpoint: Option<String>,
    pub store_backend: StoreBackend,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Missing(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => {
                write!(f, "{} environment variable must be set", name)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let table = |name: &str, default: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::Missing("JWT_SECRET".to_string()))?;

        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("") | Some("dynamodb") => StoreBackend::DynamoDb,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "unknown STORE_BACKEND '{}'",
                    other
                )))
            }
        };

        Ok(AppConfig {
            rooms_table: table("ROOMS_TABLE", "rooms"),
            matches_table: table("MATCHES_TABLE", "matches"),
            cases_table: table("CASES_TABLE", "match-cases"),
            profiles_table: table("PROFILES_TABLE", "ranked-profiles"),
            queue_table: table("QUEUE_TABLE", "ranked-queue"),
            memberships_table: table("MEMBERSHIPS_TABLE", "memberships"),
            connections_table: table("CONNECTIONS_TABLE", "channel-connections"),
            jwt_secret,
            case_generator_url: lookup("CASE_GENERATOR_URL").filter(|value| !value.is_empty()),
            websocket_endpoint: lookup("WEBSOCKET_API_ENDPOINT").filter(|value| !value.is_empty()),
            store_backend,
        })
    }
}
