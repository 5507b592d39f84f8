use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{auth, sqlite};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub sqlite: sqlite::Settings,
    pub password: auth::Settings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    pub filter: String,
}

impl Settings {
    /// Layers: built-in defaults, `config/default.*`, `CLUBHUB_*` variables,
    /// then the plain `DATABASE_URL` / `API_PORT` variables.
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("sqlite.url", "sqlite://clubhub.db")?
            .set_default("sqlite.max_connections", 5)?
            .set_default("password.memory_kib", 19456)?
            .set_default("password.iterations", 2)?
            .set_default("password.parallelism", 1)?
            .set_default("log.filter", "info")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("CLUBHUB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("sqlite.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("server.port", std::env::var("API_PORT").ok())?
            .build()?
            .try_deserialize()
    }
}
