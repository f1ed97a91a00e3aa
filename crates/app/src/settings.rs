//! Handles settings for the application. Configuration is written in
//! `settings.toml` and can be overridden with `SPLITLEDGER__SECTION__KEY`
//! environment variables.
//!
//! See `settings.toml` for the configuration.
use config::{Config, ConfigError, Environment, File};
use ledger::SharePolicy;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerSettings {
    pub op_timeout_ms: Option<u64>,
    #[serde(default)]
    pub share_policy: SharePolicy,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub app: App,
    pub server: Option<Server>,
    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("SPLITLEDGER").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let settings = parse("");
        assert_eq!(settings.app.level, "info");
        assert!(settings.server.is_none());
        assert_eq!(settings.ledger.share_policy, SharePolicy::Cumulative);
        assert!(settings.ledger.op_timeout_ms.is_none());
    }

    #[test]
    fn reads_server_and_ledger_sections() {
        let settings = parse(
            r#"
            [app]
            level = "debug"

            [server]
            port = 8080
            database = { sqlite = "./splitledger.db" }

            [ledger]
            op_timeout_ms = 1500
            share_policy = "per_batch"
            "#,
        );
        let server = settings.server.unwrap();
        assert_eq!(server.port, 8080);
        assert!(matches!(server.database, Database::Sqlite(ref p) if p == "./splitledger.db"));
        assert_eq!(settings.ledger.op_timeout_ms, Some(1500));
        assert_eq!(settings.ledger.share_policy, SharePolicy::PerBatch);
    }
}
