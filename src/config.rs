//! Connection settings for the bulk loader
//!
//! Resolution order, later sources winning:
//! 1. built-in defaults (`localhost:5432`)
//! 2. an optional TOML file with the same keys
//! 3. `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`
//!    (a `.env` file in the working directory is loaded first)

use crate::error::{Result, SmelterError};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;
use std::path::Path;

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// `disable`, `prefer` or `require`
    pub ssl_mode: String,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            host: String::from("localhost"),
            port: 5432,
            name: None,
            user: None,
            password: None,
            ssl_mode: String::from("prefer"),
            connect_timeout_secs: 10,
        }
    }
}

// Keep the password out of logs
impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl DatabaseSettings {
    /// Load settings from `.env`, the optional TOML file and `DB_*` variables
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::figment(config_file)
            .extract()
            .map_err(|e| SmelterError::Config(e.to_string()))
    }

    fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(DatabaseSettings::default()));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("DB_"))
    }

    /// Connection descriptor; database name and user are required
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| {
                SmelterError::Config(String::from("database name is not set (DB_NAME)"))
            })?;
        let user = self
            .user
            .as_deref()
            .ok_or_else(|| {
                SmelterError::Config(String::from("database user is not set (DB_USER)"))
            })?;

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(name)
            .username(user)
            .ssl_mode(Self::parse_ssl_mode(&self.ssl_mode)?);
        if let Some(password) = self.password.as_deref() {
            options = options.password(password);
        }
        Ok(options)
    }

    fn parse_ssl_mode(mode: &str) -> Result<PgSslMode> {
        match mode.to_ascii_lowercase().as_str() {
            "disable" => Ok(PgSslMode::Disable),
            "allow" => Ok(PgSslMode::Allow),
            "prefer" => Ok(PgSslMode::Prefer),
            "require" => Ok(PgSslMode::Require),
            "verify-ca" => Ok(PgSslMode::VerifyCa),
            "verify-full" => Ok(PgSslMode::VerifyFull),
            other => Err(SmelterError::Config(format!("unknown ssl mode '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let settings: DatabaseSettings = DatabaseSettings::figment(None).extract()?;
            assert_eq!(settings.host, "localhost");
            assert_eq!(settings.port, 5432);
            assert!(settings.name.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "smelter.toml",
                r#"
                host = "db.internal"
                port = 6543
                name = "analytics"
                user = "loader"
                "#,
            )?;
            jail.set_env("DB_PORT", "5433");
            jail.set_env("DB_PASSWORD", "secret");

            let settings: DatabaseSettings =
                DatabaseSettings::figment(Some(Path::new("smelter.toml"))).extract()?;
            assert_eq!(settings.host, "db.internal");
            assert_eq!(settings.port, 5433);
            assert_eq!(settings.name.as_deref(), Some("analytics"));
            assert_eq!(settings.password.as_deref(), Some("secret"));
            Ok(())
        });
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = DatabaseSettings {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_connect_options_require_name_and_user() {
        let settings = DatabaseSettings::default();
        assert!(matches!(settings.connect_options(), Err(SmelterError::Config(_))));

        let settings = DatabaseSettings {
            name: Some("analytics".into()),
            user: Some("loader".into()),
            ..Default::default()
        };
        assert!(settings.connect_options().is_ok());
    }

    #[test]
    fn test_rejects_unknown_ssl_mode() {
        let settings = DatabaseSettings {
            name: Some("analytics".into()),
            user: Some("loader".into()),
            ssl_mode: "sometimes".into(),
            ..Default::default()
        };
        assert!(settings.connect_options().is_err());
    }
}
