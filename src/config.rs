use std::{fmt, net::SocketAddr, path::Path};

use secrecy::{ExposeSecret, Secret};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::domain::ClientToken;

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;

/// Variables with a default, which an empty value also selects.
const DEFAULTED: [&str; 4] = [
    "DB_HOST",
    "DB_PORT",
    "DB_REQUIRE_SSL",
    "IGNORE_MISSING_MIGRATIONS",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("failed to read .env file")]
    DotEnv(#[from] dotenvy::Error),
}

/// Variables read from the process environment.
#[derive(serde::Deserialize)]
struct Env {
    #[serde(deserialize_with = "socket_addr_from_str")]
    server_address: SocketAddr,
    client_token: ClientToken,

    #[serde(default = "default_db_host")]
    db_host: String,
    #[serde(default = "default_db_port")]
    db_port: u16,
    db_user: String,
    db_password: Secret<String>,
    db_name: String,
    #[serde(default)]
    db_require_ssl: bool,

    #[serde(default)]
    ignore_missing_migrations: bool,
}

#[derive(Clone)]
pub struct Config {
    address: SocketAddr,
    client_token: ClientToken,
    database: PgConnectOptions,
    ignore_missing_migrations: bool,
}

impl Config {
    pub fn new(address: SocketAddr, client_token: ClientToken, database: PgConnectOptions) -> Self {
        Self {
            address,
            client_token,
            database,
            ignore_missing_migrations: false,
        }
    }

    /// Read the process environment. Variables it does not set are taken from `./.env`, if
    /// that file exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars_and_file(std::env::vars(), ".env")
    }

    fn from_vars_and_file<I>(vars: I, path: impl AsRef<Path>) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars: Vec<_> = vars.into_iter().collect();

        let file = match dotenvy::from_path_iter(path.as_ref()) {
            Ok(file) => file,
            Err(error) if error.not_found() => return Self::from_vars(vars),
            Err(error) => return Err(error.into()),
        };
        for entry in file {
            let (key, value) = entry?;
            if !vars.iter().any(|(set, _)| *set == key) {
                vars.push((key, value));
            }
        }

        Self::from_vars(vars)
    }

    fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars = vars
            .into_iter()
            .filter(|(key, value)| !(value.is_empty() && DEFAULTED.contains(&key.as_str())));
        let env: Env = envy::from_iter(vars)?;

        if env.client_token.is_blank() {
            return Err(ConfigError::Missing("CLIENT_TOKEN"));
        }
        for (name, value) in [
            ("DB_USER", env.db_user.as_str()),
            ("DB_PASSWORD", env.db_password.expose_secret().as_str()),
            ("DB_NAME", env.db_name.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(name));
            }
        }

        let ssl_mode = if env.db_require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        let database = PgConnectOptions::new()
            .host(&env.db_host)
            .port(env.db_port)
            .username(&env.db_user)
            .password(env.db_password.expose_secret())
            .database(&env.db_name)
            .ssl_mode(ssl_mode);

        Ok(Self {
            address: env.server_address,
            client_token: env.client_token,
            database,
            ignore_missing_migrations: env.ignore_missing_migrations,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn client_token(&self) -> &ClientToken {
        &self.client_token
    }

    pub fn database_options(&self) -> PgConnectOptions {
        self.database.clone()
    }

    pub fn ignore_missing_migrations(&self) -> bool {
        self.ignore_missing_migrations
    }

    /// The same configuration, pointed at another database on the same server.
    pub fn with_database(mut self, name: &str) -> Self {
        self.database = self.database.database(name);
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("address", &self.address)
            .field("client_token", &self.client_token)
            .field("ignore_missing_migrations", &self.ignore_missing_migrations)
            .finish_non_exhaustive()
    }
}

fn default_db_host() -> String {
    DEFAULT_DB_HOST.to_string()
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

fn socket_addr_from_str<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let address: String = serde::Deserialize::deserialize(deserializer)?;

    // `:8080` listens on every interface
    if let Some(port) = address.strip_prefix(':') {
        let port: u16 = port.parse().map_err(serde::de::Error::custom)?;
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    address.parse().map_err(serde::de::Error::custom)
}
