use crate::error::{
    AppResult, BadEnvVarSnafu, ParseBoolSnafu, ParseIntSnafu, UnknownEnvironmentSnafu,
};
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use std::{env::VarError, sync::Arc, time::Duration};

type EnvLookup<'a> = &'a dyn Fn(&'static str) -> Result<String, dotenvy::Error>;

fn optional(get: EnvLookup, name: &'static str) -> AppResult<Option<String>> {
    match get(name) {
        Ok(value) => Ok(Some(value)),
        Err(dotenvy::Error::EnvVar(VarError::NotPresent)) => Ok(None),
        Err(source) => Err(source).context(BadEnvVarSnafu { name }),
    }
}

fn required(get: EnvLookup, name: &'static str) -> AppResult<String> {
    get(name).context(BadEnvVarSnafu { name })
}

/// Whether error responses echo the SQL that was run (or the rejected input).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlEcho {
    Enabled,
    Disabled,
}

impl SqlEcho {
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl From<bool> for SqlEcho {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Local,
    Dev,
    Prod,
}

impl Environment {
    fn parse(found: &str) -> AppResult<Self> {
        match found {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            _ => UnknownEnvironmentSnafu { found }.fail(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    db_config: Arc<DbConfig>,
    pub server_ip: String,
    pub environment: Environment,
    pub sql_echo: SqlEcho,
    pub statement_timeout: Duration,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl RuntimeConfiguration {
    pub fn new() -> AppResult<Self> {
        Self::from_lookup(&|name| dotenvy::var(name))
    }

    fn from_lookup(get: EnvLookup) -> AppResult<Self> {
        let parse_bool = |name: &'static str, default: bool| -> AppResult<bool> {
            optional(get, name)?.map_or(Ok(default), |v| {
                v.parse().context(ParseBoolSnafu { name })
            })
        };
        let parse_u64 = |name: &'static str, default: u64| -> AppResult<u64> {
            optional(get, name)?.map_or(Ok(default), |v| {
                v.parse().context(ParseIntSnafu { name })
            })
        };

        Ok(Self {
            db_config: Arc::new(DbConfig::from_lookup(get)?),
            server_ip: optional(get, "SERVER_IP")?.unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            environment: Environment::parse(
                optional(get, "APP_ENV")?.as_deref().unwrap_or("local"),
            )?,
            sql_echo: parse_bool("ECHO_SQL", true)?.into(),
            statement_timeout: Duration::from_secs(parse_u64("STATEMENT_TIMEOUT_SECS", 30)?),
            max_connections: optional(get, "DB_MAX_CONNECTIONS")?.map_or(Ok(15), |v| {
                v.parse().context(ParseIntSnafu {
                    name: "DB_MAX_CONNECTIONS",
                })
            })?,
            run_migrations: parse_bool("RUN_MIGRATIONS", true)?,
        })
    }

    pub fn db_config(&self) -> Arc<DbConfig> {
        self.db_config.clone()
    }
}

#[derive(Debug)]
pub enum DbConfig {
    Url(SecretString),
    Parts {
        user: String,
        password: SecretString,
        path: String,
        port: u16,
        database: String,
    },
}

impl DbConfig {
    fn from_lookup(get: EnvLookup) -> AppResult<Self> {
        if let Some(url) = optional(get, "DATABASE_URL")? {
            return Ok(Self::Url(SecretString::from(url)));
        }

        Ok(Self::Parts {
            user: required(get, "DB_USER")?,
            password: SecretString::from(required(get, "DB_PASSWORD")?),
            path: required(get, "DB_PATH")?,
            port: required(get, "DB_PORT")?
                .parse()
                .context(ParseIntSnafu { name: "DB_PORT" })?,
            database: required(get, "DB_NAME")?,
        })
    }

    pub fn get_db_path(&self) -> String {
        match self {
            Self::Url(url) => url.expose_secret().to_string(),
            Self::Parts {
                user,
                password,
                path,
                port,
                database,
            } => format!(
                "postgres://{}:{}@{}:{}/{}",
                user,
                password.expose_secret(),
                path,
                port,
                database
            ),
        }
    }
}
