use crate::{
    config::{RuntimeConfiguration, SqlEcho},
    error::{AppResult, MigrateSnafu, OpenDatabaseSnafu},
    lookup::StudentLookupService,
    storage::{QueryExecutor, postgres::PgExecutor},
};
use snafu::ResultExt;
use sqlx::{
    Pool, Postgres,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use std::{ops::Deref, sync::Arc, time::Duration};

/// Has the server cancel any statement running longer than `timeout`, so a
/// slow query cannot keep its connection busy after the caller gave up.
pub fn with_statement_timeout(options: PgConnectOptions, timeout: Duration) -> PgConnectOptions {
    options.options([("statement_timeout", format!("{}ms", timeout.as_millis()))])
}

pub fn connect_options(config: &RuntimeConfiguration) -> AppResult<PgConnectOptions> {
    let options: PgConnectOptions = config
        .db_config()
        .get_db_path()
        .parse()
        .context(OpenDatabaseSnafu)?;
    Ok(with_statement_timeout(options, config.statement_timeout))
}

pub async fn open_pool(config: &RuntimeConfiguration) -> AppResult<Pool<Postgres>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connect_options(config)?)
        .await
        .context(OpenDatabaseSnafu)?;

    if config.run_migrations {
        sqlx::migrate!().run(&pool).await.context(MigrateSnafu)?;
        info!("migrations applied");
    }

    Ok(pool)
}

#[derive(Clone, Debug)]
pub struct AppState {
    lookup: StudentLookupService,
    sql_echo: SqlEcho,
}

impl AppState {
    pub fn new(executor: Arc<dyn QueryExecutor>, sql_echo: SqlEcho) -> Self {
        Self {
            lookup: StudentLookupService::new(executor),
            sql_echo,
        }
    }

    pub fn from_pool(pool: Pool<Postgres>, config: &RuntimeConfiguration) -> Self {
        let executor = PgExecutor::new(pool, config.statement_timeout);
        Self::new(Arc::new(executor), config.sql_echo)
    }

    pub const fn sql_echo(&self) -> SqlEcho {
        self.sql_echo
    }
}

impl Deref for AppState {
    type Target = StudentLookupService;

    fn deref(&self) -> &Self::Target {
        &self.lookup
    }
}
