use crate::{
    error::{GetDatabaseConnectionSnafu, MakeQuerySnafu, StoreError, TimeoutSnafu},
    storage::{BoundParam, QueryExecutor, RawRow, SqlValue},
};
use async_trait::async_trait;
use snafu::ResultExt;
use sqlx::{
    Column, Pool, Postgres, Row, TypeInfo, ValueRef,
    postgres::{PgArguments, PgRow},
    query::Query,
};
use std::time::Duration;

/// SQLSTATE sent when the server's `statement_timeout` cancels a statement.
const QUERY_CANCELED: &str = "57014";

/// Extra time the client waits past the server-side timeout before giving up
/// on the round trip.
const BACKSTOP_GRACE: Duration = Duration::from_secs(1);

/// Runs statements on a pooled Postgres connection held for a single call.
///
/// `statement_timeout` should match the one the pool's connections were
/// opened with (see [`crate::state::with_statement_timeout`]), so the server
/// cancels slow statements before the client backstop fires.
#[derive(Clone, Debug)]
pub struct PgExecutor {
    pool: Pool<Postgres>,
    statement_timeout: Duration,
}

impl PgExecutor {
    pub const fn new(pool: Pool<Postgres>, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    async fn run(&self, sql: &str, params: &[BoundParam]) -> Result<Vec<PgRow>, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context(GetDatabaseConnectionSnafu)?;

        // bound templates go through the per-connection statement cache,
        // raw text is prepared unnamed and thrown away
        let query = bind_all(sqlx::query(sql), params).persistent(!params.is_empty());
        query
            .fetch_all(&mut *conn)
            .await
            .map_err(|source| self.classify_failure(source))
    }

    fn classify_failure(&self, source: sqlx::Error) -> StoreError {
        match &source {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                TimeoutSnafu {
                    after: self.statement_timeout,
                }
                .build()
            }
            _ => StoreError::MakeQuery { source },
        }
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[BoundParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match *param {
            BoundParam::Int(n) => query.bind(n),
        };
    }
    query
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, sql: &str, params: &[BoundParam]) -> Result<Vec<RawRow>, StoreError> {
        let backstop = self.statement_timeout + BACKSTOP_GRACE;
        let rows = tokio::time::timeout(backstop, self.run(sql, params))
            .await
            .map_err(|_| {
                TimeoutSnafu {
                    after: self.statement_timeout,
                }
                .build()
            })??;

        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &PgRow) -> Result<RawRow, StoreError> {
    row.columns()
        .iter()
        .map(|column| decode_column(row, column.ordinal()))
        .collect::<Result<Vec<_>, _>>()
        .map(RawRow::new)
}

fn decode_column(row: &PgRow, index: usize) -> Result<SqlValue, StoreError> {
    let raw = row.try_get_raw(index).context(MakeQuerySnafu)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INT2" => SqlValue::Int(row.try_get::<i16, _>(index).context(MakeQuerySnafu)?.into()),
        "INT4" => SqlValue::Int(row.try_get::<i32, _>(index).context(MakeQuerySnafu)?.into()),
        "INT8" => SqlValue::Int(row.try_get::<i64, _>(index).context(MakeQuerySnafu)?),
        "BOOL" => SqlValue::Bool(row.try_get(index).context(MakeQuerySnafu)?),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" => {
            SqlValue::Text(row.try_get(index).context(MakeQuerySnafu)?)
        }
        _ => SqlValue::Other(type_name),
    };
    Ok(value)
}
