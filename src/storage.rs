use crate::error::{
    ColumnCountSnafu, ColumnTypeSnafu, MappingError, OutOfRangeSnafu, StoreError,
    UnexpectedNullSnafu,
};
use async_trait::async_trait;
use snafu::ensure;

pub mod postgres;

/// A value bound to a `$n` placeholder, never spliced into statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundParam {
    Int(i64),
}

/// One column of a returned row, decoded from whatever the database sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Bool(bool),
    Text(String),
    /// A column type this service never reads, kept by name for error reports.
    Other(String),
}

impl SqlValue {
    pub fn type_name(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Int(_) => "integer".to_string(),
            Self::Bool(_) => "boolean".to_string(),
            Self::Text(_) => "text".to_string(),
            Self::Other(name) => name.clone(),
        }
    }
}

/// Ordered column values of a single row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    columns: Vec<SqlValue>,
}

impl RawRow {
    pub const fn new(columns: Vec<SqlValue>) -> Self {
        Self { columns }
    }

    pub fn expect_columns(&self, expected: usize) -> Result<(), MappingError> {
        ensure!(
            self.columns.len() == expected,
            ColumnCountSnafu {
                expected,
                found: self.columns.len(),
            }
        );
        Ok(())
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.columns.get(index), Some(SqlValue::Null))
    }

    /// Reads column `index` as `T`. Out-of-bounds reads are a column count error.
    pub fn scan<T: FromSqlValue>(&self, index: usize) -> Result<T, MappingError> {
        let value = self.columns.get(index).ok_or_else(|| {
            ColumnCountSnafu {
                expected: index + 1,
                found: self.columns.len(),
            }
            .build()
        })?;
        T::from_sql_value(index, value)
    }
}

pub trait FromSqlValue: Sized {
    const EXPECTED: &'static str;

    fn from_sql_value(index: usize, value: &SqlValue) -> Result<Self, MappingError>;
}

fn mismatch<T>(index: usize, expected: &'static str, value: &SqlValue) -> Result<T, MappingError> {
    match value {
        SqlValue::Null => UnexpectedNullSnafu { index, expected }.fail(),
        other => ColumnTypeSnafu {
            index,
            expected,
            found: other.type_name(),
        }
        .fail(),
    }
}

impl FromSqlValue for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_sql_value(index: usize, value: &SqlValue) -> Result<Self, MappingError> {
        match value {
            SqlValue::Int(n) => Ok(*n),
            other => mismatch(index, Self::EXPECTED, other),
        }
    }
}

impl FromSqlValue for i32 {
    const EXPECTED: &'static str = "integer";

    fn from_sql_value(index: usize, value: &SqlValue) -> Result<Self, MappingError> {
        let wide = i64::from_sql_value(index, value)?;
        Self::try_from(wide).map_err(|_| {
            OutOfRangeSnafu {
                index,
                value: wide,
                target: "i32",
            }
            .build()
        })
    }
}

impl FromSqlValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_sql_value(index: usize, value: &SqlValue) -> Result<Self, MappingError> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            other => mismatch(index, Self::EXPECTED, other),
        }
    }
}

impl FromSqlValue for String {
    const EXPECTED: &'static str = "text";

    fn from_sql_value(index: usize, value: &SqlValue) -> Result<Self, MappingError> {
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            other => mismatch(index, Self::EXPECTED, other),
        }
    }
}

/// The storage collaborator the lookup service runs statements against.
///
/// Implementations own connection handling: whatever they acquire for a call
/// must be released before `execute` returns, on success and on error alike.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[BoundParam]) -> Result<Vec<RawRow>, StoreError>;
}
