use crate::config::SqlEcho;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use snafu::Snafu;
use std::{fmt::Write, num::ParseIntError, str::ParseBoolError, time::Duration};

pub type AppResult<T> = Result<T, AppError>;
pub type LookupResult<T> = Result<T, LookupError>;

/// Bootstrap failures: configuration, database setup and serving.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error migrating DB schema"))]
    MigrateError { source: sqlx::migrate::MigrateError },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse `{}` as an integer", name))]
    ParseInt {
        source: ParseIntError,
        name: &'static str,
    },
    #[snafu(display("Unable to parse `{}` as a boolean", name))]
    ParseBool {
        source: ParseBoolError,
        name: &'static str,
    },
    #[snafu(display("Unknown environment {:?}, expected one of local, dev, prod", found))]
    UnknownEnvironment { found: String },
    #[snafu(display("Unable to set up tracing"))]
    Tracing {
        source: tracing::subscriber::SetGlobalDefaultError,
    },
    #[snafu(display("Unable to listen on {}", addr))]
    Bind {
        source: std::io::Error,
        addr: String,
    },
    #[snafu(display("Error serving app"))]
    Serve { source: std::io::Error },
}

/// Failures of the storage collaborator while running a statement.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery { source: sqlx::Error },
    #[snafu(display("Statement did not finish within {:?}", after))]
    Timeout { after: Duration },
}

/// A returned row does not have the shape the caller assumed.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum MappingError {
    #[snafu(display("Expected {} columns, row has {}", expected, found))]
    ColumnCount { expected: usize, found: usize },
    #[snafu(display("Column {} is {}, expected {}", index, found, expected))]
    ColumnType {
        index: usize,
        expected: &'static str,
        found: String,
    },
    #[snafu(display("Column {} is NULL, expected {}", index, expected))]
    UnexpectedNull { index: usize, expected: &'static str },
    #[snafu(display("Column {} value {} does not fit in {}", index, value, target))]
    OutOfRange {
        index: usize,
        value: i64,
        target: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupErrorKind {
    InvalidInput,
    Execution,
    Mapping,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LookupError {
    #[snafu(display("Invalid student id {:?}", raw))]
    InvalidInput { source: ParseIntError, raw: String },
    #[snafu(display("Error executing statement"))]
    Execution { source: StoreError, sql: String },
    #[snafu(display("Error mapping row {}", row))]
    Mapping {
        source: MappingError,
        row: usize,
        sql: String,
    },
}

impl LookupError {
    pub const fn kind(&self) -> LookupErrorKind {
        match self {
            Self::InvalidInput { .. } => LookupErrorKind::InvalidInput,
            Self::Execution { .. } => LookupErrorKind::Execution,
            Self::Mapping { .. } => LookupErrorKind::Mapping,
        }
    }

    /// The statement that reached storage, if any did.
    pub fn executed_sql(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { .. } => None,
            Self::Execution { sql, .. } | Self::Mapping { sql, .. } => Some(sql.as_str()),
        }
    }

    /// What an error response echoes as `query`: the executed statement, or
    /// the rejected input when nothing was executed.
    pub fn echoed_query(&self) -> &str {
        match self {
            Self::InvalidInput { raw, .. } => raw,
            Self::Execution { sql, .. } | Self::Mapping { sql, .. } => sql,
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        match self.kind() {
            LookupErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            LookupErrorKind::Execution | LookupErrorKind::Mapping => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message sent to the client, cause chain included.
    ///
    /// A cause whose text its parent already printed (as sqlx does with
    /// `error returned from database: {0}`) is not repeated.
    pub fn client_message(&self) -> String {
        if let Self::InvalidInput { .. } = self {
            return "Invalid student id".to_string();
        }

        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(inner) = cause {
            let text = inner.to_string();
            if !message.ends_with(&text) {
                let _ = write!(message, ": {text}");
            }
            cause = inner.source();
        }
        message
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// A lookup failure as the HTTP layer reports it.
#[derive(Debug)]
pub struct LookupRejection {
    pub error: LookupError,
    pub echo: SqlEcho,
}

impl IntoResponse for LookupRejection {
    fn into_response(self) -> Response {
        let Self { error, echo } = self;

        match error.kind() {
            LookupErrorKind::InvalidInput => warn!(?error, "Rejected lookup input"),
            LookupErrorKind::Execution | LookupErrorKind::Mapping => error!(?error, "Error!"),
        }

        let body = ErrorBody {
            error: error.client_message(),
            query: echo
                .is_enabled()
                .then(|| error.echoed_query().to_string()),
        };
        (error.status_code(), Json(body)).into_response()
    }
}
