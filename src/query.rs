//! SQL construction for both student lookups.
//!
//! The unsafe builders splice caller input straight into statement text. That
//! is the behaviour being demonstrated, so nothing here quotes, escapes or
//! validates it. The safe builder only ever produces a fixed template plus a
//! bound integer.

use crate::{
    error::{InvalidInputSnafu, LookupResult},
    storage::BoundParam,
};
use snafu::ResultExt;

pub const BY_ID_PREFIX: &str = "SELECT * FROM students WHERE id = ";
pub const JOIN_PROJECTION_PREFIX: &str = "SELECT s.id, s.age, s.sex, s.card_id, s.name, cc.student_id, cc.id, cc.card_number, cc.expiration, cc.cvv FROM students s ";
pub const SAFE_TEMPLATE: &str = "SELECT id, age, sex, card_id, name FROM students WHERE id = $1";

/// Which statement the unsafe endpoint builds for a given input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// `SELECT * FROM students WHERE id = <raw>`
    RawById,
    /// `SELECT <trimmed raw>`, the caller picks columns and tables.
    RawJoinExplicit,
    /// Fixed 10-column projection followed by the caller's join clause.
    RawJoinPrefixed,
}

/// Lowercases one char at a time, keeping only the first char of each
/// mapping. `str::to_lowercase` would turn `İ` into `i\u{307}` and hide a
/// `join` spelled with it.
fn fold_lowercase(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

impl QueryShape {
    pub fn classify(raw: &str) -> Self {
        if !fold_lowercase(raw).contains("join") {
            Self::RawById
        } else if raw.trim().starts_with('*') {
            Self::RawJoinExplicit
        } else {
            Self::RawJoinPrefixed
        }
    }

    /// Whether rows come back as student + card tuples.
    pub const fn is_join(self) -> bool {
        matches!(self, Self::RawJoinExplicit | Self::RawJoinPrefixed)
    }

    pub fn render(self, raw: &str) -> String {
        match self {
            Self::RawById => format!("{BY_ID_PREFIX}{raw}"),
            Self::RawJoinExplicit => format!("SELECT {}", raw.trim()),
            Self::RawJoinPrefixed => format!("{JOIN_PROJECTION_PREFIX}{raw}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsafeStatement {
    pub shape: QueryShape,
    pub sql: String,
}

pub fn build_unsafe(raw: &str) -> UnsafeStatement {
    let shape = QueryShape::classify(raw);
    UnsafeStatement {
        shape,
        sql: shape.render(raw),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeStatement {
    id: i64,
}

impl SafeStatement {
    pub const fn template(&self) -> &'static str {
        SAFE_TEMPLATE
    }

    pub const fn id(&self) -> i64 {
        self.id
    }

    pub const fn params(&self) -> [BoundParam; 1] {
        [BoundParam::Int(self.id)]
    }

    /// Recovers the statement from what was sent to storage.
    #[cfg(test)]
    pub fn parse_back(template: &str, params: &[BoundParam]) -> Option<Self> {
        match params {
            [BoundParam::Int(id)] if template == SAFE_TEMPLATE => Some(Self { id: *id }),
            _ => None,
        }
    }
}

pub fn build_safe(raw: &str) -> LookupResult<SafeStatement> {
    let lowered = fold_lowercase(raw);
    let id = lowered
        .parse::<i64>()
        .context(InvalidInputSnafu { raw: lowered })?;
    Ok(SafeStatement { id })
}
