use crate::{
    data::student::Student,
    error::{LookupError, LookupRejection},
    lookup::UnsafeRecords,
    state::AppState,
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

#[derive(Deserialize, Debug, Default)]
pub struct LookupQuery {
    #[serde(default)]
    pub query: String,
}

fn rejection(state: &AppState) -> impl FnOnce(LookupError) -> LookupRejection {
    let echo = state.sql_echo();
    move |error| LookupRejection { error, echo }
}

pub async fn get_students(
    State(state): State<AppState>,
    Query(LookupQuery { query }): Query<LookupQuery>,
) -> Result<Json<UnsafeRecords>, LookupRejection> {
    let found = state.lookup_unsafe(&query).await.map_err(rejection(&state))?;
    info!(shape = ?found.shape, sql = %found.executed_sql, "unsafe lookup served");
    Ok(Json(found.records))
}

pub async fn get_students_safe(
    State(state): State<AppState>,
    Query(LookupQuery { query }): Query<LookupQuery>,
) -> Result<Json<Vec<Student>>, LookupRejection> {
    let found = state.lookup_safe(&query).await.map_err(rejection(&state))?;
    info!(sql = found.executed_sql, count = found.students.len(), "safe lookup served");
    Ok(Json(found.students))
}
