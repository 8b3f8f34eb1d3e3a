use crate::{
    routes::{
        index::get_index_route,
        students::{get_students, get_students_safe},
    },
    state::AppState,
};
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub mod index;
pub mod students;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_index_route))
        .route("/students", get(get_students))
        .route("/students_safe", get(get_students_safe))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
