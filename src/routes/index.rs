use axum::Json;
use serde_json::{Value, json};

pub async fn get_index_route() -> Json<Value> {
    Json(json!({
        "endpoints": {
            "/students?query=": "lookup built by string concatenation",
            "/students_safe?query=": "lookup through a parameterized statement",
        }
    }))
}
