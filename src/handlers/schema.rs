//! Read-only view of the registered schema: entities, fields, constraints,
//! and the choice code/label pairs.

use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

pub async fn describe(State(state): State<AppState>) -> Json<Value> {
    let entities = serde_json::to_value(state.registry.entities()).unwrap_or(Value::Null);
    Json(json!({ "entities": entities }))
}
