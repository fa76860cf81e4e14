//! Entity CRUD handlers: list, create, read, update, delete.
//! Handlers resolve the entity from the path segment, so the routes stay
//! entity-agnostic; all validation and cascade semantics live below.

use crate::error::ApiError;
use crate::schema::{EntityDef, FieldDef};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn resolve_entity<'a>(state: &'a AppState, path_segment: &str) -> Result<&'a EntityDef, ApiError> {
    state
        .registry
        .entity_by_path(path_segment)
        .ok_or_else(|| ApiError::UnknownEntity(path_segment.to_string()))
}

/// A path id that does not parse names no resource.
fn parse_id(id_str: &str) -> Result<i64, ApiError> {
    id_str
        .parse()
        .map_err(|_| ApiError::NotFound(id_str.to_string()))
}

/// Resolve `?include=<segment>` to a (child entity, reference field) pair.
/// Only entities that reference this one can be included.
fn parse_include<'a>(
    state: &'a AppState,
    entity: &EntityDef,
    params: &HashMap<String, String>,
) -> Result<Option<(&'a EntityDef, &'a FieldDef)>, ApiError> {
    let Some(name) = params.get("include") else {
        return Ok(None);
    };
    state
        .registry
        .referencing_fields(entity.name)
        .into_iter()
        .find(|(child, _)| child.path_segment == name.as_str())
        .map(Some)
        .ok_or_else(|| ApiError::NotFound(format!("no related collection '{}'", name)))
}

async fn serialize_row(
    state: &AppState,
    entity: &EntityDef,
    row: &Value,
    include: Option<(&EntityDef, &FieldDef)>,
) -> Result<Value, ApiError> {
    match include {
        Some((child, field)) => {
            let id = row
                .get(entity.pk_column())
                .and_then(Value::as_i64)
                .unwrap_or_default();
            let children = state.store.list_by_foreign_key(child, field.column, id).await?;
            Ok(state
                .serializer
                .to_wire_with_children(entity, row, &[(child, children)]))
        }
        None => Ok(state.serializer.to_wire(entity, row)),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let include = parse_include(&state, entity, &params)?;
    let rows = state.store.list(entity).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        out.push(serialize_row(&state, entity, row, include).await?);
    }
    Ok((StatusCode::OK, Json(Value::Array(out))))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let fields = state.serializer.from_wire(entity, &body)?;
    let row = state.store.create(entity, &fields).await?;
    Ok((StatusCode::CREATED, Json(state.serializer.to_wire(entity, &row))))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let include = parse_include(&state, entity, &params)?;
    let id = parse_id(&id_str)?;
    let row = state
        .store
        .get(entity, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(id_str))?;
    let wire = serialize_row(&state, entity, &row, include).await?;
    Ok((StatusCode::OK, Json(wire)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    let fields = state.serializer.from_wire(entity, &body)?;
    let row = state
        .store
        .update(entity, id, &fields)
        .await?
        .ok_or_else(|| ApiError::NotFound(id_str))?;
    Ok((StatusCode::OK, Json(state.serializer.to_wire(entity, &row))))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let entity = resolve_entity(&state, &path_segment)?;
    let id = parse_id(&id_str)?;
    if !state.store.delete(entity, id).await? {
        return Err(ApiError::NotFound(id_str));
    }
    Ok(StatusCode::NO_CONTENT)
}
