//! Conversion between stored rows and wire JSON, honoring the registry's
//! constraints. Reference fields serialize as bare ids or as resource
//! locators depending on the configured representation.

use crate::error::ApiError;
use crate::schema::{EntityDef, FieldDef, FieldKind, Registry};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// How reference fields travel on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Representation {
    /// `"cohort": 1`
    Embedded,
    /// `"cohort": "/cohort/1/"`
    Linked,
}

#[derive(Clone)]
pub struct Serializer {
    registry: Arc<Registry>,
    representation: Representation,
}

impl Serializer {
    pub fn new(registry: Arc<Registry>, representation: Representation) -> Self {
        Serializer {
            registry,
            representation,
        }
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    /// Column-keyed stored row to wire-keyed JSON object. Reverse relations
    /// are not attached here; see [`Serializer::to_wire_with_children`].
    pub fn to_wire(&self, entity: &EntityDef, record: &Value) -> Value {
        let mut out = Map::new();
        for field in &entity.fields {
            let stored = record.get(field.column).cloned().unwrap_or(Value::Null);
            let wire = match &field.kind {
                FieldKind::Reference { target } if self.representation == Representation::Linked => {
                    match (self.registry.entity(target), stored.as_i64()) {
                        (Some(t), Some(id)) => Value::String(locator(t, id)),
                        _ => stored,
                    }
                }
                _ => stored,
            };
            out.insert(field.name.to_string(), wire);
        }
        Value::Object(out)
    }

    /// `to_wire` plus explicitly requested child collections, keyed by the
    /// child entity's path segment.
    pub fn to_wire_with_children(
        &self,
        entity: &EntityDef,
        record: &Value,
        children: &[(&EntityDef, Vec<Value>)],
    ) -> Value {
        let mut wire = self.to_wire(entity, record);
        if let Value::Object(map) = &mut wire {
            for (child, rows) in children {
                let serialized: Vec<Value> = rows.iter().map(|r| self.to_wire(child, r)).collect();
                map.insert(child.path_segment.to_string(), Value::Array(serialized));
            }
        }
        wire
    }

    /// Wire JSON object to a column-keyed field map ready for the store.
    /// Unknown incoming fields (including `id`; the pk is store-assigned) are
    /// ignored; a missing or null required field fails validation.
    pub fn from_wire(
        &self,
        entity: &EntityDef,
        value: &Value,
    ) -> Result<HashMap<String, Value>, ApiError> {
        let Value::Object(obj) = value else {
            return Err(ApiError::BadRequest("body must be a JSON object".into()));
        };
        let mut fields = HashMap::new();
        for field in &entity.fields {
            if matches!(field.kind, FieldKind::PrimaryKey) {
                continue;
            }
            match obj.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(ApiError::validation(field.name, "is required"));
                    }
                }
                Some(v) => {
                    fields.insert(field.column.to_string(), self.field_from_wire(field, v)?);
                }
            }
        }
        Ok(fields)
    }

    fn field_from_wire(&self, field: &FieldDef, v: &Value) -> Result<Value, ApiError> {
        match &field.kind {
            FieldKind::PrimaryKey => Ok(v.clone()),
            FieldKind::Text { max_length } => {
                let Some(s) = v.as_str() else {
                    return Err(ApiError::validation(field.name, "must be a string"));
                };
                if s.len() > *max_length {
                    return Err(ApiError::validation(
                        field.name,
                        format!("must be at most {} characters", max_length),
                    ));
                }
                Ok(v.clone())
            }
            FieldKind::Choice { choices } => {
                let Some(s) = v.as_str() else {
                    return Err(ApiError::validation(field.name, "must be a string"));
                };
                if !choices.iter().any(|c| c.code == s) {
                    let codes: Vec<&str> = choices.iter().map(|c| c.code).collect();
                    return Err(ApiError::validation(
                        field.name,
                        format!("must be one of: {}", codes.join(", ")),
                    ));
                }
                Ok(v.clone())
            }
            FieldKind::Reference { target } => match self.representation {
                Representation::Embedded => {
                    let Some(id) = v.as_i64() else {
                        return Err(ApiError::validation(field.name, "must be an integer id"));
                    };
                    Ok(Value::from(id))
                }
                Representation::Linked => {
                    let Some(s) = v.as_str() else {
                        return Err(ApiError::validation(
                            field.name,
                            "must be a resource locator string",
                        ));
                    };
                    let id = self.resolve_locator(field, target, s)?;
                    Ok(Value::from(id))
                }
            },
        }
    }

    /// Reverse a locator produced by [`locator`]: `/cohort/3/` -> 3. The path
    /// segment must name the field's target entity.
    fn resolve_locator(&self, field: &FieldDef, target: &str, s: &str) -> Result<i64, ApiError> {
        let Some(target_entity) = self.registry.entity(target) else {
            return Err(ApiError::validation(field.name, "unresolvable reference"));
        };
        let mut parts = s.trim_matches('/').split('/');
        let (segment, id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(segment), Some(id), None) => (segment, id),
            _ => {
                return Err(ApiError::validation(
                    field.name,
                    format!("must be a locator like /{}/1/", target_entity.path_segment),
                ));
            }
        };
        if segment != target_entity.path_segment {
            return Err(ApiError::validation(
                field.name,
                format!("locator must point at /{}/", target_entity.path_segment),
            ));
        }
        id.parse::<i64>().map_err(|_| {
            ApiError::validation(
                field.name,
                format!("must be a locator like /{}/1/", target_entity.path_segment),
            )
        })
    }
}

fn locator(entity: &EntityDef, id: i64) -> String {
    format!("/{}/{}/", entity.path_segment, id)
}
