//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from an entity definition.

use crate::schema::{EntityDef, FieldKind, Registry};
use serde_json::Value;
use std::collections::HashMap;

/// Quote identifier for SQLite (safe: only from the registry).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) {
        self.params.push(v);
    }
}

fn column_list(entity: &EntityDef) -> String {
    entity
        .fields
        .iter()
        .map(|f| quoted(f.column))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT by primary key.
pub fn select_by_id(entity: &EntityDef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        column_list(entity),
        quoted(entity.table),
        quoted(entity.pk_column())
    );
    q.push_param(Value::from(id));
    q
}

/// SELECT all rows, ordered by primary key (insertion order for autoincrement ids).
pub fn select_list(entity: &EntityDef) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        column_list(entity),
        quoted(entity.table),
        quoted(entity.pk_column())
    );
    q
}

/// SELECT rows where `column` equals `value`, ordered by primary key.
/// Used for foreign-key lookups (e.g. students of one cohort).
pub fn select_by_column(entity: &EntityDef, column: &str, value: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = ? ORDER BY {}",
        column_list(entity),
        quoted(entity.table),
        quoted(column),
        quoted(entity.pk_column())
    );
    q.push_param(Value::from(value));
    q
}

/// SELECT 1 by primary key; used to verify reference targets before a write.
pub fn exists_by_id(entity: &EntityDef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT 1 FROM {} WHERE {} = ?",
        quoted(entity.table),
        quoted(entity.pk_column())
    );
    q.push_param(Value::from(id));
    q
}

/// INSERT: columns and placeholders from the entity's field order, values from
/// the column-keyed field map. The primary key is always store-assigned.
pub fn insert(entity: &EntityDef, fields: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for f in &entity.fields {
        if matches!(f.kind, FieldKind::PrimaryKey) {
            continue;
        }
        let Some(val) = fields.get(f.column) else { continue };
        cols.push(quoted(f.column));
        placeholders.push("?".to_string());
        q.push_param(val.clone());
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(entity.table),
        cols.join(", "),
        placeholders.join(", "),
        column_list(entity)
    );
    q
}

/// UPDATE by primary key: SET only columns present in the field map.
/// Falls back to a plain SELECT when there is nothing to set.
pub fn update(entity: &EntityDef, id: i64, fields: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for f in &entity.fields {
        if matches!(f.kind, FieldKind::PrimaryKey) {
            continue;
        }
        let Some(val) = fields.get(f.column) else { continue };
        sets.push(format!("{} = ?", quoted(f.column)));
        q.push_param(val.clone());
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    q.push_param(Value::from(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ? RETURNING {}",
        quoted(entity.table),
        sets.join(", "),
        quoted(entity.pk_column()),
        column_list(entity)
    );
    q
}

/// DELETE by primary key.
pub fn delete(entity: &EntityDef, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quoted(entity.table),
        quoted(entity.pk_column())
    );
    q.push_param(Value::from(id));
    q
}

/// DELETE rows where `column` equals `value`; the cascade step of a parent delete.
pub fn delete_by_column(entity: &EntityDef, column: &str, value: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        quoted(entity.table),
        quoted(column)
    );
    q.push_param(Value::from(value));
    q
}

/// CREATE TABLE IF NOT EXISTS from the entity definition. Reference columns
/// carry a foreign key with ON DELETE CASCADE so the invariant holds even for
/// SQL issued outside the store.
pub fn create_table(entity: &EntityDef, registry: &Registry) -> String {
    let mut defs = Vec::new();
    for f in &entity.fields {
        let def = match &f.kind {
            FieldKind::PrimaryKey => {
                format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quoted(f.column))
            }
            FieldKind::Text { .. } | FieldKind::Choice { .. } => {
                let mut d = format!("{} TEXT", quoted(f.column));
                if f.required {
                    d.push_str(" NOT NULL");
                }
                d
            }
            FieldKind::Reference { target } => {
                let mut d = format!("{} INTEGER", quoted(f.column));
                if f.required {
                    d.push_str(" NOT NULL");
                }
                if let Some(t) = registry.entity(target) {
                    d.push_str(&format!(
                        " REFERENCES {} ({}) ON DELETE CASCADE",
                        quoted(t.table),
                        quoted(t.pk_column())
                    ));
                }
                d
            }
        };
        defs.push(def);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quoted(entity.table),
        defs.join(", ")
    )
}
