//! SQLite-backed store: generic CRUD over registered entities, with
//! foreign-key verification and cascading deletes scoped to one transaction.

use crate::error::ApiError;
use crate::schema::{EntityDef, FieldKind, Registry};
use crate::sql::{self, BindValue, QueryBuf};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    registry: Arc<Registry>,
}

impl Store {
    /// Open (or create) a SQLite database at `url`, e.g. `sqlite://roster.db`.
    pub async fn connect(url: &str, registry: Arc<Registry>) -> Result<Self, ApiError> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        Ok(Store { pool, registry })
    }

    /// In-memory database on a single connection, so every handle sees the
    /// same data. Mutations serialize on that connection.
    pub async fn in_memory(registry: Arc<Registry>) -> Result<Self, ApiError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        Ok(Store { pool, registry })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_arc(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Create every registered table that does not exist yet.
    pub async fn migrate(&self) -> Result<(), ApiError> {
        for entity in self.registry.entities() {
            let ddl = sql::create_table(entity, &self.registry);
            tracing::debug!(sql = %ddl, "migrate");
            sqlx::query(&ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert one row from a column-keyed field map; reference targets are
    /// verified in the same transaction. Returns the created row.
    pub async fn create(
        &self,
        entity: &EntityDef,
        fields: &HashMap<String, Value>,
    ) -> Result<Value, ApiError> {
        let mut tx = self.pool.begin().await?;
        self.check_references(&mut tx, entity, fields).await?;
        let q = sql::insert(entity, fields);
        let row = fetch_one(&mut tx, &q).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Fetch one row by primary key. Returns None when absent.
    pub async fn get(&self, entity: &EntityDef, id: i64) -> Result<Option<Value>, ApiError> {
        let q = sql::select_by_id(entity, id);
        fetch_optional_pool(&self.pool, &q).await
    }

    /// All rows, in primary-key order.
    pub async fn list(&self, entity: &EntityDef) -> Result<Vec<Value>, ApiError> {
        let q = sql::select_list(entity);
        fetch_all_pool(&self.pool, &q).await
    }

    /// Rows whose `column` equals `value`. The explicit reverse-relation query:
    /// callers invoke it only where related rows are actually needed.
    pub async fn list_by_foreign_key(
        &self,
        entity: &EntityDef,
        column: &str,
        value: i64,
    ) -> Result<Vec<Value>, ApiError> {
        let q = sql::select_by_column(entity, column, value);
        fetch_all_pool(&self.pool, &q).await
    }

    /// Update one row by primary key. Returns the updated row, or None when absent.
    pub async fn update(
        &self,
        entity: &EntityDef,
        id: i64,
        fields: &HashMap<String, Value>,
    ) -> Result<Option<Value>, ApiError> {
        let mut tx = self.pool.begin().await?;
        self.check_references(&mut tx, entity, fields).await?;
        let q = sql::update(entity, id, fields);
        let row = fetch_optional(&mut tx, &q).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Delete one row by primary key. Rows in entities that reference it are
    /// deleted first, inside the same transaction, so a cascade is observed
    /// either completely or not at all. Returns false when the row is absent.
    pub async fn delete(&self, entity: &EntityDef, id: i64) -> Result<bool, ApiError> {
        let referencing = self.registry.referencing_fields(entity.name);
        let cascading = !referencing.is_empty();
        let mut tx = self.pool.begin().await?;
        for (child, field) in &referencing {
            let q = sql::delete_by_column(child, field.column, id);
            let removed = execute(&mut tx, &q).await?;
            if removed > 0 {
                tracing::debug!(entity = child.name, parent = entity.name, removed, "cascade");
            }
        }
        let q = sql::delete(entity, id);
        let removed = execute(&mut tx, &q).await?;
        if removed == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        if cascading {
            tx.commit()
                .await
                .map_err(|e| ApiError::CascadeFailure(e.to_string()))?;
        } else {
            tx.commit().await?;
        }
        Ok(true)
    }

    /// Verify every reference value in `fields` points at an existing row.
    async fn check_references(
        &self,
        tx: &mut SqliteConnection,
        entity: &EntityDef,
        fields: &HashMap<String, Value>,
    ) -> Result<(), ApiError> {
        for f in &entity.fields {
            let FieldKind::Reference { target } = &f.kind else { continue };
            let Some(value) = fields.get(f.column) else { continue };
            let Some(id) = value.as_i64() else {
                return Err(ApiError::validation(f.name, "must be an integer id"));
            };
            let Some(target_entity) = self.registry.entity(target) else { continue };
            let q = sql::exists_by_id(target_entity, id);
            if fetch_optional(tx, &q).await?.is_none() {
                return Err(ApiError::validation(
                    f.name,
                    format!("{} {} does not exist", target, id),
                ));
            }
        }
        Ok(())
    }
}

fn bind_params<'q>(
    q: &'q QueryBuf,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(BindValue::from_json(p));
    }
    query
}

async fn fetch_one(tx: &mut SqliteConnection, q: &QueryBuf) -> Result<Value, ApiError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_params(q).fetch_one(&mut *tx).await?;
    Ok(row_to_json(&row))
}

async fn fetch_optional(
    tx: &mut SqliteConnection,
    q: &QueryBuf,
) -> Result<Option<Value>, ApiError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_params(q).fetch_optional(&mut *tx).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

async fn fetch_optional_pool(pool: &SqlitePool, q: &QueryBuf) -> Result<Option<Value>, ApiError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_params(q).fetch_optional(pool).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

async fn fetch_all_pool(pool: &SqlitePool, q: &QueryBuf) -> Result<Vec<Value>, ApiError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind_params(q).fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

async fn execute(tx: &mut SqliteConnection, q: &QueryBuf) -> Result<u64, ApiError> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let res = bind_params(q).execute(&mut *tx).await?;
    Ok(res.rows_affected())
}

fn row_to_json(row: &SqliteRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &SqliteRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    Value::Null
}
