//! Roster API: schema-driven REST backend for cohorts and students.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod schema;
pub mod serializer;
pub mod sql;
pub mod state;
pub mod store;

pub use error::{ApiError, SchemaError};
pub use routes::{common_routes, entity_routes, schema_routes};
pub use schema::{Choice, EntityDef, FieldDef, FieldKind, Registry};
pub use serializer::{Representation, Serializer};
pub use state::AppState;
pub use store::Store;
