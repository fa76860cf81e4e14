//! Request handlers.

pub mod entity;
pub mod schema;
