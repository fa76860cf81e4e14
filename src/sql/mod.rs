//! Parameterized SQL built from the schema registry.

mod builder;
mod params;

pub use builder::{
    create_table, delete, delete_by_column, exists_by_id, insert, select_by_column, select_by_id,
    select_list, update, QueryBuf,
};
pub use params::BindValue;
