//! Shared application state for all routes. The registry is fixed at startup.

use crate::schema::Registry;
use crate::serializer::{Representation, Serializer};
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub registry: Arc<Registry>,
    pub serializer: Serializer,
}

impl AppState {
    pub fn new(store: Store, representation: Representation) -> Self {
        let registry = store.registry_arc();
        let serializer = Serializer::new(registry.clone(), representation);
        AppState {
            store,
            registry,
            serializer,
        }
    }
}
