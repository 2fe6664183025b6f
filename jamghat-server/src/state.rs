use std::sync::Arc;

use crate::store::PartyStore;

/// Shared application state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<PartyStore>,
}

impl AppState {
    pub fn new(store: PartyStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}
