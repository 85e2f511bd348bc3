use std::sync::Arc;

use crate::db::store::StatusStore;
use crate::services::queue::JobQueue;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StatusStore>,
    pub queue: Arc<JobQueue>,
    pub brand_prefix: String,
}

impl AppState {
    pub fn new(store: Arc<dyn StatusStore>, queue: JobQueue, brand_prefix: String) -> Self {
        Self {
            store,
            queue: Arc::new(queue),
            brand_prefix,
        }
    }
}
