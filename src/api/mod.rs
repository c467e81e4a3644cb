pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::InferenceService;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inference: Arc<InferenceService>,
}

impl AppState {
    pub fn new(inference: Arc<InferenceService>) -> Self {
        Self { inference }
    }
}
