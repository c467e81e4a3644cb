pub mod file_store;
pub mod store;

pub use file_store::FileModelStore;
pub use store::InMemoryModelStore;

use crate::config::ModelConfig;
use crate::error::{AppError, Result};
use crate::ml::RandomForest;
use std::sync::Arc;

/// Single named slot holding the trained classifier.
///
/// `write` replaces the previous artifact; readers never observe a partial
/// write. `read` returns [`AppError::ModelNotFound`] when nothing has been
/// written yet.
pub trait ModelStore: Send + Sync {
    /// Replace the stored artifact
    fn write(&self, model: &RandomForest) -> Result<()>;

    /// Read the stored artifact
    fn read(&self) -> Result<RandomForest>;

    /// Whether an artifact has been written
    fn exists(&self) -> bool;

    /// Human-readable location used in log and error messages
    fn location(&self) -> String;
}

/// Serialize an artifact to its on-disk representation
pub fn encode_artifact(model: &RandomForest) -> Result<Vec<u8>> {
    bincode::serialize(model)
        .map_err(|e| AppError::Serialization(format!("Failed to serialize model: {}", e)))
}

/// Deserialize an artifact written by [`encode_artifact`]
pub fn decode_artifact(bytes: &[u8]) -> Result<RandomForest> {
    bincode::deserialize(bytes)
        .map_err(|e| AppError::Serialization(format!("Failed to deserialize model: {}", e)))
}

/// Create the model store described by configuration
pub fn create_store(config: &ModelConfig) -> Arc<dyn ModelStore> {
    tracing::info!(path = %config.artifact_path.display(), "Using file model store");
    Arc::new(FileModelStore::new(&config.artifact_path))
}
