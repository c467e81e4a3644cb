use crate::error::{AppError, Result};
use crate::ml::RandomForest;
use crate::state::{decode_artifact, encode_artifact, ModelStore};
use parking_lot::RwLock;
use std::sync::Arc;

/// In-memory model store (for tests and embedded use).
///
/// Holds the encoded artifact rather than the live model so that reads go
/// through the same codec as the file store.
#[derive(Clone, Default)]
pub struct InMemoryModelStore {
    slot: Arc<RwLock<Option<Vec<u8>>>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw encoded bytes of the current artifact
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.slot.read().clone()
    }

    /// Overwrite the slot with arbitrary bytes
    pub fn put_bytes(&self, bytes: Vec<u8>) {
        *self.slot.write() = Some(bytes);
    }
}

impl ModelStore for InMemoryModelStore {
    fn write(&self, model: &RandomForest) -> Result<()> {
        let bytes = encode_artifact(model)?;
        *self.slot.write() = Some(bytes);
        tracing::debug!("Model artifact stored in memory");
        Ok(())
    }

    fn read(&self) -> Result<RandomForest> {
        let guard = self.slot.read();
        let bytes = guard
            .as_ref()
            .ok_or_else(|| AppError::ModelNotFound("no model has been trained".to_string()))?;
        decode_artifact(bytes)
    }

    fn exists(&self) -> bool {
        self.slot.read().is_some()
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
