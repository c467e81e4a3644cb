//! Training data preparation
//!
//! Reads the specimen CSV, applies the diet filter and median imputation,
//! and encodes the surviving rows into a feature matrix and binary labels.

pub mod encoder;
pub mod loader;

pub use encoder::{encode, EncodedDataset};
pub use loader::{clean, CleanedDataset, CleanedRecord, CleaningReport, DatasetLoader, RawRecord};
