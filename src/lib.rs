//! Dinosaur diet identifier.
//!
//! Trains a random forest on the fossil dataset (length and the age range a
//! species lived in) and serves carnivore/herbivore predictions from the
//! stored artifact over HTTP and the command line.

pub mod api;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;
pub mod state;
pub mod telemetry;

pub use error::{AppError, Result};
