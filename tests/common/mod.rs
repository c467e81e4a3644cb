//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Three carnivores (9, 12, 15 m) and three herbivores (20, 25, 30 m), all
/// living between 100 and 95 Mya
pub const SEPARABLE_CSV: &str = "\
length_m,max_ma,min_ma,diet
9,100,95,carnivorous
12,100,95,carnivorous
15,100,95,carnivorous
20,100,95,herbivorous
25,100,95,herbivorous
30,100,95,herbivorous
";

/// Only herbivores
pub const SINGLE_CLASS_CSV: &str = "\
length_m,max_ma,min_ma,diet
20,100,95,herbivorous
25,100,95,herbivorous
30,100,95,herbivorous
";

/// Scratch directory holding a dataset and an artifact path
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write `contents` as the dataset and return its path
    pub fn dataset(&self, contents: &str) -> PathBuf {
        let path = self.dir.path().join("dinosaur.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Artifact path inside a not-yet-existing subdirectory
    pub fn artifact(&self) -> PathBuf {
        self.dir.path().join("models").join("dino_identifier_model.bin")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Parse Prometheus exposition text into metric name -> lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
