use crate::error::{AppError, Result};
use crate::ml::RandomForest;
use crate::state::{decode_artifact, encode_artifact, ModelStore};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Model store backed by a single artifact file
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the artifact and its staging files live in
    fn directory(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Write `bytes` to a uniquely named sibling file, then rename it over
    /// the artifact. The staging file is removed if any step fails.
    fn write_staged(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut staging = NamedTempFile::new_in(self.directory())?;
        staging.write_all(bytes)?;
        staging.as_file().sync_all()?;
        staging.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ModelStore for FileModelStore {
    fn write(&self, model: &RandomForest) -> Result<()> {
        let bytes = encode_artifact(model)?;

        let directory = self.directory();
        fs::create_dir_all(directory).map_err(|e| {
            AppError::Internal(format!(
                "Failed to create model directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        self.write_staged(&bytes).map_err(|e| {
            AppError::Internal(format!(
                "Failed to write model artifact {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %self.path.display(),
            size_bytes = bytes.len(),
            "Model artifact written"
        );
        Ok(())
    }

    fn read(&self) -> Result<RandomForest> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ModelNotFound(format!(
                    "no model artifact at {}",
                    self.path.display()
                )))
            }
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Failed to read model artifact {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        decode_artifact(&bytes).map_err(|e| match e {
            AppError::Serialization(msg) => {
                AppError::Serialization(format!("{} ({})", msg, self.path.display()))
            }
            other => other,
        })
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{Classifier, ForestParams};
    use ndarray::array;

    fn forest() -> RandomForest {
        let x = array![[9.0, 100.0], [12.0, 100.0], [20.0, 100.0], [25.0, 100.0]];
        let params = ForestParams {
            n_trees: 8,
            ..Default::default()
        };
        RandomForest::fit(&x, &[1, 1, 0, 0], 2, &params).unwrap()
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("model.bin"));
        assert!(!store.exists());
        assert!(matches!(store.read(), Err(AppError::ModelNotFound(_))));
    }

    #[test]
    fn test_write_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("models").join("model.bin");
        let store = FileModelStore::new(&path);

        store.write(&forest()).unwrap();

        assert!(path.is_file());
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("model.bin")]);
    }

    #[test]
    fn test_round_trip_predictions_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("model.bin"));
        let model = forest();
        store.write(&model).unwrap();

        let loaded = store.read().unwrap();
        let probe = array![[10.0, 100.0], [22.0, 100.0], [0.5, 250.0]];
        assert_eq!(
            model.predict_proba(&probe).unwrap(),
            loaded.predict_proba(&probe).unwrap()
        );
    }

    #[test]
    fn test_write_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("model.bin"));
        store.write(&forest()).unwrap();

        let x = array![[1.0, 1.0], [2.0, 1.0]];
        let params = ForestParams {
            n_trees: 2,
            ..Default::default()
        };
        let replacement = RandomForest::fit(&x, &[0, 1], 2, &params).unwrap();
        store.write(&replacement).unwrap();

        assert_eq!(store.read().unwrap().n_trees(), 2);
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"not a model").unwrap();

        let err = FileModelStore::new(&path).read().unwrap_err();
        match err {
            AppError::Serialization(msg) => assert!(msg.contains("model.bin")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_writers_publish_whole_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileModelStore::new(dir.path().join("model.bin")));

        let x = array![[9.0, 100.0], [12.0, 100.0], [20.0, 100.0], [25.0, 100.0]];
        let handles: Vec<_> = (1..=6)
            .map(|n_trees| {
                let store = store.clone();
                let x = x.clone();
                std::thread::spawn(move || {
                    let params = ForestParams {
                        n_trees,
                        ..Default::default()
                    };
                    let model = RandomForest::fit(&x, &[1, 1, 0, 0], 2, &params).unwrap();
                    for _ in 0..5 {
                        store.write(&model).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stored = store.read().unwrap();
        assert!((1..=6).contains(&stored.n_trees()));
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
