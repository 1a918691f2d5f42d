use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::artifact::ModelArtifact;
use crate::errors::RecResult;
use crate::serialization::{load_model, save_model};

/// Durable artifact storage keyed by target name. Saving overwrites.
pub trait ArtifactStore: Send + Sync {
    /// Returns where the artifact was stored.
    fn save(&self, name: &str, artifact: &ModelArtifact) -> RecResult<String>;

    fn load(&self, name: &str) -> RecResult<Option<Arc<ModelArtifact>>>;
}

/// Gzipped bincode files under one directory, `als_{name}.gz`.
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(&self, name: &str, artifact: &ModelArtifact) -> RecResult<String> {
        let path = save_model(artifact, &self.dir, name)?;
        Ok(path.display().to_string())
    }

    fn load(&self, name: &str) -> RecResult<Option<Arc<ModelArtifact>>> {
        let artifact: Option<ModelArtifact> = load_model(&self.dir, name)?;
        Ok(artifact.map(Arc::new))
    }
}

#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: DashMap<String, Arc<ModelArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save(&self, name: &str, artifact: &ModelArtifact) -> RecResult<String> {
        self.artifacts
            .insert(name.to_string(), Arc::new(artifact.clone()));
        Ok(format!("memory://{name}"))
    }

    fn load(&self, name: &str) -> RecResult<Option<Arc<ModelArtifact>>> {
        Ok(self.artifacts.get(name).map(|a| Arc::clone(a.value())))
    }
}

#[cfg(test)]
mod tests {
    use fxhash::FxHashMap;

    use super::*;
    use crate::als::{FactorMatrix, Factors};
    use crate::common::ItemId;
    use crate::errors::RecError;
    use crate::sparse::IdIndex;

    fn artifact(name: &str, n_items: i64) -> RecResult<ModelArtifact> {
        let users = IdIndex::from_ids(vec![String::from("u1")]);
        let items = IdIndex::from_ids((0..n_items).map(ItemId::Int));
        let factors = Factors {
            user_factors: FactorMatrix {
                n_rows: 1,
                n_cols: 2,
                data: vec![0.5, -1.0],
            },
            item_factors: FactorMatrix::zeros(n_items as usize, 2),
        };
        let mut titles = FxHashMap::default();
        titles.insert(ItemId::Int(0), String::from("Tandoor House"));
        ModelArtifact::new(name, users, items, factors, titles)
    }

    #[test]
    fn test_file_store_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = FileArtifactStore::new(dir.path().join("artifacts"));
        assert!(store.load("restaurants")?.is_none());

        let saved = artifact("restaurants", 3)?;
        let location = store.save("restaurants", &saved)?;
        assert!(location.ends_with("als_restaurants.gz"));
        let loaded = store.load("restaurants")?.ok_or("artifact not saved")?;
        assert_eq!(*loaded, saved);
        assert!(store.load("dishes")?.is_none());
        Ok(())
    }

    #[test]
    fn test_file_store_rejects_malformed_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = FileArtifactStore::new(dir.path());
        let mut broken = artifact("restaurants", 3)?;
        broken.user_factors.data = vec![1.0];
        store.save("restaurants", &broken)?;
        assert!(matches!(
            store.load("restaurants"),
            Err(RecError::Serialization(_))
        ));
        Ok(())
    }

    #[test]
    fn test_memory_store_overwrites() -> RecResult<()> {
        let store = MemoryArtifactStore::new();
        assert!(store.load("dishes")?.is_none());
        store.save("dishes", &artifact("dishes", 2)?)?;
        store.save("dishes", &artifact("dishes", 4)?)?;
        assert_eq!(store.len(), 1);
        let loaded = store.load("dishes")?.map(|a| a.n_items());
        assert_eq!(loaded, Some(4));
        Ok(())
    }
}
