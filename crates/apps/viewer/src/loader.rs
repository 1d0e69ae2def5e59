use std::path::PathBuf;

use catalog::{
    LoadError, LoadResult, Model, ModelFactory, StratumLoader, StratumWriter, TraitDef,
    group_schema, imagery_schema,
};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::task::SpawnError;
use runtime::LocalExecutor;
use serde_json::Value;

/// Source stratum holding metadata read from disk.
pub const METADATA_STRATUM: &str = "metadata";

/// Trait naming the metadata file of an item, relative to the init file.
pub const METADATA_URL: &str = "metadataUrl";

pub fn viewer_factory() -> ModelFactory {
    let mut factory = ModelFactory::new();
    factory.register(group_schema());
    factory.register(imagery_schema().with_trait(TraitDef::primitive(
        METADATA_URL,
        "JSON file with extra trait values for this item.",
    )));
    factory
}

/// Runs loads on the current `LocalSet`.
pub struct TokioLocal;

impl LocalExecutor for TokioLocal {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), SpawnError> {
        tokio::task::spawn_local(task);
        Ok(())
    }
}

/// Reads an item's `metadataUrl` file and applies its fields as traits.
pub struct FileMetadataLoader {
    model: Model,
    base_dir: PathBuf,
}

impl FileMetadataLoader {
    pub fn new(model: Model, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            model,
            base_dir: base_dir.into(),
        }
    }
}

impl StratumLoader for FileMetadataLoader {
    type Output = Value;

    fn load(&self) -> LocalBoxFuture<'static, Result<Value, LoadError>> {
        let url = self.model.get::<String>(METADATA_URL);
        let base_dir = self.base_dir.clone();
        async move {
            let url = url.ok_or_else(|| LoadError::new("item has no metadataUrl"))?;
            let path = base_dir.join(url);
            let bytes = tokio::fs::read(&path).await.map_err(|err| {
                LoadError::with_source(format!("could not read {}", path.display()), err)
            })?;
            serde_json::from_slice(&bytes).map_err(|err| {
                LoadError::with_source(format!("could not parse {}", path.display()), err)
            })
        }
        .boxed_local()
    }

    fn apply_load(&self, output: Value, writer: &mut StratumWriter) -> LoadResult {
        let Value::Object(fields) = output else {
            return Err(LoadError::new("metadata must be a JSON object"));
        };
        for (key, value) in fields {
            if writer.contains(&key) {
                writer.set(&key, value)?;
            } else {
                tracing::warn!(model = %self.model.unique_id(), key = %key, "ignoring unknown metadata key");
            }
        }
        Ok(())
    }
}
