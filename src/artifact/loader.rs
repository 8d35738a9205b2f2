//! Filesystem-backed artifact loading.
//!
//! An artifact folder carries a `manifest.json` naming the artifact, its
//! capability kind, and kind-specific parameters. Remote stores (buckets,
//! registries) plug in behind the same [`ArtifactLoader`] trait.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::{ArtifactHandle, ArtifactKind, Capability, Extension, Features, Predictor, Recommender};
use crate::error::{Error, Result};

/// Credentials for a remote artifact store.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

/// Resolves an artifact location into a loaded [`ArtifactHandle`].
#[async_trait]
pub trait ArtifactLoader: Send + Sync {
    /// Load the artifact stored at `location`.
    ///
    /// Fails with [`Error::ArtifactLoad`]; no partial handle is ever returned.
    async fn load(
        &self,
        location: &str,
        credentials: Option<&Credentials>,
    ) -> Result<ArtifactHandle>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    kind: ArtifactKind,
    #[serde(default)]
    pipeline: PipelineSpec,
    #[serde(default)]
    recommender: RecommenderSpec,
}

#[derive(Debug, Deserialize)]
struct PipelineSpec {
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    offset: f64,
}

impl Default for PipelineSpec {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            offset: 0.0,
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Default, Deserialize)]
struct RecommenderSpec {
    #[serde(default)]
    table: HashMap<String, Vec<String>>,
    #[serde(default)]
    fallback: Vec<String>,
}

/// Linear transform pipeline: `y = x * scale + offset` per feature.
struct LinearPipeline {
    scale: f64,
    offset: f64,
}

impl Predictor for LinearPipeline {
    fn predict(&self, features: &Features) -> Result<Features> {
        Ok(features.map(|x| x * self.scale + self.offset))
    }
}

/// Table-backed recommender with a fallback item list for unknown users.
struct LookupRecommender {
    table: HashMap<String, Vec<String>>,
    fallback: Vec<String>,
}

impl Recommender for LookupRecommender {
    fn recommend(&self, user: &str, limit: usize) -> Result<Vec<String>> {
        let items = self.table.get(user).unwrap_or(&self.fallback);
        Ok(items.iter().take(limit).cloned().collect())
    }
}

/// Extension that returns its input payload unchanged.
struct EchoExtension;

impl Extension for EchoExtension {
    fn extend(&self, input: &Value) -> Result<Value> {
        Ok(input.clone())
    }
}

/// Loads artifacts from a local folder containing `manifest.json`.
///
/// Every call reserves a unique staging directory (UUID-derived) for
/// transient loader state, so concurrent loads within one process never
/// collide; the directory is removed once the load completes.
pub struct FsLoader {
    staging_root: PathBuf,
}

impl FsLoader {
    pub fn new() -> Self {
        Self {
            staging_root: std::env::temp_dir(),
        }
    }

    pub fn with_staging_root(root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: root.into(),
        }
    }

    async fn load_from(&self, location: &Path) -> Result<ArtifactHandle> {
        let manifest_path = location.join("manifest.json");
        let raw = tokio::fs::read_to_string(&manifest_path).await.map_err(|e| {
            Error::ArtifactLoad(format!("cannot read {}: {}", manifest_path.display(), e))
        })?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .map_err(|e| Error::ArtifactLoad(format!("invalid manifest: {}", e)))?;

        let capability = match manifest.kind {
            ArtifactKind::Pipeline => Capability::Pipeline(Arc::new(LinearPipeline {
                scale: manifest.pipeline.scale,
                offset: manifest.pipeline.offset,
            })),
            ArtifactKind::Recommender => Capability::Recommender(Arc::new(LookupRecommender {
                table: manifest.recommender.table,
                fallback: manifest.recommender.fallback,
            })),
            ArtifactKind::Extension => Capability::Extension(Arc::new(EchoExtension)),
        };

        Ok(ArtifactHandle::new(manifest.name, capability))
    }
}

impl Default for FsLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactLoader for FsLoader {
    async fn load(
        &self,
        location: &str,
        _credentials: Option<&Credentials>,
    ) -> Result<ArtifactHandle> {
        if location.is_empty() {
            return Err(Error::ArtifactLoad("empty artifact location".into()));
        }

        let staging = self
            .staging_root
            .join(format!("modelgate-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| Error::ArtifactLoad(format!("cannot create staging dir: {}", e)))?;

        let result = self.load_from(Path::new(location)).await;

        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            tracing::debug!(path = %staging.display(), "staging cleanup failed: {}", e);
        }

        result
    }
}
