//! Shared fixtures for integration tests.

#![allow(dead_code)]

use modelgate_core::artifact::{
    ArtifactHandle, Capability, Extension, Features, Predictor, Recommender,
};
use modelgate_core::error::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pipeline that doubles every input feature.
pub struct Doubling;

impl Predictor for Doubling {
    fn predict(&self, features: &Features) -> Result<Features> {
        Ok(features.map(|x| x * 2.0))
    }
}

/// Pipeline that fails every invocation.
pub struct Failing;

impl Predictor for Failing {
    fn predict(&self, _features: &Features) -> Result<Features> {
        Err(Error::Inference("model exploded".into()))
    }
}

/// Pipeline that sleeps before answering; used by drain and worker-bound
/// tests.
pub struct Slow {
    pub delay: Duration,
}

impl Predictor for Slow {
    fn predict(&self, features: &Features) -> Result<Features> {
        std::thread::sleep(self.delay);
        Ok(features.map(|x| x * 2.0))
    }
}

/// Recommender returning a fixed item list and counting invocations.
pub struct CountingRecommender {
    pub calls: AtomicUsize,
    items: Vec<String>,
}

impl CountingRecommender {
    pub fn new(items: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            items: items.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recommender for CountingRecommender {
    fn recommend(&self, _user: &str, limit: usize) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.items.iter().take(limit).cloned().collect())
    }
}

pub fn pipeline_handle(name: &str, predictor: Arc<dyn Predictor>) -> Arc<ArtifactHandle> {
    Arc::new(ArtifactHandle::new(name, Capability::Pipeline(predictor)))
}

pub fn recommender_handle(name: &str, recommender: Arc<dyn Recommender>) -> Arc<ArtifactHandle> {
    Arc::new(ArtifactHandle::new(
        name,
        Capability::Recommender(recommender),
    ))
}

/// Extension that wraps its input under an `"echo"` key.
pub struct WrappingExtension;

impl Extension for WrappingExtension {
    fn extend(&self, input: &Value) -> Result<Value> {
        Ok(serde_json::json!({"echo": input}))
    }
}

pub fn extension_handle(name: &str, extension: Arc<dyn Extension>) -> Arc<ArtifactHandle> {
    Arc::new(ArtifactHandle::new(name, Capability::Extension(extension)))
}
