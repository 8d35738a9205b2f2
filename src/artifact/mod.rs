//! Loaded inference artifacts and their capabilities.
//!
//! An artifact is a trained, ready-to-invoke object: a prediction pipeline,
//! a recommender, or a user-defined extension. The gateway never looks inside
//! an artifact; it holds one [`ArtifactHandle`] for the lifetime of a service
//! and shares it read-only across all concurrent request handlers.

mod loader;

pub use loader::{ArtifactLoader, Credentials, FsLoader};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Feature input/output for the prediction path.
///
/// Scalar and vector shapes round-trip unchanged: a scalar input produces a
/// scalar output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Features {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Features {
    /// Apply an element-wise transform, preserving shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Features {
        match self {
            Features::Scalar(x) => Features::Scalar(f(*x)),
            Features::Vector(xs) => Features::Vector(xs.iter().copied().map(f).collect()),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Features::Scalar(x) => vec![*x],
            Features::Vector(xs) => xs.clone(),
        }
    }
}

impl From<Vec<f64>> for Features {
    fn from(values: Vec<f64>) -> Self {
        Features::Vector(values)
    }
}

/// A trained pipeline that maps a feature input to a prediction.
///
/// Invocation is a pure read of trained state; implementations must tolerate
/// concurrent calls. An implementation that is not inherently safe must
/// serialize internally.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &Features) -> Result<Features>;
}

/// A trained recommender that scores items for a user.
pub trait Recommender: Send + Sync {
    fn recommend(&self, user: &str, limit: usize) -> Result<Vec<String>>;
}

/// A user-defined extension invoked with a free-form JSON payload.
pub trait Extension: Send + Sync {
    fn extend(&self, input: &Value) -> Result<Value>;
}

/// The capability class an artifact provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Pipeline,
    Recommender,
    Extension,
}

/// The artifact's single capability.
#[derive(Clone)]
pub enum Capability {
    Pipeline(Arc<dyn Predictor>),
    Recommender(Arc<dyn Recommender>),
    Extension(Arc<dyn Extension>),
}

/// An opaque, already-loaded inference artifact plus its metadata.
///
/// Immutable after load.
#[derive(Clone)]
pub struct ArtifactHandle {
    name: String,
    capability: Capability,
}

impl fmt::Debug for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactHandle")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

impl ArtifactHandle {
    pub fn new(name: impl Into<String>, capability: Capability) -> Self {
        Self {
            name: name.into(),
            capability,
        }
    }

    /// The model name reported in responses.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        match self.capability {
            Capability::Pipeline(_) => ArtifactKind::Pipeline,
            Capability::Recommender(_) => ArtifactKind::Recommender,
            Capability::Extension(_) => ArtifactKind::Extension,
        }
    }

    /// Replace the reported model name, keeping the loaded artifact.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn predict(&self, features: &Features) -> Result<Features> {
        match &self.capability {
            Capability::Pipeline(p) => p.predict(features),
            _ => Err(Error::Inference(format!(
                "artifact '{}' has no prediction capability",
                self.name
            ))),
        }
    }

    pub fn recommend(&self, user: &str, limit: usize) -> Result<Vec<String>> {
        match &self.capability {
            Capability::Recommender(r) => r.recommend(user, limit),
            _ => Err(Error::Inference(format!(
                "artifact '{}' has no recommendation capability",
                self.name
            ))),
        }
    }

    pub fn extend(&self, input: &Value) -> Result<Value> {
        match &self.capability {
            Capability::Extension(e) => e.extend(input),
            _ => Err(Error::Inference(format!(
                "artifact '{}' has no extension capability",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl Predictor for Doubler {
        fn predict(&self, features: &Features) -> Result<Features> {
            Ok(features.map(|x| x * 2.0))
        }
    }

    #[test]
    fn test_scalar_shape_preserved() {
        let handle = ArtifactHandle::new("double", Capability::Pipeline(Arc::new(Doubler)));
        let out = handle.predict(&Features::Scalar(21.0)).unwrap();
        assert_eq!(out, Features::Scalar(42.0));
    }

    #[test]
    fn test_vector_shape_preserved() {
        let handle = ArtifactHandle::new("double", Capability::Pipeline(Arc::new(Doubler)));
        let out = handle.predict(&Features::Vector(vec![1.0, 2.0])).unwrap();
        assert_eq!(out, Features::Vector(vec![2.0, 4.0]));
    }

    #[test]
    fn test_capability_mismatch_is_inference_error() {
        let handle = ArtifactHandle::new("double", Capability::Pipeline(Arc::new(Doubler)));
        assert!(matches!(
            handle.recommend("user", 5),
            Err(Error::Inference(_))
        ));
    }
}
