//! Pluggable request decode / reply encode for the RPC surface.

use super::proto::{ClassificationReply, ClassificationRequest};
use crate::artifact::Features;
use crate::error::{Error, Result};

/// Decodes inbound payloads into feature inputs and encodes outputs into
/// replies.
///
/// Implementations must be stateless and `Send + Sync`; each service
/// constructs its own instance, selected explicitly at assembly time.
/// Substitute an implementation to carry custom tensor or feature formats
/// in the `custom_data` field.
pub trait DataHandler: Send + Sync {
    fn decode(&self, request: &ClassificationRequest) -> Result<Features>;

    fn encode(&self, model: &str, output: Features) -> Result<ClassificationReply>;
}

/// Default handler for the dense `features` vector encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDataHandler;

impl DataHandler for DefaultDataHandler {
    fn decode(&self, request: &ClassificationRequest) -> Result<Features> {
        if !request.custom_data.is_empty() {
            return Err(Error::Validation(
                "custom payloads require a custom data handler".into(),
            ));
        }
        if request.features.is_empty() {
            return Err(Error::Validation("empty feature vector".into()));
        }
        Ok(Features::Vector(request.features.clone()))
    }

    fn encode(&self, model: &str, output: Features) -> Result<ClassificationReply> {
        Ok(ClassificationReply {
            model: model.to_string(),
            values: output.to_vec(),
            custom_data: Vec::new(),
        })
    }
}
