use crate::{error::VectorizeError, prompt::GenerationRequest};

/// A generative vision backend that turns a request into raw reply text.
///
/// Implementations perform at most one attempt per call and report missing
/// text as an empty string rather than an error.
pub trait GenerationClient {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String, VectorizeError>;
}

impl<F> GenerationClient for F
where
    F: FnMut(&GenerationRequest) -> Result<String, VectorizeError>,
{
    fn generate(&mut self, request: &GenerationRequest) -> Result<String, VectorizeError> {
        self(request)
    }
}
