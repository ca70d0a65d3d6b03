use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageRequest {
    pub image_path: PathBuf,
    /// Declared media type; guessed from the extension when absent.
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StyleRequest {
    pub style: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationResponse {
    pub style: String,
    pub filename: String,
    pub markup: String,
}
