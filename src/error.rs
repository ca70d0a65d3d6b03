/// Every failure the vectorize pipeline can report.
///
/// The display strings are user facing: the session stores them verbatim as
/// the last error of a generation cycle.
#[derive(Debug, thiserror::Error)]
pub enum VectorizeError {
    /// The declared media type of the input is not a supported image type.
    #[error("Please upload an image file (JPG, PNG, WEBP). Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// No API credential is configured in the process environment.
    #[error("API Key is missing. Please check your environment configuration.")]
    MissingCredential,

    /// Transport or service failure, carrying the underlying cause.
    #[error("{0}")]
    GenerationFailed(String),

    /// The model reply could not be reduced to a complete SVG document.
    #[error("The AI failed to generate valid SVG code. Please try a different image or style.")]
    MalformedResponse,

    /// The encoded payload is not valid base64.
    #[error("Invalid image encoding: {0}")]
    InvalidEncoding(String),

    /// A style name that matches none of the presets.
    #[error("Unknown style: {0}")]
    UnknownStyle(String),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
}
