//! Raster to SVG vectorization through a generative vision model.
//!
//! An uploaded image is encoded by [`ImageEncoder`], paired with a
//! [`VectorStyle`] instruction into a [`GenerationRequest`], sent by a
//! [`GenerationClient`] (normally [`GeminiClient`]) on the
//! [`GenerationEngine`] worker, and the reply is reduced to a well-formed
//! document by [`extract_svg`]. [`Session`] ties the steps together and
//! tracks the [`ProcessingStatus`] shown to the user.

pub mod artifact;
pub mod client;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod model;
pub mod prompt;
pub mod sanitizer;
pub mod session;
pub mod style;

pub use artifact::SvgArtifact;
pub use client::{ClientConfig, GeminiClient};
pub use encoder::{EncodedImage, ImageEncoder, ImagePayload, MediaType, PreviewHandle, PreviewRegistry};
pub use engine::{EngineResponse, EngineResult, EngineState, GenerationEngine, GenerationResult};
pub use error::VectorizeError;
pub use model::GenerationClient;
pub use prompt::{DEFAULT_TEMPERATURE, GenerationRequest, SYSTEM_INSTRUCTION};
pub use sanitizer::extract_svg;
pub use session::{ProcessingStatus, Session};
pub use style::VectorStyle;
