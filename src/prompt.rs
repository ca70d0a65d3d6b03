use crate::{encoder::ImagePayload, style::VectorStyle};

/// Low sampling temperature keeps the generated markup precise.
pub const DEFAULT_TEMPERATURE: f32 = 0.4;

/// Style independent instruction attached to every request.
pub const SYSTEM_INSTRUCTION: &str = "\
You are an expert technical vector artist and SVG coder. Your task is to convert raster images into clean, optimized, and scalable SVG code.
1. Return ONLY the raw SVG code. Do not wrap it in markdown code blocks (e.g., ```xml). Do not add any conversational text.
2. The SVG must be self-contained. DO NOT use <img> tags with base64 data or external links. You must draw the image using <path>, <rect>, <circle>, <polygon>, etc.
3. Use the 'viewBox' attribute correctly to match the aspect ratio of the source image.
4. Optimize the code for size where possible, but prioritize visual fidelity to the requested style.
";

/// Everything needed for one generation call.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub payload: ImagePayload,
    pub style: VectorStyle,
    pub system_instruction: &'static str,
    pub user_instruction: &'static str,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(payload: ImagePayload, style: VectorStyle) -> Self {
        Self {
            payload,
            style,
            system_instruction: SYSTEM_INSTRUCTION,
            user_instruction: style.prompt(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}
