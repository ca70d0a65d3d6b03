//! Extraction of an SVG document from free-form model output.
//!
//! Models frequently ignore the "raw markup only" instruction and wrap the
//! document in markdown fences or surround it with prose. The extraction
//! below is a span heuristic, not a parser: it keeps everything from the
//! first `<svg` to the last `</svg>`. Two sibling documents in one reply are
//! therefore merged into a single span.

use crate::error::VectorizeError;

const FENCE: &str = "```";
const SVG_OPEN: &str = "<svg";
const SVG_CLOSE: &str = "</svg>";

/// Returns the `<svg>...</svg>` span contained in `raw`.
///
/// Fails with [`VectorizeError::MalformedResponse`] unless both the opening
/// and the closing root tag are present, in that order.
pub fn extract_svg(raw: &str) -> Result<String, VectorizeError> {
    let text = strip_fences(raw.trim());

    let start = text.find(SVG_OPEN).ok_or(VectorizeError::MalformedResponse)?;
    let end = text
        .rfind(SVG_CLOSE)
        .map(|index| index + SVG_CLOSE.len())
        .filter(|&end| end > start + SVG_OPEN.len())
        .ok_or(VectorizeError::MalformedResponse)?;

    Ok(text[start..end].to_string())
}

/// Drops a leading markdown fence (with an optional language tag) and the
/// closing fence at the end, if any.
fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };

    // the language tag runs up to the first newline, e.g. "xml" or "svg"
    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '+'))
        .unwrap_or(rest.len());
    let after_tag = &rest[tag_len..];
    let body = match after_tag.strip_prefix("\r\n").or_else(|| after_tag.strip_prefix('\n')) {
        Some(body) => body,
        // no newline after the tag: the fence opens inline
        None if tag_len == 0 => after_tag,
        None => rest,
    };

    let body = body.strip_suffix(FENCE).unwrap_or(body);
    body.strip_suffix('\n')
        .map(|b| b.strip_suffix('\r').unwrap_or(b))
        .unwrap_or(body)
        .trim()
}
