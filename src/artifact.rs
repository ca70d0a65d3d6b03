use std::path::{Path, PathBuf};

pub const SVG_MIME: &str = "image/svg+xml";

/// Generated markup packaged for download or copying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SvgArtifact {
    markup: String,
    filename: String,
}

impl SvgArtifact {
    /// Names the artifact after the current time, `vector-art-<millis>.svg`.
    pub fn new(markup: impl Into<String>) -> Self {
        Self::with_timestamp(markup, chrono::Utc::now().timestamp_millis())
    }

    pub fn with_timestamp(markup: impl Into<String>, timestamp_millis: i64) -> Self {
        Self {
            markup: markup.into(),
            filename: format!("vector-art-{timestamp_millis}.svg"),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Text for the clipboard, identical to the markup.
    pub fn as_clipboard_text(&self) -> &str {
        &self.markup
    }

    /// Writes the markup into `dir` under the artifact's file name.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, self.markup.as_bytes())?;
        log::info!("Wrote {} ({} bytes)", path.display(), self.markup.len());
        Ok(path)
    }
}
