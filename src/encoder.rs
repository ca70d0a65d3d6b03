use crate::error::VectorizeError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::{
    collections::HashMap,
    fmt,
    path::Path,
    sync::{Arc, Mutex},
};

const PREVIEW_SCHEME: &str = "preview://";

/// Image media types accepted for vectorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
}

impl MediaType {
    /// Parses a declared MIME type such as `image/png`.
    ///
    /// Matching is case-insensitive and ignores parameters after `;`.
    pub fn from_mime(mime: &str) -> Result<Self, VectorizeError> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Ok(MediaType::Jpeg),
            "image/png" => Ok(MediaType::Png),
            "image/webp" => Ok(MediaType::Webp),
            _ => Err(VectorizeError::UnsupportedMediaType(mime.to_string())),
        }
    }

    /// Guesses the media type from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, VectorizeError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .ok_or_else(|| VectorizeError::UnsupportedMediaType(path.display().to_string()))?;

        match extension.as_str() {
            "jpg" | "jpeg" => Ok(MediaType::Jpeg),
            "png" => Ok(MediaType::Png),
            "webp" => Ok(MediaType::Webp),
            _ => Err(VectorizeError::UnsupportedMediaType(format!(
                "unrecognized extension .{extension}"
            ))),
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// An image ready to be sent to the generation service.
///
/// The encoded form is a data URL (`data:<mime>;base64,<data>`) built once
/// from the raw bytes; the payload cannot be modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePayload {
    raw_bytes: Arc<[u8]>,
    media_type: MediaType,
    encoded_data: String,
}

impl ImagePayload {
    /// Builds a payload from in-memory bytes and their declared MIME type.
    ///
    /// The declared type is checked before the bytes are touched.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, declared_mime: &str) -> Result<Self, VectorizeError> {
        let media_type = MediaType::from_mime(declared_mime)?;
        Ok(Self::encode(bytes.into(), media_type))
    }

    /// Reads an image file and builds its payload.
    ///
    /// Without a declared MIME type the type is guessed from the extension.
    /// Either way an unsupported type fails before the file is opened.
    pub fn from_path(path: impl AsRef<Path>, declared_mime: Option<&str>) -> Result<Self, VectorizeError> {
        let path = path.as_ref();
        let media_type = match declared_mime {
            Some(mime) => MediaType::from_mime(mime)?,
            None => MediaType::from_path(path)?,
        };

        let bytes = std::fs::read(path)?;
        log::debug!("Read {} bytes of {} from {}", bytes.len(), media_type, path.display());

        Ok(Self::encode(bytes, media_type))
    }

    fn encode(bytes: Vec<u8>, media_type: MediaType) -> Self {
        let encoded_data = format!("data:{};base64,{}", media_type.as_mime(), STANDARD.encode(&bytes));
        Self {
            raw_bytes: bytes.into(),
            media_type,
            encoded_data,
        }
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn mime_type(&self) -> &'static str {
        self.media_type.as_mime()
    }

    /// The data URL form, metadata prefix included.
    pub fn encoded_data(&self) -> &str {
        &self.encoded_data
    }

    /// The bare base64 body, as transmitted to the service.
    pub fn base64_data(&self) -> &str {
        strip_data_url_prefix(&self.encoded_data)
    }
}

/// Removes a leading `data:...,` prefix if present.
///
/// Bare base64 input is returned unchanged apart from surrounding whitespace.
pub fn strip_data_url_prefix(encoded: &str) -> &str {
    let encoded = encoded.trim();
    if encoded.starts_with("data:") {
        if let Some((_, data)) = encoded.split_once(',') {
            return data;
        }
    }
    encoded
}

/// Decodes an encoded payload back into bytes, with or without prefix.
pub fn decode_encoded_data(encoded: &str) -> Result<Vec<u8>, VectorizeError> {
    STANDARD
        .decode(strip_data_url_prefix(encoded))
        .map_err(|e| VectorizeError::InvalidEncoding(e.to_string()))
}

#[derive(Default)]
struct PreviewEntries {
    next_id: u64,
    entries: HashMap<u64, (MediaType, Arc<[u8]>)>,
}

/// Local registry of preview references.
///
/// Each registered image is addressable as `preview://<id>` until its
/// [`PreviewHandle`] is dropped.
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<PreviewEntries>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the payload bytes and returns the handle that owns the entry.
    pub fn acquire(&self, payload: &ImagePayload) -> PreviewHandle {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .entries
            .insert(id, (payload.media_type, payload.raw_bytes.clone()));

        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    /// Resolves a `preview://<id>` reference or a bare id.
    pub fn lookup(&self, reference: &str) -> Option<(MediaType, Arc<[u8]>)> {
        let id = reference
            .strip_prefix(PREVIEW_SCHEME)
            .unwrap_or(reference)
            .parse::<u64>()
            .ok()?;
        self.lock().entries.get(&id).cloned()
    }

    /// Number of preview references currently alive.
    pub fn live_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn release(&self, id: u64) {
        if self.lock().entries.remove(&id).is_some() {
            log::debug!("Released preview {PREVIEW_SCHEME}{id}");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PreviewEntries> {
        // entries stay consistent even if a holder panicked
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns one preview reference; the reference is revoked on drop.
pub struct PreviewHandle {
    id: u64,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> String {
        format!("{PREVIEW_SCHEME}{}", self.id)
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewHandle").field(&self.url()).finish()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

/// A payload together with the preview reference allocated for it.
#[derive(Debug)]
pub struct EncodedImage {
    pub payload: ImagePayload,
    pub preview: PreviewHandle,
}

/// Turns user supplied image files into payloads plus preview references.
#[derive(Clone, Default)]
pub struct ImageEncoder {
    previews: PreviewRegistry,
}

impl ImageEncoder {
    pub fn new(previews: PreviewRegistry) -> Self {
        Self { previews }
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn encode_bytes(
        &self,
        bytes: impl Into<Vec<u8>>,
        declared_mime: &str,
    ) -> Result<EncodedImage, VectorizeError> {
        let payload = ImagePayload::from_bytes(bytes, declared_mime)?;
        Ok(self.with_preview(payload))
    }

    pub fn encode_path(
        &self,
        path: impl AsRef<Path>,
        declared_mime: Option<&str>,
    ) -> Result<EncodedImage, VectorizeError> {
        let payload = ImagePayload::from_path(path, declared_mime)?;
        Ok(self.with_preview(payload))
    }

    fn with_preview(&self, payload: ImagePayload) -> EncodedImage {
        let preview = self.previews.acquire(&payload);
        log::info!(
            "Encoded {} image ({} bytes) as {}",
            payload.media_type,
            payload.raw_bytes.len(),
            preview.url()
        );
        EncodedImage { payload, preview }
    }
}
