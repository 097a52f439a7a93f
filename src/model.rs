use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::size::format_file_size;

/// The image the user handed us, unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// Re-encoded output handed back by a compressor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Option object passed to the compressor. Field names follow the
/// browser-side compression library so the JSON can be handed to it as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressorOptions {
    #[serde(rename = "maxSizeMB")]
    pub max_size_mb: f64,
    pub quality: f64,
    pub max_width_or_height: u32,
    pub use_web_worker: bool,
    pub preserve_exif: bool,
    pub file_type: String,
}

impl CompressorOptions {
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * 1024.0 * 1024.0) as u64
    }

    /// Quality on the 1-100 scale the encoders expect.
    pub fn encoder_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// The artifact currently shown and offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionResult {
    PassThrough(SourceImage),
    Compressed(Artifact),
}

impl CompressionResult {
    pub fn bytes(&self) -> &[u8] {
        match self {
            CompressionResult::PassThrough(source) => &source.bytes,
            CompressionResult::Compressed(artifact) => &artifact.bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes().len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewKind {
    Original,
    Compressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKind {
    OriginalSize,
    CompressedSize,
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    Controls,
    Preview,
    Download,
}

/// What the page shows. Always derivable from the source and the current result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub controls_visible: bool,
    pub preview_visible: bool,
    pub download_visible: bool,
    pub original_size: Option<String>,
    pub compressed_size: Option<String>,
}

impl UiState {
    pub fn derive(source: Option<&SourceImage>, result: Option<&CompressionResult>) -> Self {
        let loaded = source.is_some();
        Self {
            controls_visible: loaded,
            preview_visible: loaded,
            download_visible: loaded,
            original_size: source.map(|s| format_file_size(s.size())),
            compressed_size: result.map(|r| format_file_size(r.size())),
        }
    }
}
