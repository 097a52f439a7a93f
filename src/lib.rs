pub mod background;
pub mod compressor;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod params;
pub mod port;
pub mod size;
pub mod wasm;

use std::path::Path;

use anyhow::{Context, Result};
use image::ImageFormat;

pub use compressor::{Compressor, ImageCompressor};
pub use error::{CompressError, OrchestratorError};
pub use model::{CompressionResult, CompressorOptions, SourceImage};
pub use orchestrator::{Command, Orchestrator};
pub use size::format_file_size;

/// Reads a file from disk the way a file picker would hand it over: name,
/// declared media type (from the extension) and contents.
pub fn load_source(path: &Path) -> Result<SourceImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let media_type = ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    Ok(SourceImage::new(name, media_type, bytes))
}
