use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader};
use log::{debug, warn};

use crate::error::CompressError;
use crate::model::{Artifact, CompressorOptions, SourceImage};

/// The re-encoding collaborator. The orchestrator only looks at Ok/Err.
pub trait Compressor {
    fn compress(
        &self,
        source: &SourceImage,
        options: &CompressorOptions,
    ) -> Result<Artifact, CompressError>;
}

/// Decodes, orients, downsizes and re-encodes in the source format.
///
/// The size ceiling is soft: when the first encode is over it, the
/// dimensions shrink by `shrink_factor` up to `max_attempts` times. Quality
/// is never touched. Metadata is never written back.
#[derive(Debug, Clone)]
pub struct ImageCompressor {
    pub shrink_factor: f32,
    pub max_attempts: u32,
}

impl Default for ImageCompressor {
    fn default() -> Self {
        Self {
            shrink_factor: 0.8,
            max_attempts: 6,
        }
    }
}

impl Compressor for ImageCompressor {
    fn compress(
        &self,
        source: &SourceImage,
        options: &CompressorOptions,
    ) -> Result<Artifact, CompressError> {
        let format = ImageFormat::from_mime_type(&options.file_type)
            .filter(|f| f.reading_enabled() && f.writing_enabled())
            .ok_or_else(|| CompressError::UnsupportedType(options.file_type.clone()))?;

        if options.preserve_exif {
            warn!("EXIF preservation requested but re-encoded output never carries metadata");
        }

        let img = decode_upright(&source.bytes, format)?;

        let max_dim = options.max_width_or_height;
        let mut img = if img.width() > max_dim || img.height() > max_dim {
            let resized = img.resize(max_dim, max_dim, FilterType::Lanczos3);
            debug!(
                "resize {}x{} -> {}x{}",
                img.width(),
                img.height(),
                resized.width(),
                resized.height()
            );
            resized
        } else {
            img
        };

        let quality = options.encoder_quality();
        let ceiling = options.max_size_bytes();
        let mut bytes = encode(&img, format, quality)?;

        let mut attempt = 0;
        while bytes.len() as u64 > ceiling && attempt < self.max_attempts {
            let (w, h) = img.dimensions();
            let nw = ((w as f32 * self.shrink_factor) as u32).max(1);
            let nh = ((h as f32 * self.shrink_factor) as u32).max(1);
            if (nw, nh) == (w, h) {
                break;
            }
            debug!(
                "{} bytes over ceiling of {}, shrinking to {}x{}",
                bytes.len(),
                ceiling,
                nw,
                nh
            );
            img = img.resize_exact(nw, nh, FilterType::Lanczos3);
            bytes = encode(&img, format, quality)?;
            attempt += 1;
        }

        Ok(Artifact { bytes })
    }
}

/// Decodes and bakes the EXIF orientation into the pixels, since the
/// re-encoded file carries no EXIF block telling viewers how to rotate it.
fn decode_upright(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, CompressError> {
    let mut decoder = ImageReader::with_format(Cursor::new(bytes), format)
        .into_decoder()
        .map_err(CompressError::Decode)?;
    let orientation = decoder.orientation().unwrap_or_else(|e| {
        warn!("ignoring unreadable orientation: {}", e);
        Orientation::NoTransforms
    });
    let mut img = DynamicImage::from_decoder(decoder).map_err(CompressError::Decode)?;
    if orientation != Orientation::NoTransforms {
        debug!("applying {:?}", orientation);
        img.apply_orientation(orientation);
    }
    Ok(img)
}

fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, CompressError> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            img.to_rgb8()
                .write_with_encoder(encoder)
                .map_err(CompressError::Encode)?;
        }
        // The image crate's PNG/WebP encoders are lossless, quality does not apply.
        _ => img.write_to(&mut buf, format).map_err(CompressError::Encode)?,
    }
    Ok(buf.into_inner())
}
