use crate::config::Settings;
use crate::model::{CompressorOptions, SourceImage};

/// Outcome of looking at a source before anything is re-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Too small to be worth it; the original is the result.
    Skip,
    Compress(CompressorOptions),
}

pub fn plan(source: &SourceImage, quality_percent: u8, settings: &Settings) -> Plan {
    if source.size() < settings.skip_below {
        return Plan::Skip;
    }
    Plan::Compress(derive_options(
        source.size(),
        &source.media_type,
        quality_percent,
        settings,
    ))
}

pub fn derive_options(
    size: u64,
    media_type: &str,
    quality_percent: u8,
    settings: &Settings,
) -> CompressorOptions {
    let max_size_mb = if size > settings.large_source {
        settings.large_target_mb
    } else {
        settings.small_target_mb
    };

    CompressorOptions {
        max_size_mb,
        quality: f64::from(quality_percent.min(100)) / 100.0,
        max_width_or_height: settings.max_width_or_height,
        use_web_worker: settings.use_web_worker,
        preserve_exif: settings.preserve_exif,
        file_type: media_type.to_string(),
    }
}
