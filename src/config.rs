pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * 1024;

pub const DEFAULT_QUALITY: u8 = 60;

/// Thresholds and fixed parameters used when deriving compressor options.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Files strictly below this size are never re-encoded.
    pub skip_below: u64,
    /// Files strictly above this size get `large_target_mb` as their ceiling.
    pub large_source: u64,
    pub large_target_mb: f64,
    pub small_target_mb: f64,
    pub max_width_or_height: u32,
    pub use_web_worker: bool,
    pub preserve_exif: bool,
    pub initial_quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            skip_below: 50 * KIB,
            large_source: MIB,
            large_target_mb: 1.0,
            small_target_mb: 0.5,
            max_width_or_height: 2048,
            use_web_worker: true,
            preserve_exif: false,
            initial_quality: DEFAULT_QUALITY,
        }
    }
}
