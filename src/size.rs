const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human readable size in base-1024 units, two decimals at most.
///
/// `0` is spelled `"0 Bytes"`. Anything past the gigabyte range stays in GB.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut i = 0;
    while i + 1 < UNITS.len() && bytes >= 1024u64.pow(i as u32 + 1) {
        i += 1;
    }

    let scaled = bytes as f64 / 1024f64.powi(i as i32);
    let rounded = (scaled * 100.0).round() / 100.0;
    // f64 Display already drops trailing zeros ("1.5", "2")
    format!("{} {}", rounded, UNITS[i])
}
