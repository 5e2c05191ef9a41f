//! Human-readable byte counts.

const SUFFIXES: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];

/// Format a byte count with two decimals and a binary suffix.
///
/// Counts up to and including 1024 are printed in bytes.
///
/// ```
/// use forgepack_common::size::human_bytes;
///
/// assert_eq!(human_bytes(512), "512.00B");
/// assert_eq!(human_bytes(1536), "1.50KiB");
/// ```
pub fn human_bytes(count: u64) -> String {
    let mut value = count as f64;
    let mut suffix = 0;

    if count > 1024 {
        while value >= 1024.0 && suffix < SUFFIXES.len() - 1 {
            value /= 1024.0;
            suffix += 1;
        }
    }

    format!("{:.2}{}", value, SUFFIXES[suffix])
}
