//! Bulk export of assets by content signature.

use std::borrow::Cow;

/// Default output directory for [`Manager::export_by_magic`](crate::Manager::export_by_magic).
pub const DEFAULT_EXPORT_DIR: &str = "export";

/// Default file extension for exported assets.
pub const DEFAULT_EXPORT_EXT: &str = ".bin";

/// Counters reported by an export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ExportStats {
    /// Resident archives that were scanned.
    pub archives: usize,
    /// Assets with a non-empty payload that were checked.
    pub scanned: u64,
    /// Assets whose bytes start with the signature.
    pub matched: u64,
    /// Files written.
    pub written: u64,
    /// Assets that failed to decode or write.
    pub errors: u64,
}

/// Ensure the extension starts with a dot; an empty one stays empty.
pub(crate) fn normalize_extension(extension: &str) -> Cow<'_, str> {
    if extension.is_empty() || extension.starts_with('.') {
        Cow::Borrowed(extension)
    } else {
        Cow::Owned(format!(".{extension}"))
    }
}

/// File name for an exported asset.
pub(crate) fn export_file_name(name_hash: u64, extension: &str) -> String {
    format!("{name_hash}{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".bin"), ".bin");
        assert_eq!(normalize_extension("dds"), ".dds");
        assert_eq!(normalize_extension(""), "");
    }

    #[test]
    fn test_file_name_is_decimal() {
        assert_eq!(
            export_file_name(0x4137_cc65_bd97_fd30, DEFAULT_EXPORT_EXT),
            "4699449473529019696.bin"
        );
    }
}
