//! Name recovery from the `{NAMELIST}` asset.
//!
//! Archives built by the game's packer may include an asset named
//! `{NAMELIST}` holding every packed asset name, one per line.

use forgepack_common::hash::hash_name;
use rustc_hash::FxHashMap;

/// Name of the asset that lists asset names.
pub const NAMELIST_NAME: &str = "{NAMELIST}";

/// Map from name hash back to asset name.
#[derive(Debug, Clone, Default)]
pub struct Namelist {
    names: FxHashMap<u64, String>,
}

impl Namelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse newline-separated names.
    ///
    /// Carriage returns are stripped and blank lines skipped. Lines that are
    /// not valid UTF-8 are decoded lossily; their hash then will not match.
    pub fn parse(data: &[u8]) -> Self {
        let mut list = Self::new();
        list.extend(
            data.split(|&b| b == b'\n')
                .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
                .filter(|line| !line.is_empty())
                .map(|line| String::from_utf8_lossy(line).into_owned()),
        );
        list
    }

    /// Add names, hashing each one.
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.names.insert(hash_name(&name), name);
        }
    }

    /// Merge another list into this one.
    pub fn merge(&mut self, other: Namelist) {
        self.names.extend(other.names);
    }

    /// Look up the name for a hash.
    #[inline]
    pub fn get(&self, hash: u64) -> Option<&str> {
        self.names.get(&hash).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        self.names.iter().map(|(&hash, name)| (hash, name.as_str()))
    }
}
