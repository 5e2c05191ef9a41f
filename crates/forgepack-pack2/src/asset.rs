//! Asset decode sessions.

use std::fmt;
use std::sync::OnceLock;

use bytes::Bytes;

use crate::decompress::{decode_with, declared_size, Inflate, ZlibInflater};
use crate::format::AssetRecord;
use crate::pack::Pack2;
use crate::{DecodeError, Result};

/// One asset pulled out of an archive buffer.
///
/// The payload is a zero-copy slice of the archive buffer and keeps that
/// buffer alive. Decoded bytes are computed on the first call to
/// [`Asset::data`] and returned from the cache afterwards.
pub struct Asset {
    record: AssetRecord,
    name: Option<String>,
    payload: Bytes,
    decoded: OnceLock<Vec<u8>>,
}

impl Asset {
    /// Create an asset from a record and its stored payload.
    pub fn new(record: AssetRecord, name: Option<String>, payload: Bytes) -> Self {
        Self {
            record,
            name,
            payload,
            decoded: OnceLock::new(),
        }
    }

    /// Slice the payload of `record` out of an archive buffer.
    pub fn from_buffer(record: AssetRecord, name: Option<String>, buffer: &Bytes) -> Result<Self> {
        let range = Pack2::payload_range(&record, buffer.len())?;
        Ok(Self::new(record, name, buffer.slice(range)))
    }

    /// The table record this asset was created from.
    #[inline]
    pub fn record(&self) -> &AssetRecord {
        &self.record
    }

    /// The name used to look the asset up, if known.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn name_hash(&self) -> u64 {
        self.record.name_hash
    }

    /// Stored payload length from the table.
    #[inline]
    pub fn length(&self) -> u64 {
        self.record.data_length
    }

    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.record.is_compressed()
    }

    /// Size of the asset once decoded.
    pub fn uncompressed_size(&self) -> std::result::Result<u64, DecodeError> {
        if self.is_compressed() {
            declared_size(&self.payload).map(u64::from)
        } else {
            Ok(self.record.data_length)
        }
    }

    /// The stored payload, without decompression.
    #[inline]
    pub fn raw(&self) -> &[u8] {
        &self.payload
    }

    /// Whether decoded bytes are already cached.
    #[inline]
    pub fn is_decoded(&self) -> bool {
        self.decoded.get().is_some()
    }

    /// Decoded asset bytes.
    pub fn data(&self) -> std::result::Result<&[u8], DecodeError> {
        self.data_with(&ZlibInflater)
    }

    /// Decoded asset bytes, inflating with `inflater` on a cache miss.
    pub fn data_with(&self, inflater: &dyn Inflate) -> std::result::Result<&[u8], DecodeError> {
        if let Some(data) = self.decoded.get() {
            return Ok(data);
        }

        let data = decode_with(&self.record, &self.payload, inflater)?;
        Ok(self.decoded.get_or_init(|| data))
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("name", &self.name)
            .field("name_hash", &format_args!("{:#018x}", self.record.name_hash))
            .field("length", &self.record.data_length)
            .field("zipped", &self.record.zipped)
            .field("decoded", &self.is_decoded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::writer::PackBuilder;

    /// Counts calls before delegating to zlib.
    #[derive(Default)]
    struct CountingInflater {
        calls: AtomicUsize,
    }

    impl Inflate for CountingInflater {
        fn inflate(&self, input: &[u8], output: &mut [u8]) -> std::result::Result<usize, DecodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ZlibInflater.inflate(input, output)
        }
    }

    fn load(name: &str) -> Asset {
        let original: Vec<u8> = (0..100u8).map(|b| b.wrapping_mul(3)).collect();
        let buffer = Bytes::from(
            PackBuilder::new()
                .raw("A", b"hello")
                .compressed("B", &original)
                .build()
                .unwrap(),
        );
        let pack = Pack2::parse(&buffer).unwrap();
        let record = pack.lookup(&buffer, name).unwrap();
        Asset::from_buffer(record, Some(name.to_string()), &buffer).unwrap()
    }

    #[test]
    fn test_raw_asset() {
        let asset = load("A");

        assert_eq!(asset.name(), Some("A"));
        assert!(!asset.is_compressed());
        assert_eq!(asset.uncompressed_size().unwrap(), 5);
        assert_eq!(asset.raw(), b"hello");
        assert_eq!(asset.data().unwrap(), b"hello");
    }

    #[test]
    fn test_compressed_asset() {
        let asset = load("B");

        assert!(asset.is_compressed());
        assert_eq!(asset.uncompressed_size().unwrap(), 100);
        assert_eq!(asset.raw().len() as u64, asset.length());

        let data = asset.data().unwrap();
        assert_eq!(data.len(), 100);
        assert_eq!(data[1], 3);
    }

    #[test]
    fn test_decode_is_memoized() {
        let asset = load("B");
        let counter = CountingInflater::default();

        let first = asset.data_with(&counter).unwrap().to_vec();
        assert!(asset.is_decoded());
        let second = asset.data_with(&counter).unwrap();
        let third = asset.data().unwrap();

        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_failed_decode_is_not_cached() {
        let mut record = *load("A").record();
        record.zipped = 1;
        let asset = Asset::new(record, None, Bytes::from_static(b"hello"));

        assert!(asset.data().is_err());
        assert!(!asset.is_decoded());
    }

    #[test]
    fn test_payload_outside_buffer() {
        let record = AssetRecord {
            offset: 4,
            data_length: 10,
            ..AssetRecord::default()
        };
        assert!(Asset::from_buffer(record, None, &Bytes::from_static(b"short")).is_err());
    }
}
