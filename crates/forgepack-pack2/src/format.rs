//! On-disk pack2 structures.
//!
//! All multi-byte integers in the header and asset table are little-endian.
//! The raw structs use zerocopy's byte-order types so they have alignment 1
//! and can be viewed directly over an unaligned file buffer.

use std::ops::Range;

use forgepack_common::BinaryReader;
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{Error, Result};

/// Magic tag at offset 0 of every pack2 file.
pub const MAGIC: [u8; 4] = *b"PAK\x01";

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = std::mem::size_of::<RawPackHeader>();

/// Size of one asset table record in bytes.
pub const RECORD_SIZE: usize = std::mem::size_of::<RawAssetRecord>();

/// `zipped` values that mark a zlib payload. No other distinction between
/// them is known.
const ZIPPED_FLAGS: [u32; 2] = [1, 17];

/// pack2 file header as stored on disk.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct RawPackHeader {
    /// Magic tag, `PAK\x01`.
    pub magic: [u8; 4],
    /// Number of records in the asset table.
    pub asset_count: U32,
    /// Total archive length. Informational only.
    pub length: U64,
    /// Offset of the asset table.
    pub map_offset: U64,
}

/// Asset table record as stored on disk.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct RawAssetRecord {
    pub name_hash: U64,
    pub offset: U64,
    pub data_length: U64,
    pub zipped: U32,
    pub data_hash: U32,
}

/// Parsed pack2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PackHeader {
    /// Number of records in the asset table.
    pub asset_count: u32,
    /// Total archive length as recorded by the writer.
    pub length: u64,
    /// Offset of the asset table.
    pub map_offset: u64,
}

impl PackHeader {
    /// Parse and validate the header at the start of `buffer`.
    ///
    /// The magic is checked before any other field, so a foreign file
    /// always reports [`Error::BadMagic`] regardless of its length past
    /// the first four bytes.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(buffer);

        let magic: [u8; 4] = reader
            .read_array()
            .map_err(|_| Error::out_of_range("magic", 0, MAGIC.len() as u64, buffer.len()))?;
        if magic != MAGIC {
            return Err(Error::BadMagic { actual: magic });
        }

        reader.seek(0);
        let raw: RawPackHeader = reader
            .read_struct()
            .map_err(|_| Error::out_of_range("header", 0, HEADER_SIZE as u64, buffer.len()))?;

        Ok(Self::from(&raw))
    }

    /// Byte range of the asset table, or `None` if it overflows `u64`.
    pub fn table_range(&self) -> Option<Range<u64>> {
        let len = (self.asset_count as u64).checked_mul(RECORD_SIZE as u64)?;
        let end = self.map_offset.checked_add(len)?;
        Some(self.map_offset..end)
    }
}

impl From<&RawPackHeader> for PackHeader {
    fn from(raw: &RawPackHeader) -> Self {
        Self {
            asset_count: raw.asset_count.get(),
            length: raw.length.get(),
            map_offset: raw.map_offset.get(),
        }
    }
}

impl From<&PackHeader> for RawPackHeader {
    fn from(header: &PackHeader) -> Self {
        Self {
            magic: MAGIC,
            asset_count: U32::new(header.asset_count),
            length: U64::new(header.length),
            map_offset: U64::new(header.map_offset),
        }
    }
}

/// A decoded copy of one asset table record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AssetRecord {
    /// Hash of the uppercased asset name.
    pub name_hash: u64,
    /// Offset of the payload within the archive.
    pub offset: u64,
    /// Stored payload length, including the compression sub-header.
    pub data_length: u64,
    /// Compression marker: 0 for raw, 1 or 17 for zlib.
    pub zipped: u32,
    /// Checksum written by the packer. Never verified.
    pub data_hash: u32,
}

impl AssetRecord {
    /// Whether the payload carries a zlib sub-header and stream.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        ZIPPED_FLAGS.contains(&self.zipped)
    }

    /// Byte range of the stored payload, or `None` if it overflows `u64`.
    #[inline]
    pub fn payload_range(&self) -> Option<Range<u64>> {
        Some(self.offset..self.offset.checked_add(self.data_length)?)
    }
}

impl From<&RawAssetRecord> for AssetRecord {
    fn from(raw: &RawAssetRecord) -> Self {
        Self {
            name_hash: raw.name_hash.get(),
            offset: raw.offset.get(),
            data_length: raw.data_length.get(),
            zipped: raw.zipped.get(),
            data_hash: raw.data_hash.get(),
        }
    }
}

impl From<&AssetRecord> for RawAssetRecord {
    fn from(record: &AssetRecord) -> Self {
        Self {
            name_hash: U64::new(record.name_hash),
            offset: U64::new(record.offset),
            data_length: U64::new(record.data_length),
            zipped: U32::new(record.zipped),
            data_hash: U32::new(record.data_hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(HEADER_SIZE, 24);
        assert_eq!(RECORD_SIZE, 32);
    }

    #[test]
    fn test_header_fields_little_endian() {
        let mut data = Vec::new();
        data.extend_from_slice(b"PAK\x01");
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0x1122u64.to_le_bytes());
        data.extend_from_slice(&0x40u64.to_le_bytes());

        let header = PackHeader::parse(&data).unwrap();
        assert_eq!(header.asset_count, 2);
        assert_eq!(header.length, 0x1122);
        assert_eq!(header.map_offset, 0x40);
        assert_eq!(header.table_range(), Some(0x40..0x80));
    }

    #[test]
    fn test_bad_magic_wins_over_short_buffer() {
        assert!(matches!(
            PackHeader::parse(b"ZIP\x01"),
            Err(Error::BadMagic { actual }) if &actual == b"ZIP\x01"
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            PackHeader::parse(b"PAK"),
            Err(Error::OutOfRange { what: "magic", .. })
        ));
        assert!(matches!(
            PackHeader::parse(b"PAK\x01\x02\x00\x00\x00"),
            Err(Error::OutOfRange { what: "header", .. })
        ));
    }

    #[test]
    fn test_table_range_overflow() {
        let header = PackHeader {
            asset_count: u32::MAX,
            length: 0,
            map_offset: u64::MAX - 16,
        };
        assert_eq!(header.table_range(), None);
    }

    #[test]
    fn test_both_zipped_markers_compress() {
        let mut record = AssetRecord::default();
        assert!(!record.is_compressed());
        record.zipped = 1;
        assert!(record.is_compressed());
        record.zipped = 17;
        assert!(record.is_compressed());
        record.zipped = 2;
        assert!(!record.is_compressed());
    }

    #[test]
    fn test_record_raw_conversion() {
        let record = AssetRecord {
            name_hash: 0x4137_cc65_bd97_fd30,
            offset: 24,
            data_length: 9,
            zipped: 17,
            data_hash: 0xDEAD_BEEF,
        };
        let raw = RawAssetRecord::from(&record);
        assert_eq!(raw.as_bytes().len(), RECORD_SIZE);
        assert_eq!(&raw.as_bytes()[..8], &0x4137_cc65_bd97_fd30u64.to_le_bytes());
        assert_eq!(AssetRecord::from(&raw), record);
    }
}
