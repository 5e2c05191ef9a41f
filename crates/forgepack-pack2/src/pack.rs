//! pack2 archive parsing and lookup.

use std::ops::Range;

use forgepack_common::hash::hash_name;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use zerocopy::FromBytes;

use crate::format::{AssetRecord, PackHeader, RawAssetRecord, RECORD_SIZE};
use crate::{Error, Result};

/// View of the asset table inside an archive buffer.
///
/// The records are borrowed straight from the buffer; the view cannot outlive
/// it. After an archive is reloaded a new view has to be taken from the new
/// buffer with [`Pack2::table`].
#[derive(Debug, Clone, Copy)]
pub struct AssetTable<'a> {
    records: &'a [RawAssetRecord],
}

impl<'a> AssetTable<'a> {
    /// Validate the table range described by `header` and view it.
    pub fn new(buffer: &'a [u8], header: &PackHeader) -> Result<Self> {
        let table_len = header.asset_count as u64 * RECORD_SIZE as u64;
        let range = header
            .table_range()
            .and_then(|range| checked_usize_range(&range, buffer.len()))
            .ok_or_else(|| Error::out_of_range("asset table", header.map_offset, table_len, buffer.len()))?;

        let records = <[RawAssetRecord]>::ref_from_bytes(&buffer[range])
            .map_err(|_| Error::out_of_range("asset table", header.map_offset, table_len, buffer.len()))?;

        Ok(Self { records })
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy out the record at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<AssetRecord> {
        self.records.get(index).map(AssetRecord::from)
    }

    /// Iterate over records in on-disk order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = AssetRecord> + 'a {
        self.records.iter().map(AssetRecord::from)
    }

    /// The raw on-disk records.
    #[inline]
    pub fn raw(&self) -> &'a [RawAssetRecord] {
        self.records
    }

    /// Build a `name_hash -> table index` map.
    ///
    /// When a hash appears more than once the later record wins.
    pub fn build_index(&self) -> FxHashMap<u64, u32> {
        let mut index = FxHashMap::default();
        index.reserve(self.records.len());

        for (i, raw) in self.records.iter().enumerate() {
            let hash = raw.name_hash.get();
            trace!("assets[{}].name_hash = {:#018x}", i, hash);
            if let Some(previous) = index.insert(hash, i as u32) {
                debug!(
                    "duplicate name hash {:#018x}: record {} replaces record {}",
                    hash, i, previous
                );
            }
        }

        index
    }
}

/// A parsed pack2 archive.
///
/// `Pack2` keeps the header and the name index, which stay valid for as long
/// as the file contents do not change. The byte buffer itself is owned by the
/// caller and passed in to every operation that needs records or payloads, so
/// the buffer can be dropped and re-read without re-parsing.
#[derive(Debug, Clone)]
pub struct Pack2 {
    header: PackHeader,
    index: FxHashMap<u64, u32>,
}

impl Pack2 {
    /// Parse an archive buffer and build its name index.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let header = PackHeader::parse(buffer)?;
        let table = AssetTable::new(buffer, &header)?;
        let index = table.build_index();

        debug!(
            "parsed pack2: {} assets, {} unique hashes, table at {:#x}",
            header.asset_count,
            index.len(),
            header.map_offset
        );

        Ok(Self { header, index })
    }

    /// The header the index was built from.
    #[inline]
    pub fn header(&self) -> &PackHeader {
        &self.header
    }

    /// Number of records in the asset table.
    #[inline]
    pub fn asset_count(&self) -> usize {
        self.header.asset_count as usize
    }

    /// The `name_hash -> table index` map.
    #[inline]
    pub fn index(&self) -> &FxHashMap<u64, u32> {
        &self.index
    }

    /// Iterate over every indexed name hash.
    pub fn hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.index.keys().copied()
    }

    /// Check whether an asset name is indexed.
    pub fn contains(&self, name: &str) -> bool {
        self.contains_hash(hash_name(name))
    }

    #[inline]
    pub fn contains_hash(&self, hash: u64) -> bool {
        self.index.contains_key(&hash)
    }

    /// Take a table view over `buffer`.
    ///
    /// The buffer's header must match the one this index was built from.
    pub fn table<'a>(&self, buffer: &'a [u8]) -> Result<AssetTable<'a>> {
        let header = PackHeader::parse(buffer)?;
        if header != self.header {
            return Err(Error::HeaderMismatch);
        }
        AssetTable::new(buffer, &header)
    }

    /// Look up the record for an asset name.
    pub fn lookup(&self, buffer: &[u8], name: &str) -> Result<AssetRecord> {
        match self.lookup_hash(buffer, hash_name(name)) {
            Err(Error::HashNotFound(_)) => Err(Error::NotFound(name.to_string())),
            other => other,
        }
    }

    /// Look up the record for a name hash.
    pub fn lookup_hash(&self, buffer: &[u8], hash: u64) -> Result<AssetRecord> {
        let index = *self.index.get(&hash).ok_or(Error::HashNotFound(hash))?;
        let table = self.table(buffer)?;

        table.get(index as usize).ok_or_else(|| {
            Error::out_of_range(
                "asset record",
                self.header.map_offset + index as u64 * RECORD_SIZE as u64,
                RECORD_SIZE as u64,
                buffer.len(),
            )
        })
    }

    /// Borrow the stored payload of `record` from `buffer`.
    pub fn payload_slice<'a>(record: &AssetRecord, buffer: &'a [u8]) -> Result<&'a [u8]> {
        Ok(&buffer[Self::payload_range(record, buffer.len())?])
    }

    /// Validated payload range of `record` in a buffer of `size` bytes.
    pub fn payload_range(record: &AssetRecord, size: usize) -> Result<Range<usize>> {
        record
            .payload_range()
            .and_then(|range| checked_usize_range(&range, size))
            .ok_or_else(|| Error::out_of_range("payload", record.offset, record.data_length, size))
    }
}

fn checked_usize_range(range: &Range<u64>, size: usize) -> Option<Range<usize>> {
    let start = usize::try_from(range.start).ok()?;
    let end = usize::try_from(range.end).ok()?;
    (end <= size).then_some(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::PackBuilder;
    use crate::HEADER_SIZE;
    use proptest::prelude::*;

    fn sample() -> Vec<u8> {
        PackBuilder::new()
            .raw("A", b"hello")
            .compressed("B", &[7u8; 100])
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_builds_index() {
        let data = sample();
        let pack = Pack2::parse(&data).unwrap();

        assert_eq!(pack.asset_count(), 2);
        assert!(pack.contains("A"));
        assert!(pack.contains("b"));
        assert!(!pack.contains("C"));
        assert_eq!(pack.header().length, data.len() as u64);
    }

    #[test]
    fn test_lookup_and_payload() {
        let data = sample();
        let pack = Pack2::parse(&data).unwrap();

        let record = pack.lookup(&data, "A").unwrap();
        assert_eq!(record.name_hash, hash_name("A"));
        assert_eq!(record.data_length, 5);
        assert!(!record.is_compressed());
        assert_eq!(Pack2::payload_slice(&record, &data).unwrap(), b"hello");

        let record = pack.lookup(&data, "B").unwrap();
        assert!(record.is_compressed());
    }

    #[test]
    fn test_lookup_missing() {
        let data = sample();
        let pack = Pack2::parse(&data).unwrap();

        assert!(matches!(pack.lookup(&data, "C"), Err(Error::NotFound(name)) if name == "C"));
        assert!(matches!(pack.lookup_hash(&data, 42), Err(Error::HashNotFound(42))));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = sample();
        data[0] = b'Z';
        assert!(matches!(Pack2::parse(&data), Err(Error::BadMagic { .. })));
    }

    #[test]
    fn test_table_past_end() {
        let mut data = sample();
        // Claim one more record than the buffer can hold.
        data[4..8].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            Pack2::parse(&data),
            Err(Error::OutOfRange { what: "asset table", .. })
        ));

        let mut data = sample();
        data[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(Pack2::parse(&data), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn test_empty_archive() {
        let data = PackBuilder::new().build().unwrap();
        let pack = Pack2::parse(&data).unwrap();

        assert_eq!(pack.asset_count(), 0);
        assert!(pack.table(&data).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_hash_later_wins() {
        let data = PackBuilder::new()
            .raw("dup", b"first")
            .raw("DUP", b"second")
            .build()
            .unwrap();
        let pack = Pack2::parse(&data).unwrap();

        assert_eq!(pack.index().len(), 1);
        let record = pack.lookup(&data, "dup").unwrap();
        assert_eq!(Pack2::payload_slice(&record, &data).unwrap(), b"second");
    }

    #[test]
    fn test_payload_out_of_range() {
        let data = sample();
        let record = AssetRecord {
            offset: data.len() as u64 - 2,
            data_length: 5,
            ..AssetRecord::default()
        };
        assert!(matches!(
            Pack2::payload_slice(&record, &data),
            Err(Error::OutOfRange { what: "payload", .. })
        ));

        let record = AssetRecord {
            offset: u64::MAX,
            data_length: 1,
            ..AssetRecord::default()
        };
        assert!(Pack2::payload_slice(&record, &data).is_err());
    }

    #[test]
    fn test_table_rejects_other_buffer() {
        let data = sample();
        let pack = Pack2::parse(&data).unwrap();
        let other = PackBuilder::new().raw("X", b"x").build().unwrap();

        assert!(matches!(pack.table(&other), Err(Error::HeaderMismatch)));
    }

    #[test]
    fn test_table_iteration_order() {
        let data = sample();
        let pack = Pack2::parse(&data).unwrap();
        let hashes: Vec<u64> = pack.table(&data).unwrap().iter().map(|r| r.name_hash).collect();

        assert_eq!(hashes, vec![hash_name("A"), hash_name("B")]);
        assert!(data.len() > HEADER_SIZE);
    }

    proptest! {
        #[test]
        fn prop_foreign_magic_never_panics(
            magic in any::<[u8; 4]>().prop_filter("not pack2", |m| m != b"PAK\x01"),
            tail in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let mut data = magic.to_vec();
            data.extend_from_slice(&tail);
            let result = Pack2::parse(&data);
            prop_assert!(
                matches!(result, Err(Error::BadMagic { .. })),
                "expected BadMagic, got {:?}",
                result
            );
        }

        #[test]
        fn prop_arbitrary_tail_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut data = b"PAK\x01".to_vec();
            data.extend_from_slice(&tail);
            if let Ok(pack) = Pack2::parse(&data) {
                let table = pack.table(&data).unwrap();
                for record in table.iter() {
                    let _ = Pack2::payload_slice(&record, &data);
                }
            }
        }
    }
}
