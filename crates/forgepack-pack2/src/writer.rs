//! In-memory pack2 writer for building test archives.
//!
//! Payloads are laid out right after the header in insertion order and the
//! asset table is appended at the end, matching how shipped archives are
//! arranged.

use std::io::{self, Write};

use byteorder::{BigEndian, ByteOrder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use forgepack_common::hash::hash_name;
use zerocopy::IntoBytes;

use crate::format::{AssetRecord, PackHeader, RawAssetRecord, RawPackHeader, HEADER_SIZE, RECORD_SIZE};

/// Reserved leading bytes of a compressed payload as written by the packer.
const COMPRESSED_TAG: [u8; 4] = [0xA1, 0xB2, 0xC3, 0xD4];

struct Entry {
    name_hash: u64,
    stored: Vec<u8>,
    zipped: u32,
}

/// Builder for pack2 archive bytes.
#[derive(Default)]
pub struct PackBuilder {
    entries: Vec<Entry>,
    compress_error: Option<io::Error>,
}

impl PackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an uncompressed asset.
    pub fn raw(self, name: &str, data: &[u8]) -> Self {
        self.stored(hash_name(name), data.to_vec(), 0)
    }

    /// Add a zlib-compressed asset marked with `zipped = 1`.
    pub fn compressed(self, name: &str, data: &[u8]) -> Self {
        self.compressed_with_flag(name, data, 1)
    }

    /// Add a zlib-compressed asset with an explicit `zipped` marker.
    pub fn compressed_with_flag(mut self, name: &str, data: &[u8], zipped: u32) -> Self {
        match compress_payload(data) {
            Ok(stored) => self.stored(hash_name(name), stored, zipped),
            Err(e) => {
                self.compress_error.get_or_insert(e);
                self
            }
        }
    }

    /// Add an entry with pre-built stored bytes.
    pub fn stored(mut self, name_hash: u64, stored: Vec<u8>, zipped: u32) -> Self {
        self.entries.push(Entry {
            name_hash,
            stored,
            zipped,
        });
        self
    }

    /// Serialize the archive.
    pub fn build(self) -> io::Result<Vec<u8>> {
        if let Some(e) = self.compress_error {
            return Err(e);
        }

        let payload_len: usize = self.entries.iter().map(|e| e.stored.len()).sum();
        let map_offset = HEADER_SIZE + payload_len;
        let total = map_offset + self.entries.len() * RECORD_SIZE;

        let header = PackHeader {
            asset_count: self.entries.len() as u32,
            length: total as u64,
            map_offset: map_offset as u64,
        };

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(RawPackHeader::from(&header).as_bytes());

        let mut records = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            records.push(AssetRecord {
                name_hash: entry.name_hash,
                offset: out.len() as u64,
                data_length: entry.stored.len() as u64,
                zipped: entry.zipped,
                data_hash: forgepack_common::hash::hash_bytes(&entry.stored) as u32,
            });
            out.extend_from_slice(&entry.stored);
        }

        for record in &records {
            out.extend_from_slice(RawAssetRecord::from(record).as_bytes());
        }

        Ok(out)
    }
}

/// Encode `data` as a compressed payload: reserved tag, big-endian size, zlib stream.
pub fn compress_payload(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut size = [0u8; 4];
    BigEndian::write_u32(&mut size, data.len() as u32);

    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    out.extend_from_slice(&COMPRESSED_TAG);
    out.extend_from_slice(&size);

    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
