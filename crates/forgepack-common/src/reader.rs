//! Binary reader for bounds-checked parsing of byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! fixed-width fields from a byte slice. Every read validates the requested
//! range against the slice length before touching memory, so malformed input
//! surfaces as [`Error::UnexpectedEof`] instead of a panic.

use zerocopy::FromBytes;

use crate::{Error, Result};

/// A binary reader over a borrowed byte slice.
///
/// Little-endian structures are read through zerocopy types with
/// [`read_struct`](Self::read_struct); plain integers are big-endian.
///
/// # Example
///
/// ```
/// use forgepack_common::BinaryReader;
///
/// let data = [b'P', b'A', b'K', 0x01, 0x00, 0x00, 0x00, 0x2A];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(&reader.read_array::<4>().unwrap(), b"PAK\x01");
/// assert_eq!(reader.read_u32_be().unwrap(), 42);
/// assert_eq!(reader.remaining(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Read a fixed-size byte array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a big-endian u32.
    #[inline]
    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Read a struct using zerocopy.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let offset = self.position;
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::byteorder::little_endian::U32;

    #[test]
    fn test_read_array_and_be() {
        let data = [0x01u8, 0x02, 0x03, 0x04, 0x00, 0x00, 0x01, 0x00];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_array::<4>().unwrap(), [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(reader.read_u32_be().unwrap(), 256);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_struct_little_endian() {
        let data = [0x01u8, 0x02, 0x03, 0x04];
        let mut reader = BinaryReader::new(&data);

        let value: U32 = reader.read_struct().unwrap();
        assert_eq!(value.get(), 0x04030201);
    }

    #[test]
    fn test_eof_error_reports_offset() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let mut reader = BinaryReader::new_at(&data, 2);

        match reader.read_u32_be() {
            Err(Error::UnexpectedEof {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(needed, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn test_position_past_end() {
        let data = [0u8; 4];
        let mut reader = BinaryReader::new(&data);
        reader.seek(usize::MAX);

        assert_eq!(reader.remaining(), 0);
        assert!(reader.read_bytes(1).is_err());
    }

    #[test]
    fn test_seek_rereads() {
        let data = *b"PAK\x01";
        let mut reader = BinaryReader::new(&data);

        let first = reader.read_array::<4>().unwrap();
        reader.seek(0);
        assert_eq!(reader.read_array::<4>().unwrap(), first);
    }
}
