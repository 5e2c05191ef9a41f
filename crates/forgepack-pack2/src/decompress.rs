//! Payload decoding.
//!
//! Compressed payloads start with an 8-byte sub-header: four reserved bytes
//! followed by the big-endian uncompressed size. The zlib stream follows.

use flate2::{Decompress, FlushDecompress, Status};
use forgepack_common::BinaryReader;
use tracing::trace;

use crate::format::AssetRecord;
use crate::DecodeError;

/// Length of the compressed payload sub-header.
const SUB_HEADER_LEN: usize = 8;

/// A decompressor that inflates a zlib stream into a buffer of known size.
pub trait Inflate: Send + Sync {
    /// Inflate `input` into `output`, returning the number of bytes written.
    fn inflate(&self, input: &[u8], output: &mut [u8]) -> Result<usize, DecodeError>;
}

/// zlib decompressor backed by flate2.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibInflater;

impl Inflate for ZlibInflater {
    fn inflate(&self, input: &[u8], output: &mut [u8]) -> Result<usize, DecodeError> {
        let mut decompress = Decompress::new(true);
        let status = decompress
            .decompress(input, output, FlushDecompress::Finish)
            .map_err(|e| DecodeError::DataCorrupt(e.to_string()))?;
        let written = decompress.total_out() as usize;

        match status {
            Status::StreamEnd => Ok(written),
            Status::Ok | Status::BufError if written == output.len() => {
                // Output is full. The stream may only have its trailer left,
                // so see whether it yields any more bytes.
                let consumed = (decompress.total_in() as usize).min(input.len());
                let mut spill = [0u8; 1];
                let status = decompress
                    .decompress(&input[consumed..], &mut spill, FlushDecompress::Finish)
                    .map_err(|e| DecodeError::DataCorrupt(e.to_string()))?;

                if decompress.total_out() as usize > written {
                    Err(DecodeError::BufferTooSmall {
                        expected: output.len(),
                    })
                } else if status == Status::StreamEnd {
                    Ok(written)
                } else {
                    Err(DecodeError::DataCorrupt(format!(
                        "zlib stream truncated after {} bytes",
                        written
                    )))
                }
            }
            Status::Ok | Status::BufError => Err(DecodeError::DataCorrupt(format!(
                "zlib stream ended early after {} of {} bytes",
                written,
                output.len()
            ))),
        }
    }
}

/// Read the declared uncompressed size from a compressed payload.
pub fn declared_size(payload: &[u8]) -> Result<u32, DecodeError> {
    BinaryReader::new_at(payload, 4)
        .read_u32_be()
        .map_err(|_| DecodeError::DataCorrupt(format!("payload of {} bytes has no size header", payload.len())))
}

/// Decode a stored payload with the default zlib decompressor.
pub fn decode(record: &AssetRecord, payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_with(record, payload, &ZlibInflater)
}

/// Decode a stored payload.
///
/// Uncompressed payloads are copied out verbatim. Compressed payloads are
/// inflated into a buffer of exactly the declared size; an allocation
/// failure is reported as [`DecodeError::OutOfMemory`].
pub fn decode_with(
    record: &AssetRecord,
    payload: &[u8],
    inflater: &dyn Inflate,
) -> Result<Vec<u8>, DecodeError> {
    if !record.is_compressed() {
        return Ok(payload.to_vec());
    }

    let size = declared_size(payload)? as usize;
    let mut output = Vec::new();
    output
        .try_reserve_exact(size)
        .map_err(|_| DecodeError::OutOfMemory { requested: size })?;
    output.resize(size, 0);

    let written = inflater.inflate(&payload[SUB_HEADER_LEN..], &mut output)?;
    if written != size {
        return Err(DecodeError::DataCorrupt(format!(
            "declared {} bytes, inflated {}",
            size, written
        )));
    }

    trace!(
        "inflated {:#018x}: {} bytes -> {} bytes",
        record.name_hash,
        payload.len(),
        size
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::compress_payload;

    fn compressed_record(len: usize) -> AssetRecord {
        AssetRecord {
            data_length: len as u64,
            zipped: 1,
            ..AssetRecord::default()
        }
    }

    #[test]
    fn test_raw_payload_copied_verbatim() {
        let record = AssetRecord {
            data_length: 5,
            ..AssetRecord::default()
        };
        assert_eq!(decode(&record, b"hello").unwrap(), b"hello");
    }

    #[test]
    fn test_zlib_roundtrip() {
        let original: Vec<u8> = (0..100u8).collect();
        let payload = compress_payload(&original).unwrap();

        assert_eq!(declared_size(&payload).unwrap(), 100);
        let decoded = decode(&compressed_record(payload.len()), &payload).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_marker_17_is_compressed() {
        let payload = compress_payload(b"seventeen").unwrap();
        let mut record = compressed_record(payload.len());
        record.zipped = 17;

        assert_eq!(decode(&record, &payload).unwrap(), b"seventeen");
    }

    #[test]
    fn test_declared_size_too_small() {
        let mut payload = compress_payload(&[1u8; 64]).unwrap();
        payload[4..8].copy_from_slice(&10u32.to_be_bytes());

        assert_eq!(
            decode(&compressed_record(payload.len()), &payload),
            Err(DecodeError::BufferTooSmall { expected: 10 })
        );
    }

    #[test]
    fn test_zero_declared_size_with_data() {
        let mut payload = compress_payload(b"not empty at all").unwrap();
        payload[4..8].copy_from_slice(&0u32.to_be_bytes());

        assert_eq!(
            decode(&compressed_record(payload.len()), &payload),
            Err(DecodeError::BufferTooSmall { expected: 0 })
        );
    }

    #[test]
    fn test_empty_stream() {
        let payload = compress_payload(b"").unwrap();

        assert_eq!(declared_size(&payload).unwrap(), 0);
        assert_eq!(decode(&compressed_record(payload.len()), &payload).unwrap(), b"");
    }

    #[test]
    fn test_declared_size_too_large() {
        let mut payload = compress_payload(&[1u8; 64]).unwrap();
        payload[4..8].copy_from_slice(&65u32.to_be_bytes());

        assert!(matches!(
            decode(&compressed_record(payload.len()), &payload),
            Err(DecodeError::DataCorrupt(_))
        ));
    }

    #[test]
    fn test_garbage_stream() {
        let mut payload = vec![0u8; 4];
        payload.extend_from_slice(&32u32.to_be_bytes());
        payload.extend_from_slice(b"definitely not zlib");

        assert!(matches!(
            decode(&compressed_record(payload.len()), &payload),
            Err(DecodeError::DataCorrupt(_))
        ));
    }

    #[test]
    fn test_missing_sub_header() {
        assert!(matches!(
            decode(&compressed_record(3), &[0, 0, 0]),
            Err(DecodeError::DataCorrupt(_))
        ));
    }
}
