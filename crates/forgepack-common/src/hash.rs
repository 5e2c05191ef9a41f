//! Asset name hashing.
//!
//! pack2 archives never store asset names, only a 64-bit hash of the
//! uppercased name. The hash is CRC-64 over the Jones polynomial in its
//! reflected form, with all-ones init and final xor.

/// Jones polynomial `0xAD93D23594C935A9`, bit-reversed.
const POLY_REFLECTED: u64 = 0x95AC_9329_AC4B_C9B5;

static TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u64;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Hash raw bytes exactly as given.
#[inline]
pub fn hash_bytes(data: &[u8]) -> u64 {
    !data.iter().fold(!0u64, |crc, &byte| {
        TABLE[((crc ^ byte as u64) & 0xFF) as usize] ^ (crc >> 8)
    })
}

/// Hash an asset name.
///
/// Names are case-insensitive: ASCII letters are uppercased before hashing,
/// so `"amerish.zone"` and `"Amerish.zone"` resolve to the same asset.
pub fn hash_name(name: &str) -> u64 {
    !name.bytes().fold(!0u64, |crc, byte| {
        let byte = byte.to_ascii_uppercase();
        TABLE[((crc ^ byte as u64) & 0xFF) as usize] ^ (crc >> 8)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_hash() {
        assert_eq!(hash_bytes(&[]), 0);
        assert_eq!(hash_name(""), 0);
    }

    #[test]
    fn test_check_value() {
        assert_eq!(hash_bytes(b"123456789"), 0x3558_e8e9_79f6_0d7e);
    }

    #[test]
    fn test_namelist_hash() {
        assert_eq!(hash_name("{NAMELIST}"), 0x4137_cc65_bd97_fd30);
    }

    #[test]
    fn test_name_case_insensitive() {
        assert_eq!(hash_name("amerish.zone"), hash_name("AMERISH.ZONE"));
        assert_eq!(hash_name("Amerish.zone"), hash_bytes(b"AMERISH.ZONE"));
        assert_ne!(hash_bytes(b"amerish.zone"), hash_bytes(b"AMERISH.ZONE"));
    }
}
