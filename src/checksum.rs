#![deny(missing_docs)]

//! OpenType table checksums.

use std::num::Wrapping;

/// Calculate a checksum of `data` according to the OpenType table checksum algorithm
///
/// The input is treated as if zero-padded to a multiple of four bytes.
///
/// https://docs.microsoft.com/en-us/typography/opentype/spec/otff#calculating-checksums
pub fn table_checksum(data: &[u8]) -> Wrapping<u32> {
    let mut sum = Wrapping(0u32);
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        // NOTE(unwrap): Safe as chunks_exact yields 4-byte chunks
        sum += Wrapping(u32::from_be_bytes(chunk.try_into().unwrap()));
    }
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut last = [0u8; 4];
        last[..remainder.len()].copy_from_slice(remainder);
        sum += Wrapping(u32::from_be_bytes(last));
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::Wrapping;

    #[test]
    fn test_table_checksum() {
        let data = [0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 4];

        assert_eq!(super::table_checksum(&data), Wrapping(10));
    }

    #[test]
    fn test_table_checksum_overflow() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 2];

        assert_eq!(super::table_checksum(&data), Wrapping(1));
    }

    #[test]
    fn test_table_checksum_padding() {
        // Trailing bytes are padded with zeros to a 4-byte boundary
        let data = [0, 0, 0, 1, 0xAB];
        let padded = [0, 0, 0, 1, 0xAB, 0, 0, 0];

        assert_eq!(
            super::table_checksum(&data),
            super::table_checksum(&padded)
        );
    }
}
