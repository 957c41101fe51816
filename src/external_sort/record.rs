//! Fixed-width record layout shared by every stage that touches chunk bytes.
//!
//! Records are raw `i32` values in the platform's native byte order, packed
//! back to back with no header or padding. The splitter copies bytes verbatim,
//! so only the sorter, cursor and merger ever decode them, all through the
//! two functions below.

use std::io::Write;

/// The value being sorted.
pub type Record = i32;

/// Width in bytes of one encoded record.
pub const RECORD_WIDTH: usize = std::mem::size_of::<Record>();

/// Interprets exactly `RECORD_WIDTH` bytes as one record.
#[inline]
pub fn decode_record(bytes: [u8; RECORD_WIDTH]) -> Record {
    Record::from_ne_bytes(bytes)
}

#[inline]
pub fn encode_record(value: Record) -> [u8; RECORD_WIDTH] {
    value.to_ne_bytes()
}

/// Writes every value in order using the same layout `decode_record` reads.
pub fn write_records<W: Write>(writer: &mut W, values: &[Record]) -> std::io::Result<()> {
    for value in values {
        writer.write_all(&encode_record(*value))?;
    }
    Ok(())
}

/// Decodes all whole records in `bytes`, ignoring a trailing partial record.
pub fn decode_records(bytes: &[u8]) -> Vec<Record> {
    bytes
        .chunks_exact(RECORD_WIDTH)
        .map(|chunk| {
            let mut buf = [0u8; RECORD_WIDTH];
            buf.copy_from_slice(chunk);
            decode_record(buf)
        })
        .collect()
}

/// Number of whole records a byte length can hold.
#[inline]
pub fn records_in(byte_len: u64) -> u64 {
    byte_len / RECORD_WIDTH as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_width_is_four_bytes() {
        assert_eq!(RECORD_WIDTH, 4);
    }

    #[test]
    fn test_encode_matches_native_layout() {
        let value: Record = -123_456;
        assert_eq!(encode_record(value), value.to_ne_bytes());
        assert_eq!(decode_record(encode_record(value)), value);
    }

    #[test]
    fn test_decode_records_drops_partial_tail() {
        let mut bytes = Vec::new();
        write_records(&mut bytes, &[7, -1, i32::MAX]).unwrap();
        bytes.extend_from_slice(&[0xAB, 0xCD]);

        assert_eq!(decode_records(&bytes), vec![7, -1, i32::MAX]);
        assert_eq!(records_in(bytes.len() as u64), 3);
    }
}
