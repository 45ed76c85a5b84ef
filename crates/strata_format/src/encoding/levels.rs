//! Definition/repetition level buffers.
//!
//! A level buffer is the hybrid RLE payload prefixed with its byte length:
//! `[u32 length][payload]`. It's only materialized for dimensions whose
//! maximum level is positive; a reader learns "no levels present" from the
//! schema, not from the page.

use strata_error::{Result, StrataError};

use crate::encoding::bitutil::num_required_bits;
use crate::encoding::rle::{RleDecoder, RleEncoder};

const LENGTH_PREFIX_SIZE: usize = 4;

/// Encode raw levels into a length-prefixed buffer.
///
/// Allocates the worst case up front, encodes after the prefix, backfills
/// the actual payload length, and releases the slack. `num_values` must
/// match the number of buffered levels; a mismatch is a logic defect in the
/// caller, not bad input.
pub fn encode_levels(levels: &[i16], max_level: i16, num_values: usize) -> Result<Vec<u8>> {
    if levels.len() != num_values {
        return Err(StrataError::new(format!(
            "Level encoder expected {num_values} levels, got {}",
            levels.len()
        )));
    }

    let bit_width = num_required_bits(max_level as u64);
    let max_payload = RleEncoder::max_buffer_size(bit_width, num_values);

    let mut buffer = Vec::with_capacity(LENGTH_PREFIX_SIZE + max_payload);
    buffer.extend_from_slice(&[0; LENGTH_PREFIX_SIZE]);

    let mut encoder = RleEncoder::new_from_buf(bit_width, buffer);
    for level in levels {
        encoder.put(*level as u64);
    }
    let mut buffer = encoder.consume();

    let payload_len = buffer.len() - LENGTH_PREFIX_SIZE;
    if payload_len > max_payload {
        return Err(StrataError::new(format!(
            "Encoded level payload of {payload_len} bytes exceeds worst case {max_payload}"
        )));
    }
    buffer[..LENGTH_PREFIX_SIZE].copy_from_slice(&(payload_len as u32).to_le_bytes());
    buffer.shrink_to_fit();

    Ok(buffer)
}

/// Decode a length-prefixed level buffer back into raw levels.
pub fn decode_levels(data: &[u8], max_level: i16, num_values: usize) -> Result<Vec<i16>> {
    if data.len() < LENGTH_PREFIX_SIZE {
        return Err(StrataError::new("Level buffer missing its length prefix"));
    }
    let payload_len = u32::from_le_bytes(data[..LENGTH_PREFIX_SIZE].try_into().unwrap()) as usize;
    if data.len() < LENGTH_PREFIX_SIZE + payload_len {
        return Err(StrataError::new(format!(
            "Level buffer of {} bytes shorter than its length prefix {payload_len}",
            data.len() - LENGTH_PREFIX_SIZE
        )));
    }

    let bit_width = num_required_bits(max_level as u64);
    let payload = &data[LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + payload_len];
    let levels = RleDecoder::new(bit_width, payload).get_batch::<i16>(num_values)?;
    if levels.len() != num_values {
        return Err(StrataError::new(format!(
            "Expected {num_values} levels, decoded {}",
            levels.len()
        )));
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_roundtrip(levels: &[i16], max_level: i16) {
        let buffer = encode_levels(levels, max_level, levels.len()).unwrap();
        let decoded = decode_levels(&buffer, max_level, levels.len()).unwrap();
        assert_eq!(decoded, levels);
    }

    #[test]
    fn length_prefix_matches_payload() {
        let levels = vec![1i16; 100];
        let buffer = encode_levels(&levels, 1, 100).unwrap();
        let payload_len = u32::from_le_bytes(buffer[..4].try_into().unwrap()) as usize;
        assert_eq!(buffer.len(), 4 + payload_len);
    }

    #[test]
    fn roundtrips() {
        assert_roundtrip(&[], 1);
        assert_roundtrip(&[0], 1);
        assert_roundtrip(&[1, 1, 0, 1, 1, 1, 0, 1, 1], 1);
        assert_roundtrip(&(0..500).map(|i| (i % 4) as i16).collect::<Vec<_>>(), 3);
        // Max level 0 never reaches this path from the writer, but the
        // encoding itself is well defined for it.
        assert_roundtrip(&[0, 0, 0], 0);
    }

    #[test]
    fn count_mismatch_is_error() {
        let levels = vec![1i16, 1, 0];
        assert!(encode_levels(&levels, 1, 4).is_err());
    }

    #[test]
    fn truncated_buffer_is_error() {
        let levels = vec![1i16; 20];
        let mut buffer = encode_levels(&levels, 1, 20).unwrap();
        buffer.truncate(buffer.len() - 1);
        assert!(decode_levels(&buffer, 1, 20).is_err());
    }
}
