//! Plain value encoding.

use std::marker::PhantomData;

use strata_error::Result;

use crate::encoding::bitutil::BitWriter;
use crate::types::ColumnValue;

/// Plain encoder for a batch stream of one value type.
///
/// Holds both a byte sink and a bit sink: fixed and variable width values
/// append whole bytes, booleans pack bits across batch boundaries. The bit
/// sink pads to a byte only when the page buffer is taken.
#[derive(Debug, Default)]
pub struct PlainEncoder<T: ColumnValue> {
    buffer: Vec<u8>,
    bits: BitWriter,
    _type: PhantomData<T>,
}

impl<T: ColumnValue> PlainEncoder<T> {
    pub fn new() -> Self {
        PlainEncoder {
            buffer: Vec::new(),
            bits: BitWriter::new(),
            _type: PhantomData,
        }
    }

    pub fn put(&mut self, values: &[T]) -> Result<()> {
        T::plain_encode(values, &mut self.buffer, &mut self.bits)
    }

    /// Bytes the current page's values occupy so far.
    pub fn estimated_size(&self) -> usize {
        self.buffer.len() + self.bits.bytes_written()
    }

    /// Take the encoded buffer for the current page, resetting the encoder.
    pub fn take_page_buffer(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.buffer);
        let bits = self.bits.take();
        if out.is_empty() {
            bits
        } else {
            out.extend_from_slice(&bits);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ByteArray;

    #[test]
    fn int64_little_endian() {
        let mut encoder = PlainEncoder::<i64>::new();
        encoder.put(&[1, -1]).unwrap();
        let buf = encoder.take_page_buffer();
        assert_eq!(buf[..8], 1i64.to_le_bytes());
        assert_eq!(buf[8..], (-1i64).to_le_bytes());
    }

    #[test]
    fn bools_pack_across_batches() {
        let mut encoder = PlainEncoder::<bool>::new();
        encoder.put(&[true, true, true]).unwrap();
        encoder.put(&[false, true]).unwrap();
        // 5 bools in one byte: 0b01011...0 reading LSB first.
        assert_eq!(encoder.take_page_buffer(), vec![0b00010111]);
    }

    #[test]
    fn take_resets_for_next_page() {
        let mut encoder = PlainEncoder::<ByteArray>::new();
        encoder.put(&[ByteArray::from("xy")]).unwrap();
        assert_eq!(encoder.estimated_size(), 6);
        let first = encoder.take_page_buffer();
        assert_eq!(first.len(), 6);
        assert_eq!(encoder.estimated_size(), 0);
        encoder.put(&[ByteArray::from("z")]).unwrap();
        assert_eq!(encoder.take_page_buffer().len(), 5);
    }
}
