//! Dictionary value encoding.

use std::hash::{Hash, Hasher};

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use strata_error::{Result, StrataError};

use crate::encoding::bitutil::{self, BitWriter};
use crate::encoding::rle::RleEncoder;
use crate::types::ColumnValue;

/// Key wrapper routing hashing and equality through the value's dictionary
/// identity (floats intern by bit pattern).
#[derive(Debug)]
struct DictKey<T: ColumnValue>(T);

impl<T: ColumnValue> Hash for DictKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.dict_hash(state);
    }
}

impl<T: ColumnValue> PartialEq for DictKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0.dict_eq(&other.0)
    }
}

impl<T: ColumnValue> Eq for DictKey<T> {}

/// Interning state, dropped wholesale once the dictionary serializes.
#[derive(Debug)]
struct Interner<T: ColumnValue> {
    lookup: HashMap<DictKey<T>, u32>,
    uniques: Vec<T>,
}

/// Dictionary encoder: distinct values in insertion order, batches encoded
/// as indices into that table.
///
/// Page buffers hold `[index bit width: u8]` followed by the RLE encoded
/// indices. The distinct table itself serializes once, plain encoded, via
/// [`DictEncoder::serialize_dict`]; that call also releases the interning
/// memory, so no further values can be added afterwards.
#[derive(Debug)]
pub struct DictEncoder<T: ColumnValue> {
    interner: Option<Interner<T>>,
    /// Entry count, kept past serialization for the index bit width.
    num_entries: usize,
    /// Buffered indices for the current page.
    indices: Vec<u64>,
}

impl<T: ColumnValue> DictEncoder<T> {
    pub fn new() -> Self {
        DictEncoder {
            interner: Some(Interner {
                lookup: HashMap::new(),
                uniques: Vec::new(),
            }),
            num_entries: 0,
            indices: Vec::new(),
        }
    }

    pub fn put(&mut self, values: &[T]) -> Result<()> {
        let interner = self
            .interner
            .as_mut()
            .ok_or_else(|| StrataError::new("Dictionary already serialized, no further values accepted"))?;

        for value in values {
            let next = interner.uniques.len() as u32;
            let index = match interner.lookup.entry(DictKey(value.clone())) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    interner.uniques.push(value.clone());
                    entry.insert(next);
                    next
                }
            };
            self.indices.push(index as u64);
        }
        self.num_entries = interner.uniques.len();
        Ok(())
    }

    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Bits per index. A one entry dictionary still uses one bit so the
    /// index runs stay decodable.
    fn bit_width(&self) -> u8 {
        bitutil::num_required_bits(self.num_entries.saturating_sub(1) as u64).max(1)
    }

    /// Rough size of the buffered indices once encoded.
    pub fn estimated_data_size(&self) -> usize {
        bitutil::ceil(self.bit_width() as usize * self.indices.len(), 8)
    }

    /// Exact plain encoded size of the distinct table. Zero once the
    /// dictionary has been serialized.
    pub fn dict_encoded_size(&self) -> usize {
        match &self.interner {
            Some(interner) => T::plain_encoded_size(&interner.uniques),
            None => 0,
        }
    }

    /// Take the `[bit width][rle indices]` buffer for the current page,
    /// resetting the index buffer.
    pub fn take_page_buffer(&mut self) -> Result<Vec<u8>> {
        let bit_width = self.bit_width();
        let mut buffer = Vec::with_capacity(1 + RleEncoder::max_buffer_size(bit_width, self.indices.len()));
        buffer.push(bit_width);

        let mut encoder = RleEncoder::new_from_buf(bit_width, buffer);
        for index in self.indices.drain(..) {
            encoder.put(index);
        }
        Ok(encoder.consume())
    }

    /// Serialize the distinct table into an exactly sized buffer and release
    /// the interning state.
    pub fn serialize_dict(&mut self) -> Result<Vec<u8>> {
        let interner = self
            .interner
            .take()
            .ok_or_else(|| StrataError::new("Dictionary already serialized"))?;

        let size = T::plain_encoded_size(&interner.uniques);
        let mut buffer = Vec::with_capacity(size);
        let mut bits = BitWriter::new();
        T::plain_encode(&interner.uniques, &mut buffer, &mut bits)?;
        let bits = bits.take();
        if !bits.is_empty() {
            buffer.extend_from_slice(&bits);
        }
        debug_assert_eq!(buffer.len(), size);

        Ok(buffer)
        // `interner` drops here, releasing the lookup table and the
        // insertion ordered values in one go.
    }
}

impl<T: ColumnValue> Default for DictEncoder<T> {
    fn default() -> Self {
        DictEncoder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::rle::RleDecoder;
    use crate::types::ByteArray;

    fn decode_indices(buffer: &[u8], num_values: usize) -> Vec<u32> {
        let (bit_width, payload) = buffer.split_first().unwrap();
        RleDecoder::new(*bit_width, payload).get_batch(num_values).unwrap()
    }

    #[test]
    fn interns_in_insertion_order() {
        let mut encoder = DictEncoder::<i64>::new();
        encoder.put(&[7, 7, 3, 7, 9, 3]).unwrap();
        assert_eq!(encoder.num_entries(), 3);

        let page = encoder.take_page_buffer().unwrap();
        assert_eq!(decode_indices(&page, 6), vec![0, 0, 1, 0, 2, 1]);

        // Table serializes as plain values in first-seen order.
        let dict = encoder.serialize_dict().unwrap();
        assert_eq!(dict.len(), 24);
        assert_eq!(dict[..8], 7i64.to_le_bytes());
        assert_eq!(dict[8..16], 3i64.to_le_bytes());
        assert_eq!(dict[16..24], 9i64.to_le_bytes());
    }

    #[test]
    fn byte_array_dict_size_is_exact() {
        let mut encoder = DictEncoder::<ByteArray>::new();
        encoder
            .put(&[ByteArray::from("aa"), ByteArray::from("b"), ByteArray::from("aa")])
            .unwrap();
        assert_eq!(encoder.dict_encoded_size(), (4 + 2) + (4 + 1));
        let dict = encoder.serialize_dict().unwrap();
        assert_eq!(dict.len(), 11);
    }

    #[test]
    fn indices_reset_per_page() {
        let mut encoder = DictEncoder::<i32>::new();
        encoder.put(&[1, 2]).unwrap();
        let first = encoder.take_page_buffer().unwrap();
        assert_eq!(decode_indices(&first, 2), vec![0, 1]);

        // Second page reuses the table; indices start empty.
        encoder.put(&[2, 2, 1]).unwrap();
        let second = encoder.take_page_buffer().unwrap();
        assert_eq!(decode_indices(&second, 3), vec![1, 1, 0]);
    }

    #[test]
    fn put_after_serialize_is_error() {
        let mut encoder = DictEncoder::<i32>::new();
        encoder.put(&[5]).unwrap();
        encoder.serialize_dict().unwrap();
        assert!(encoder.put(&[6]).is_err());
        assert!(encoder.serialize_dict().is_err());
        // Index state survives for pages cut after dictionary emission.
        assert_eq!(encoder.num_entries(), 1);
    }

    #[test]
    fn nan_dedups() {
        let mut encoder = DictEncoder::<f64>::new();
        encoder.put(&[f64::NAN, f64::NAN, 0.5]).unwrap();
        assert_eq!(encoder.num_entries(), 2);
    }
}
