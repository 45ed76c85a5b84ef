//! RLE/bit-packing hybrid encoding.
//!
//! The grammar, from the format spec:
//!
//! ```text
//! rle-bit-packed-hybrid: <run>*
//! run := <bit-packed-run> | <rle-run>
//! bit-packed-run := varint(groups << 1 | 1) <bit-packed values, 8 per group>
//! rle-run := varint(repeat-count << 1) <repeated value, ceil(bit-width/8) bytes>
//! ```
//!
//! Runs of 8 or more repeats become RLE runs; everything else bit-packs in
//! groups of 8. Level buffers prepend a 4 byte length to this payload, see
//! [`super::levels`].

use num::cast::FromPrimitive;
use strata_error::{Result, StrataError};

use crate::encoding::bitutil::{self, BitReader, BitWriter};

/// Maximum groups of 8 values in one bit-packed run, so the run header
/// always fits a single varint byte.
const MAX_GROUPS_PER_BIT_PACKED_RUN: usize = 1 << 6;

/// Streaming encoder for the hybrid scheme.
///
/// Values are buffered 8 at a time; each full group is committed as either a
/// continuation of a bit-packed run or the start of an RLE run depending on
/// the repeat count seen so far.
#[derive(Debug)]
pub struct RleEncoder {
    /// Bits per encoded value, in `[0, 64]`.
    bit_width: u8,

    bit_writer: BitWriter,

    /// Values waiting for a full group of 8.
    buffered_values: [u64; 8],
    num_buffered_values: usize,

    /// Last value seen and how many times in a row.
    current_value: u64,
    repeat_count: usize,

    /// Values committed to the open bit-packed run, not counting
    /// `buffered_values`.
    bit_packed_count: usize,

    /// Reserved position of the open bit-packed run's header byte.
    indicator_byte_pos: Option<usize>,
}

impl RleEncoder {
    pub fn new(bit_width: u8) -> Self {
        RleEncoder::new_from_buf(bit_width, Vec::new())
    }

    /// Encode into an existing buffer, appending after its current contents.
    pub fn new_from_buf(bit_width: u8, buffer: Vec<u8>) -> Self {
        debug_assert!(bit_width <= 64);
        RleEncoder {
            bit_width,
            bit_writer: BitWriter::new_from_buf(buffer),
            buffered_values: [0; 8],
            num_buffered_values: 0,
            current_value: 0,
            repeat_count: 0,
            bit_packed_count: 0,
            indicator_byte_pos: None,
        }
    }

    /// Worst case payload size for `num_values` values at `bit_width`.
    ///
    /// The worst cases are all-literal (every group of 8 bit-packed under its
    /// own header) and all-RLE (a separate 8-repeat run per group); size for
    /// whichever is larger.
    pub fn max_buffer_size(bit_width: u8, num_values: usize) -> usize {
        let num_runs = bitutil::ceil(num_values, 8);

        // A group of 8 values bit-packs into `bit_width` bytes, plus one
        // header byte per run.
        let bit_packed_max_size = num_runs + num_runs * bit_width as usize;

        // An RLE run of 8 is one varint byte plus the repeated value.
        let min_rle_run_size = 1 + bitutil::ceil(bit_width as usize, 8);
        let rle_max_size = num_runs * min_rle_run_size;

        bit_packed_max_size.max(rle_max_size)
    }

    /// Encode `value`, which must be representable in `bit_width` bits.
    pub fn put(&mut self, value: u64) {
        if self.current_value == value {
            self.repeat_count += 1;
            if self.repeat_count > 8 {
                // Continuation of an already-committed RLE run.
                return;
            }
        } else {
            if self.repeat_count >= 8 {
                // The RLE run ended. Commit it before starting over.
                assert_eq!(self.bit_packed_count, 0);
                self.flush_rle_run();
            }
            self.repeat_count = 1;
            self.current_value = value;
        }

        self.buffered_values[self.num_buffered_values] = value;
        self.num_buffered_values += 1;
        if self.num_buffered_values == 8 {
            assert_eq!(self.bit_packed_count % 8, 0);
            self.flush_buffered_values();
        }
    }

    /// Bytes written so far, not counting buffered values.
    pub fn len(&self) -> usize {
        self.bit_writer.bytes_written()
    }

    pub fn is_empty(&self) -> bool {
        self.bit_writer.bytes_written() == 0
    }

    /// Flush any open run and return the buffer.
    pub fn consume(mut self) -> Vec<u8> {
        self.flush();
        self.bit_writer.consume()
    }

    /// Flush all pending state into the underlying writer.
    fn flush(&mut self) {
        if self.bit_packed_count > 0 || self.repeat_count > 0 || self.num_buffered_values > 0 {
            let all_repeat = self.bit_packed_count == 0
                && (self.repeat_count == self.num_buffered_values || self.num_buffered_values == 0);
            if self.repeat_count > 0 && all_repeat {
                self.flush_rle_run();
            } else {
                // Pad the final group to 8 with zeros.
                while self.num_buffered_values > 0 && self.num_buffered_values < 8 {
                    self.buffered_values[self.num_buffered_values] = 0;
                    self.num_buffered_values += 1;
                }
                self.bit_packed_count += self.num_buffered_values;
                self.flush_bit_packed_run(true);
                self.repeat_count = 0;
            }
        }
    }

    fn flush_rle_run(&mut self) {
        assert!(self.repeat_count > 0);
        self.bit_writer.put_vlq_int((self.repeat_count << 1) as u64);
        self.bit_writer
            .put_aligned(self.current_value, bitutil::ceil(self.bit_width as usize, 8));
        self.num_buffered_values = 0;
        self.repeat_count = 0;
    }

    fn flush_bit_packed_run(&mut self, update_indicator_byte: bool) {
        let indicator_pos = match self.indicator_byte_pos {
            Some(pos) => pos,
            None => {
                let pos = self.bit_writer.skip(1);
                self.indicator_byte_pos = Some(pos);
                pos
            }
        };

        for i in 0..self.num_buffered_values {
            self.bit_writer
                .put_value(self.buffered_values[i], self.bit_width as usize);
        }
        self.num_buffered_values = 0;

        if update_indicator_byte {
            let num_groups = self.bit_packed_count / 8;
            let indicator_byte = ((num_groups << 1) | 1) as u8;
            self.bit_writer
                .put_aligned_offset(indicator_byte as u64, 1, indicator_pos);
            self.indicator_byte_pos = None;
            self.bit_packed_count = 0;
        }
    }

    /// Commit a full group of 8 buffered values to a run.
    fn flush_buffered_values(&mut self) {
        if self.repeat_count >= 8 {
            // The group repeats; it becomes (or continues) an RLE run. Any
            // open bit-packed run ends here.
            self.num_buffered_values = 0;
            if self.bit_packed_count > 0 {
                assert_eq!(self.bit_packed_count % 8, 0);
                self.flush_bit_packed_run(true);
            }
            return;
        }

        self.bit_packed_count += self.num_buffered_values;
        let num_groups = self.bit_packed_count / 8;
        if num_groups + 1 >= MAX_GROUPS_PER_BIT_PACKED_RUN {
            // Run is as long as a one byte header can describe.
            assert!(self.indicator_byte_pos.is_some());
            self.flush_bit_packed_run(true);
        } else {
            self.flush_bit_packed_run(false);
        }
        self.repeat_count = 0;
    }
}

/// Decoder for the hybrid scheme.
///
/// Exists for dictionary index decoding and round-trip validation; the write
/// path never consumes it.
#[derive(Debug)]
pub struct RleDecoder<'a> {
    bit_width: u8,
    bit_reader: BitReader<'a>,

    /// Values left in the current RLE run.
    rle_left: u64,
    /// Values left in the current bit-packed run.
    bit_packed_left: u64,
    /// Repeated value of the current RLE run.
    current_value: u64,
}

impl<'a> RleDecoder<'a> {
    pub fn new(bit_width: u8, data: &'a [u8]) -> Self {
        RleDecoder {
            bit_width,
            bit_reader: BitReader::new(data),
            rle_left: 0,
            bit_packed_left: 0,
            current_value: 0,
        }
    }

    /// Decode the next value, or `None` when the data is exhausted.
    pub fn get<T: FromPrimitive>(&mut self) -> Result<Option<T>> {
        while self.rle_left == 0 && self.bit_packed_left == 0 {
            if !self.reload() {
                return Ok(None);
            }
        }

        let raw = if self.rle_left > 0 {
            self.rle_left -= 1;
            self.current_value
        } else {
            let v = self
                .bit_reader
                .get_value(self.bit_width as usize)
                .ok_or_else(|| StrataError::new("Truncated bit-packed run"))?;
            self.bit_packed_left -= 1;
            v
        };

        T::from_u64(raw)
            .ok_or_else(|| StrataError::new(format!("Decoded value {raw} out of range")))
            .map(Some)
    }

    /// Decode up to `num_values` values. The result is shorter only if the
    /// data ran out first.
    pub fn get_batch<T: FromPrimitive>(&mut self, num_values: usize) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(num_values);
        while out.len() < num_values {
            match self.get()? {
                Some(v) => out.push(v),
                None => break,
            }
        }
        Ok(out)
    }

    fn reload(&mut self) -> bool {
        let Some(indicator) = self.bit_reader.get_vlq_int() else {
            return false;
        };
        // Some writers pad pages with zeros; a zero indicator is padding,
        // not a run.
        if indicator == 0 {
            return false;
        }
        if indicator & 1 == 1 {
            self.bit_packed_left = (indicator >> 1) * 8;
        } else {
            self.rle_left = indicator >> 1;
            let value_width = bitutil::ceil(self.bit_width as usize, 8);
            match self.bit_reader.get_aligned(value_width) {
                Some(v) => self.current_value = v,
                None => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn roundtrip(values: &[u64], bit_width: u8) {
        let mut encoder = RleEncoder::new(bit_width);
        for v in values {
            encoder.put(*v);
        }
        let buffer = encoder.consume();
        assert!(buffer.len() <= RleEncoder::max_buffer_size(bit_width, values.len()));

        let mut decoder = RleDecoder::new(bit_width, &buffer);
        let decoded: Vec<u64> = decoder.get_batch(values.len()).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn rle_runs_exact_bytes() {
        // 50 zeros then 50 ones at bit width 1: two RLE runs.
        let mut values = vec![0u64; 50];
        values.extend(std::iter::repeat(1).take(50));

        let mut encoder = RleEncoder::new(1);
        for v in &values {
            encoder.put(*v);
        }
        let buffer = encoder.consume();
        assert_eq!(buffer, vec![50 << 1, 0, 50 << 1, 1]);

        let mut decoder = RleDecoder::new(1, &buffer);
        let decoded: Vec<u64> = decoder.get_batch(100).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn bit_packed_alternating_exact_bytes() {
        // 100 alternating bits never repeat 8 times, so everything
        // bit-packs: 13 groups, the last padded with zeros.
        let values: Vec<u64> = (0..100).map(|i| i % 2).collect();

        let mut encoder = RleEncoder::new(1);
        for v in &values {
            encoder.put(*v);
        }
        let buffer = encoder.consume();

        let num_groups = bitutil::ceil(100, 8);
        let mut expected = vec![((num_groups << 1) | 1) as u8];
        expected.resize(1 + 100 / 8, 0b10101010);
        expected.push(0b00001010);
        assert_eq!(buffer, expected);

        let mut decoder = RleDecoder::new(1, &buffer);
        let decoded: Vec<u64> = decoder.get_batch(100).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn mixed_runs() {
        // An RLE run, then literals, then another RLE run.
        let mut values = vec![3u64; 20];
        values.extend([0, 1, 2, 3, 4, 5, 6, 7]);
        values.extend(std::iter::repeat(5).take(16));
        roundtrip(&values, 3);
    }

    #[test]
    fn single_values_per_width() {
        for bit_width in 1..=32u8 {
            let max = if bit_width == 64 {
                u64::MAX
            } else {
                (1u64 << bit_width) - 1
            };
            roundtrip(&[max], bit_width);
            roundtrip(&[0], bit_width);
        }
    }

    #[test]
    fn long_bit_packed_run_splits() {
        // More than 63 groups of literals forces multiple bit-packed runs.
        let values: Vec<u64> = (0..1000).map(|i| i % 2).collect();
        roundtrip(&values, 1);
    }

    #[test]
    fn zero_bit_width() {
        // Levels for max level 0 never hit this path, but a single-entry
        // dictionary can produce width 0 runs on the decode side.
        let values = vec![0u64; 17];
        roundtrip(&values, 0);
    }

    #[test]
    fn random_roundtrip() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for bit_width in [1u8, 2, 3, 5, 7, 8, 11, 16] {
            let mut values = Vec::new();
            while values.len() < 2000 {
                let run_len = rng.gen_range(1..20);
                let v = rng.gen_range(0..(1u64 << bit_width));
                values.extend(std::iter::repeat(v).take(run_len));
            }
            roundtrip(&values, bit_width);
        }
    }
}
