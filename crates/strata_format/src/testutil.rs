//! Utilities useful for testing.
//!
//! Note these aren't placed behind a `cfg(test)` annotation since they
//! should be usable outside of the crate. This is also where the minimal
//! read path lives: just enough decoding to round-trip what the writer
//! produced.

use std::sync::Arc;

use parking_lot::Mutex;
use strata_error::{not_implemented, OptionExt, Result, StrataError};

use crate::encoding::bitutil::BitReader;
use crate::encoding::levels;
use crate::encoding::rle::RleDecoder;
use crate::encoding::Encoding;
use crate::metadata::ColumnDescriptor;
use crate::page::{DataPage, DictionaryPage, PageWriter};
use crate::types::{
    ByteArray, ColumnValue, FixedLenByteArray, FixedWidthType, Int96, PhysicalType,
};

/// A page captured by [`MemoryPageWriter`], in transport order.
#[derive(Debug, Clone)]
pub enum WrittenPage {
    Dictionary(DictionaryPage),
    Data(DataPage),
}

/// State shared between a [`MemoryPageWriter`] and the test observing it.
#[derive(Debug, Default)]
pub struct PageSink {
    pub pages: Vec<WrittenPage>,
    pub closed: bool,
}

/// Page transport that collects pages in memory.
///
/// Reports the raw buffer sizes as bytes written; a real transport would
/// add framing and compression on top.
#[derive(Debug)]
pub struct MemoryPageWriter {
    sink: Arc<Mutex<PageSink>>,
}

impl MemoryPageWriter {
    pub fn new() -> (Self, Arc<Mutex<PageSink>>) {
        let sink = Arc::new(Mutex::new(PageSink::default()));
        (
            MemoryPageWriter {
                sink: sink.clone(),
            },
            sink,
        )
    }
}

impl PageWriter for MemoryPageWriter {
    fn write_data_page(&mut self, page: DataPage) -> Result<i64> {
        let mut sink = self.sink.lock();
        if sink.closed {
            return Err(StrataError::new("Page writer already closed"));
        }
        let bytes = page.values.len()
            + page.definition_levels.as_ref().map_or(0, |b| b.len())
            + page.repetition_levels.as_ref().map_or(0, |b| b.len());
        sink.pages.push(WrittenPage::Data(page));
        Ok(bytes as i64)
    }

    fn write_dictionary_page(&mut self, page: DictionaryPage) -> Result<i64> {
        let mut sink = self.sink.lock();
        if sink.closed {
            return Err(StrataError::new("Page writer already closed"));
        }
        let bytes = page.buffer.len();
        sink.pages.push(WrittenPage::Dictionary(page));
        Ok(bytes as i64)
    }

    fn close(&mut self) -> Result<()> {
        self.sink.lock().closed = true;
        Ok(())
    }
}

/// Plain decoding, the inverse of [`ColumnValue::plain_encode`].
pub trait PlainDecode: ColumnValue {
    /// Decode `num_values` plain encoded values. `type_length` only matters
    /// for fixed length byte arrays.
    fn plain_decode(data: &[u8], num_values: usize, type_length: usize) -> Result<Vec<Self>>;
}

macro_rules! impl_plain_decode_for_fixed {
    ($ty:ty) => {
        impl PlainDecode for $ty {
            fn plain_decode(data: &[u8], num_values: usize, _type_length: usize) -> Result<Vec<Self>> {
                let width = std::mem::size_of::<<$ty as FixedWidthType>::Bytes>();
                if data.len() < width * num_values {
                    return Err(StrataError::new(format!(
                        "Plain buffer of {} bytes too short for {num_values} values",
                        data.len()
                    )));
                }
                Ok((0..num_values)
                    .map(|i| {
                        let bytes = data[i * width..(i + 1) * width]
                            .try_into()
                            .map_err(|_| StrataError::new("Value width mismatch"))?;
                        Ok(<$ty as FixedWidthType>::from_le_bytes(bytes))
                    })
                    .collect::<Result<Vec<_>>>()?)
            }
        }
    };
}

impl_plain_decode_for_fixed!(i32);
impl_plain_decode_for_fixed!(i64);
impl_plain_decode_for_fixed!(f32);
impl_plain_decode_for_fixed!(f64);
impl_plain_decode_for_fixed!(Int96);

impl PlainDecode for bool {
    fn plain_decode(data: &[u8], num_values: usize, _type_length: usize) -> Result<Vec<Self>> {
        let mut reader = BitReader::new(data);
        (0..num_values)
            .map(|_| {
                reader
                    .get_value(1)
                    .map(|v| v != 0)
                    .required("boolean bit")
            })
            .collect()
    }
}

impl PlainDecode for ByteArray {
    fn plain_decode(data: &[u8], num_values: usize, _type_length: usize) -> Result<Vec<Self>> {
        let mut out = Vec::with_capacity(num_values);
        let mut offset = 0;
        for _ in 0..num_values {
            if data.len() < offset + 4 {
                return Err(StrataError::new("Byte array buffer missing length prefix"));
            }
            let len = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
            offset += 4;
            if data.len() < offset + len {
                return Err(StrataError::new("Byte array buffer shorter than its prefix"));
            }
            out.push(ByteArray::from(&data[offset..offset + len]));
            offset += len;
        }
        Ok(out)
    }
}

impl PlainDecode for FixedLenByteArray {
    fn plain_decode(data: &[u8], num_values: usize, type_length: usize) -> Result<Vec<Self>> {
        if data.len() < num_values * type_length {
            return Err(StrataError::new(format!(
                "Fixed length buffer of {} bytes too short for {num_values} values of {type_length}",
                data.len()
            )));
        }
        Ok((0..num_values)
            .map(|i| FixedLenByteArray::from(&data[i * type_length..(i + 1) * type_length]))
            .collect())
    }
}

/// Decode a captured column chunk back into its values and raw levels.
///
/// Returns `(values, def_levels, rep_levels)`; the level vecs stay empty
/// for dimensions whose max level is zero.
pub fn read_column<T: PlainDecode>(
    pages: &[WrittenPage],
    descr: &ColumnDescriptor,
) -> Result<(Vec<T>, Vec<i16>, Vec<i16>)> {
    let type_length = match descr.physical_type() {
        PhysicalType::FixedLenByteArray(len) => len,
        _ => 0,
    };

    let mut dict: Option<Vec<T>> = None;
    let mut values = Vec::new();
    let mut def_levels = Vec::new();
    let mut rep_levels = Vec::new();

    for page in pages {
        match page {
            WrittenPage::Dictionary(dict_page) => {
                if dict.is_some() {
                    return Err(StrataError::new("More than one dictionary page in chunk"));
                }
                dict = Some(T::plain_decode(
                    &dict_page.buffer,
                    dict_page.num_entries as usize,
                    type_length,
                )?);
            }
            WrittenPage::Data(data_page) => {
                let num_values = data_page.num_values as usize;
                let num_encoded = data_page.num_encoded_values as usize;

                if descr.max_rep_level() > 0 {
                    let buffer = data_page
                        .repetition_levels
                        .as_deref()
                        .required("repetition level buffer")?;
                    rep_levels.extend(levels::decode_levels(
                        buffer,
                        descr.max_rep_level(),
                        num_values,
                    )?);
                } else if data_page.repetition_levels.is_some() {
                    return Err(StrataError::new(
                        "Repetition levels on a non-repeated column",
                    ));
                }

                if descr.max_def_level() > 0 {
                    let buffer = data_page
                        .definition_levels
                        .as_deref()
                        .required("definition level buffer")?;
                    def_levels.extend(levels::decode_levels(
                        buffer,
                        descr.max_def_level(),
                        num_values,
                    )?);
                } else if data_page.definition_levels.is_some() {
                    return Err(StrataError::new("Definition levels on a required column"));
                }

                match data_page.encoding {
                    Encoding::Plain => {
                        values.extend(T::plain_decode(&data_page.values, num_encoded, type_length)?)
                    }
                    Encoding::PlainDictionary => {
                        let dict = dict.as_ref().required("dictionary page before data page")?;
                        let (bit_width, payload) = data_page
                            .values
                            .split_first()
                            .required("dictionary index bit width")?;
                        let indices: Vec<u32> =
                            RleDecoder::new(*bit_width, payload).get_batch(num_encoded)?;
                        if indices.len() != num_encoded {
                            return Err(StrataError::new(format!(
                                "Expected {num_encoded} dictionary indices, decoded {}",
                                indices.len()
                            )));
                        }
                        for index in indices {
                            let value = dict
                                .get(index as usize)
                                .required("dictionary index in range")?;
                            values.push(value.clone());
                        }
                    }
                    other => not_implemented!("reading encoding {other:?}"),
                }
            }
        }
    }

    Ok((values, def_levels, rep_levels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_writer_rejects_pages_after_close() {
        let (mut writer, _sink) = MemoryPageWriter::new();
        writer.close().unwrap();
        let err = writer
            .write_dictionary_page(DictionaryPage {
                num_entries: 0,
                encoding: Encoding::PlainDictionary,
                buffer: Vec::new(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn plain_decode_int96() {
        let v = Int96::new([9, 8, 7]);
        let mut data = Vec::new();
        data.extend_from_slice(&FixedWidthType::to_le_bytes(&v));
        let decoded = Int96::plain_decode(&data, 1, 0).unwrap();
        assert_eq!(decoded, vec![v]);
    }
}
