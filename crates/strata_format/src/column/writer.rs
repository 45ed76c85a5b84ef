use strata_error::{not_implemented, Result, StrataError};
use tracing::{debug, trace};

use crate::encoding::dictionary::DictEncoder;
use crate::encoding::levels;
use crate::encoding::plain::PlainEncoder;
use crate::encoding::Encoding;
use crate::metadata::ColumnDescriptor;
use crate::page::{DataPage, DictionaryPage, PageWriter};
use crate::properties::WriterProperties;
use crate::types::{ByteArray, ColumnValue, FixedLenByteArray, Int96, PhysicalType};

/// Count of positions present at the maximum definition level, i.e. the
/// non-null entries of a batch.
pub fn num_defined(def_levels: &[i16], max_def_level: i16) -> usize {
    def_levels.iter().filter(|&&l| l == max_def_level).count()
}

/// Immutable snapshot of one page's buffers, taken when the page is cut.
/// Level buffers are already RLE encoded at this point.
#[derive(Debug)]
struct DataPageBuffers {
    num_values: i64,
    num_encoded_values: i64,
    definition_levels: Option<Vec<u8>>,
    repetition_levels: Option<Vec<u8>>,
    values: Vec<u8>,
}

/// Type independent writer state: raw level buffers for the in-progress
/// page, pages cut but not yet transported, running accounting, and the
/// transport itself.
#[derive(Debug)]
struct WriterCore {
    descr: ColumnDescriptor,
    pager: Box<dyn PageWriter>,
    expected_rows: i64,
    has_dictionary: bool,
    data_page_size_limit: usize,

    def_levels: Vec<i16>,
    rep_levels: Vec<i16>,
    pending_pages: Vec<DataPageBuffers>,

    /// Logical values buffered for the current page, nulls included.
    num_buffered_values: i64,
    /// Values actually handed to the value encoder, nulls excluded.
    num_buffered_encoded_values: i64,
    num_rows: i64,
    total_bytes_written: i64,
}

impl WriterCore {
    /// Snapshot the buffered state into a pending page and reset the
    /// buffers. Pure buffering; the transport isn't touched.
    fn add_data_page(&mut self, values: Vec<u8>) -> Result<()> {
        let num_values = self.num_buffered_values as usize;

        let definition_levels = if self.descr.max_def_level() > 0 {
            Some(levels::encode_levels(
                &self.def_levels,
                self.descr.max_def_level(),
                num_values,
            )?)
        } else {
            None
        };
        let repetition_levels = if self.descr.max_rep_level() > 0 {
            Some(levels::encode_levels(
                &self.rep_levels,
                self.descr.max_rep_level(),
                num_values,
            )?)
        } else {
            None
        };

        trace!(
            num_values = self.num_buffered_values,
            num_encoded_values = self.num_buffered_encoded_values,
            "cutting data page"
        );
        self.pending_pages.push(DataPageBuffers {
            num_values: self.num_buffered_values,
            num_encoded_values: self.num_buffered_encoded_values,
            definition_levels,
            repetition_levels,
            values,
        });

        self.def_levels.clear();
        self.rep_levels.clear();
        self.num_buffered_values = 0;
        self.num_buffered_encoded_values = 0;
        Ok(())
    }

    /// Hand one cut page to the transport.
    fn write_new_page(&mut self, buffers: DataPageBuffers) -> Result<()> {
        let encoding = if self.has_dictionary {
            Encoding::PlainDictionary
        } else {
            Encoding::Plain
        };
        let page = DataPage {
            num_values: buffers.num_values,
            num_encoded_values: buffers.num_encoded_values,
            encoding,
            definition_levels: buffers.definition_levels,
            definition_level_encoding: Encoding::Rle,
            repetition_levels: buffers.repetition_levels,
            repetition_level_encoding: Encoding::Rle,
            values: buffers.values,
        };
        trace!(num_values = page.num_values, "writing data page");
        let bytes_written = self.pager.write_data_page(page)?;
        self.total_bytes_written += bytes_written;
        Ok(())
    }

    fn estimated_buffered_size(&self, encoder_size: usize) -> usize {
        encoder_size + 2 * (self.def_levels.len() + self.rep_levels.len())
    }
}

/// The active value encoder. Closed set: plain, or dictionary for writers
/// constructed with a dictionary encoding.
#[derive(Debug)]
enum ValuesEncoder<T: ColumnValue> {
    Plain(PlainEncoder<T>),
    Dict(DictEncoder<T>),
}

impl<T: ColumnValue> ValuesEncoder<T> {
    fn put(&mut self, values: &[T]) -> Result<()> {
        match self {
            ValuesEncoder::Plain(encoder) => encoder.put(values),
            ValuesEncoder::Dict(encoder) => encoder.put(values),
        }
    }

    fn estimated_size(&self) -> usize {
        match self {
            ValuesEncoder::Plain(encoder) => encoder.estimated_size(),
            ValuesEncoder::Dict(encoder) => encoder.estimated_data_size(),
        }
    }

    fn take_page_buffer(&mut self) -> Result<Vec<u8>> {
        match self {
            ValuesEncoder::Plain(encoder) => Ok(encoder.take_page_buffer()),
            ValuesEncoder::Dict(encoder) => encoder.take_page_buffer(),
        }
    }
}

/// Writer for one column chunk of a known physical type.
///
/// Values stream in through [`write_batch`](Self::write_batch); pages are
/// cut when the buffered estimate crosses the configured page size (or on
/// demand via [`add_data_page`](Self::add_data_page)) and reach the
/// transport when the writer closes. Closing consumes the writer, so a
/// closed writer can't be written to by construction.
#[derive(Debug)]
pub struct TypedColumnWriter<T: ColumnValue> {
    core: WriterCore,
    encoder: ValuesEncoder<T>,
}

impl<T: ColumnValue> TypedColumnWriter<T> {
    pub fn new(
        descr: ColumnDescriptor,
        pager: Box<dyn PageWriter>,
        expected_rows: i64,
        encoding: Encoding,
        props: &WriterProperties,
    ) -> Result<Self> {
        let encoder = match encoding {
            Encoding::Plain => ValuesEncoder::Plain(PlainEncoder::new()),
            Encoding::PlainDictionary | Encoding::RleDictionary => {
                ValuesEncoder::Dict(DictEncoder::new())
            }
            other => not_implemented!("value encoding {other:?}"),
        };
        let has_dictionary = matches!(encoder, ValuesEncoder::Dict(_));

        Ok(TypedColumnWriter {
            core: WriterCore {
                descr,
                pager,
                expected_rows,
                has_dictionary,
                data_page_size_limit: props.data_page_size_limit(),
                def_levels: Vec::new(),
                rep_levels: Vec::new(),
                pending_pages: Vec::new(),
                num_buffered_values: 0,
                num_buffered_encoded_values: 0,
                num_rows: 0,
                total_bytes_written: 0,
            },
            encoder,
        })
    }

    /// Write a batch of values with their levels.
    ///
    /// The logical batch length comes from `def_levels` when present, else
    /// from `values`. `values` holds only the non-null entries, in order;
    /// positions whose definition level is below the maximum consume a
    /// logical slot without consuming a value. Level slices are required
    /// exactly for the dimensions whose max level is positive.
    pub fn write_batch(
        &mut self,
        def_levels: Option<&[i16]>,
        rep_levels: Option<&[i16]>,
        values: &[T],
    ) -> Result<()> {
        let max_def = self.core.descr.max_def_level();
        let max_rep = self.core.descr.max_rep_level();

        let num_values = match def_levels {
            Some(defs) => defs.len(),
            None => values.len(),
        };

        let values_to_write = match def_levels {
            Some(defs) => {
                if max_def == 0 {
                    return Err(StrataError::new(
                        "Definition levels passed for a column with max definition level 0",
                    ));
                }
                num_defined(defs, max_def)
            }
            None => {
                if max_def > 0 {
                    return Err(StrataError::new(format!(
                        "Definition levels required, column max definition level is {max_def}"
                    )));
                }
                values.len()
            }
        };
        if values.len() < values_to_write {
            return Err(StrataError::new(format!(
                "Batch has {values_to_write} defined entries but only {} values",
                values.len()
            )));
        }

        match rep_levels {
            Some(reps) => {
                if max_rep == 0 {
                    return Err(StrataError::new(
                        "Repetition levels passed for a column with max repetition level 0",
                    ));
                }
                if reps.len() != num_values {
                    return Err(StrataError::new(format!(
                        "Batch has {num_values} logical values but {} repetition levels",
                        reps.len()
                    )));
                }
                // A new row starts wherever the repetition level drops back
                // to zero.
                self.core.num_rows += reps.iter().filter(|&&r| r == 0).count() as i64;
            }
            None => {
                if max_rep > 0 {
                    return Err(StrataError::new(format!(
                        "Repetition levels required, column max repetition level is {max_rep}"
                    )));
                }
                self.core.num_rows += num_values as i64;
            }
        }

        if let Some(defs) = def_levels {
            self.core.def_levels.extend_from_slice(defs);
        }
        if let Some(reps) = rep_levels {
            self.core.rep_levels.extend_from_slice(reps);
        }

        self.encoder.put(&values[..values_to_write])?;
        self.core.num_buffered_values += num_values as i64;
        self.core.num_buffered_encoded_values += values_to_write as i64;

        if self.core.estimated_buffered_size(self.encoder.estimated_size())
            >= self.core.data_page_size_limit
        {
            self.add_data_page()?;
        }
        Ok(())
    }

    /// Cut the buffered state into a pending page. Callable between batches
    /// at any point; a no-op when nothing is buffered.
    pub fn add_data_page(&mut self) -> Result<()> {
        if self.core.num_buffered_values == 0 {
            return Ok(());
        }
        let values = self.encoder.take_page_buffer()?;
        self.core.add_data_page(values)
    }

    /// Serialize the dictionary and hand it to the transport. Happens at
    /// most once, before any data page.
    fn write_dictionary_page(&mut self) -> Result<()> {
        let dict = match &mut self.encoder {
            ValuesEncoder::Dict(dict) => dict,
            ValuesEncoder::Plain(_) => {
                return Err(StrataError::new(
                    "Dictionary page requested for a plain encoded column",
                ))
            }
        };
        let num_entries = dict.num_entries() as i64;
        let buffer = dict.serialize_dict()?;

        trace!(num_entries, "writing dictionary page");
        let bytes_written = self.core.pager.write_dictionary_page(DictionaryPage {
            num_entries,
            encoding: Encoding::PlainDictionary,
            buffer,
        })?;
        self.core.total_bytes_written += bytes_written;
        Ok(())
    }

    /// Flush everything and finalize the transport, returning total bytes
    /// written. The dictionary page (if any) goes first, then the cut pages
    /// in the order they were cut. Writing fewer rows than the chunk
    /// declared is a structural error.
    pub fn close(mut self) -> Result<i64> {
        if self.core.has_dictionary {
            self.write_dictionary_page()?;
        }
        if self.core.num_buffered_values > 0 {
            let values = self.encoder.take_page_buffer()?;
            self.core.add_data_page(values)?;
        }

        for buffers in std::mem::take(&mut self.core.pending_pages) {
            self.core.write_new_page(buffers)?;
        }

        if self.core.num_rows != self.core.expected_rows {
            return Err(StrataError::new(format!(
                "Wrote {} rows in column chunk, expected {}",
                self.core.num_rows, self.core.expected_rows
            )));
        }

        self.core.pager.close()?;
        debug!(
            num_rows = self.core.num_rows,
            total_bytes = self.core.total_bytes_written,
            "closed column writer"
        );
        Ok(self.core.total_bytes_written)
    }

    pub fn descriptor(&self) -> &ColumnDescriptor {
        &self.core.descr
    }
}

/// A column writer of some physical type.
#[derive(Debug)]
pub enum ColumnWriter {
    Boolean(TypedColumnWriter<bool>),
    Int32(TypedColumnWriter<i32>),
    Int64(TypedColumnWriter<i64>),
    Int96(TypedColumnWriter<Int96>),
    Float(TypedColumnWriter<f32>),
    Double(TypedColumnWriter<f64>),
    ByteArray(TypedColumnWriter<ByteArray>),
    FixedLenByteArray(TypedColumnWriter<FixedLenByteArray>),
}

impl ColumnWriter {
    pub fn close(self) -> Result<i64> {
        match self {
            ColumnWriter::Boolean(writer) => writer.close(),
            ColumnWriter::Int32(writer) => writer.close(),
            ColumnWriter::Int64(writer) => writer.close(),
            ColumnWriter::Int96(writer) => writer.close(),
            ColumnWriter::Float(writer) => writer.close(),
            ColumnWriter::Double(writer) => writer.close(),
            ColumnWriter::ByteArray(writer) => writer.close(),
            ColumnWriter::FixedLenByteArray(writer) => writer.close(),
        }
    }
}

/// Construct the writer matching a column's physical type, with the
/// encoding the properties request for its path.
pub fn make_column_writer(
    descr: ColumnDescriptor,
    pager: Box<dyn PageWriter>,
    expected_rows: i64,
    props: &WriterProperties,
) -> Result<ColumnWriter> {
    let encoding = props.encoding(descr.path());
    Ok(match descr.physical_type() {
        PhysicalType::Boolean => ColumnWriter::Boolean(TypedColumnWriter::new(
            descr,
            pager,
            expected_rows,
            encoding,
            props,
        )?),
        PhysicalType::Int32 => ColumnWriter::Int32(TypedColumnWriter::new(
            descr,
            pager,
            expected_rows,
            encoding,
            props,
        )?),
        PhysicalType::Int64 => ColumnWriter::Int64(TypedColumnWriter::new(
            descr,
            pager,
            expected_rows,
            encoding,
            props,
        )?),
        PhysicalType::Int96 => ColumnWriter::Int96(TypedColumnWriter::new(
            descr,
            pager,
            expected_rows,
            encoding,
            props,
        )?),
        PhysicalType::Float => ColumnWriter::Float(TypedColumnWriter::new(
            descr,
            pager,
            expected_rows,
            encoding,
            props,
        )?),
        PhysicalType::Double => ColumnWriter::Double(TypedColumnWriter::new(
            descr,
            pager,
            expected_rows,
            encoding,
            props,
        )?),
        PhysicalType::ByteArray => ColumnWriter::ByteArray(TypedColumnWriter::new(
            descr,
            pager,
            expected_rows,
            encoding,
            props,
        )?),
        PhysicalType::FixedLenByteArray(_) => ColumnWriter::FixedLenByteArray(
            TypedColumnWriter::new(descr, pager, expected_rows, encoding, props)?,
        ),
    })
}
