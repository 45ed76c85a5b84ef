//! Pages and the page transport interface.

use std::fmt::Debug;

use strata_error::Result;

use crate::encoding::Encoding;

/// A finished data page, ready for transport.
///
/// Level buffers are present exactly when the schema's max level for that
/// dimension is positive; see [`crate::encoding::levels`] for their layout.
/// `num_values` counts logical slots including nulls, `num_encoded_values`
/// only the values present in `values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPage {
    pub num_values: i64,
    pub num_encoded_values: i64,
    pub encoding: Encoding,
    pub definition_levels: Option<Vec<u8>>,
    pub definition_level_encoding: Encoding,
    pub repetition_levels: Option<Vec<u8>>,
    pub repetition_level_encoding: Encoding,
    pub values: Vec<u8>,
}

/// A serialized dictionary page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryPage {
    pub num_entries: i64,
    pub encoding: Encoding,
    pub buffer: Vec<u8>,
}

/// Transport for finished pages.
///
/// Implementations own framing, compression and the underlying byte sink.
/// Page buffers are moved into the calls and must be serialized
/// synchronously; the transport may not retain them. Write methods return
/// the bytes written to the sink.
pub trait PageWriter: Debug {
    fn write_data_page(&mut self, page: DataPage) -> Result<i64>;

    fn write_dictionary_page(&mut self, page: DictionaryPage) -> Result<i64>;

    /// Finalize the underlying sink. No pages may be written afterwards.
    fn close(&mut self) -> Result<()>;
}
