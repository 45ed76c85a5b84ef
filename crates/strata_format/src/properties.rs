//! Writer configuration.

use std::collections::HashMap;

use crate::encoding::Encoding;
use crate::metadata::ColumnPath;

/// Default threshold at which the writer cuts a data page.
pub const DEFAULT_DATA_PAGE_SIZE_LIMIT: usize = 1024 * 1024;

/// Configuration consumed by the writer factory: per column encodings and
/// the page flush policy.
#[derive(Debug, Clone)]
pub struct WriterProperties {
    data_page_size_limit: usize,
    default_encoding: Encoding,
    column_encodings: HashMap<ColumnPath, Encoding>,
}

impl WriterProperties {
    pub fn builder() -> WriterPropertiesBuilder {
        WriterPropertiesBuilder::default()
    }

    /// Requested encoding for a column, falling back to the default.
    pub fn encoding(&self, path: &ColumnPath) -> Encoding {
        self.column_encodings
            .get(path)
            .copied()
            .unwrap_or(self.default_encoding)
    }

    /// Buffered page size at which the writer cuts a data page.
    pub fn data_page_size_limit(&self) -> usize {
        self.data_page_size_limit
    }
}

impl Default for WriterProperties {
    fn default() -> Self {
        WriterProperties::builder().build()
    }
}

pub fn default_writer_properties() -> WriterProperties {
    WriterProperties::default()
}

#[derive(Debug)]
pub struct WriterPropertiesBuilder {
    data_page_size_limit: usize,
    default_encoding: Encoding,
    column_encodings: HashMap<ColumnPath, Encoding>,
}

impl Default for WriterPropertiesBuilder {
    fn default() -> Self {
        WriterPropertiesBuilder {
            data_page_size_limit: DEFAULT_DATA_PAGE_SIZE_LIMIT,
            default_encoding: Encoding::Plain,
            column_encodings: HashMap::new(),
        }
    }
}

impl WriterPropertiesBuilder {
    pub fn data_page_size_limit(mut self, limit: usize) -> Self {
        self.data_page_size_limit = limit;
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.default_encoding = encoding;
        self
    }

    pub fn column_encoding(mut self, path: impl Into<ColumnPath>, encoding: Encoding) -> Self {
        self.column_encodings.insert(path.into(), encoding);
        self
    }

    pub fn build(self) -> WriterProperties {
        WriterProperties {
            data_page_size_limit: self.data_page_size_limit,
            default_encoding: self.default_encoding,
            column_encodings: self.column_encodings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_column_encoding_overrides_default() {
        let props = WriterProperties::builder()
            .column_encoding("nested.leaf", Encoding::PlainDictionary)
            .build();
        assert_eq!(props.encoding(&ColumnPath::from("other")), Encoding::Plain);
        assert_eq!(
            props.encoding(&ColumnPath::from("nested.leaf")),
            Encoding::PlainDictionary
        );
    }

    #[test]
    fn defaults() {
        let props = default_writer_properties();
        assert_eq!(props.data_page_size_limit(), DEFAULT_DATA_PAGE_SIZE_LIMIT);
    }
}
