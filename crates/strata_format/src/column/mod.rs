//! Column chunk writing.

mod writer;

pub use writer::{make_column_writer, num_defined, ColumnWriter, TypedColumnWriter};
