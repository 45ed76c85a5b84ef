//! Column metadata.

mod column;

pub use column::{ColumnDescriptor, ColumnPath};
