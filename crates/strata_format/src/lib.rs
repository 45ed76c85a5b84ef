//! Write-side column encoding for the strata columnar format.
//!
//! A column chunk is produced by feeding typed values (plus definition and
//! repetition levels for nested data) through a [`column::ColumnWriter`],
//! which buffers levels and encoded values, cuts them into pages, and hands
//! finished pages to a [`page::PageWriter`] transport.

pub mod column;
pub mod encoding;
pub mod metadata;
pub mod page;
pub mod properties;
pub mod testutil;
pub mod types;
