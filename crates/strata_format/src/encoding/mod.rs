pub mod bitutil;
pub mod dictionary;
pub mod levels;
pub mod plain;
pub mod rle;

/// Value encodings a page can carry.
///
/// The writer produces `Plain`, `PlainDictionary` and `Rle` (for levels and
/// dictionary indices); the rest are listed so requested-but-unsupported
/// encodings are named, not numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    PlainDictionary,
    Rle,
    BitPacked,
    DeltaBinaryPacked,
    DeltaLengthByteArray,
    DeltaByteArray,
    RleDictionary,
    ByteStreamSplit,
}
