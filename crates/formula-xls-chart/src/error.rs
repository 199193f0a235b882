use core::fmt;

use thiserror::Error;

use crate::location::LocationParseError;

/// A record header or payload extends past the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("truncated BIFF record at offset {offset}: needed {needed} bytes but only {remaining} remain")]
pub struct TruncatedInput {
    /// Offset of the record header in the parent stream.
    pub offset: usize,
    pub needed: usize,
    pub remaining: usize,
}

/// Fatal chart parse failures. The chart cannot be round-tripped when any of these occur.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error(transparent)]
    Truncated(#[from] TruncatedInput),
    #[error("chart record stream is empty")]
    Empty,
    #[error("chart record 0x{record_id:04X} is not followed by a BEGIN record")]
    MissingHierarchy { record_id: u16 },
    #[error("BEGIN record at index {index} (offset {offset}) has no matching END")]
    UnmatchedBracket { index: usize, offset: usize },
    #[error("END record at index {index} (offset {offset}) has no matching BEGIN")]
    UnexpectedEnd { index: usize, offset: usize },
    #[error("chart nesting exceeds {max_depth} levels at index {index}")]
    NestingTooDeep { index: usize, max_depth: usize },
}

/// Whether a reference addresses one cell or a rectangular area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefShape {
    Cell,
    Area,
}

impl fmt::Display for RefShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefShape::Cell => f.write_str("cell"),
            RefShape::Area => f.write_str("area"),
        }
    }
}

/// Failure to rebind a [`crate::RangeDescriptor`]. The descriptor is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetargetError {
    #[error("invalid location `{location}`: {source}")]
    InvalidLocation {
        location: String,
        #[source]
        source: LocationParseError,
    },
    #[error("cannot replace a {existing} reference with a {replacement} reference inside a non-contiguous range")]
    ShapeMismatch {
        existing: RefShape,
        replacement: RefShape,
    },
    #[error("sheet `{0}` is not present in the cross-sheet reference table")]
    UnknownSheet(String),
    #[error("location `{0}` names no sheet and there is no sheet to inherit")]
    MissingSheet(String),
    #[error("rebound AI payload would be {len} bytes, more than a record can hold")]
    ExpressionTooLarge { len: usize },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("record 0x{record_id:04X} payload of {len} bytes does not fit the 16-bit length field")]
    PayloadTooLarge { record_id: u16, len: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Non-fatal issues surfaced while building or retargeting a chart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartWarning {
    /// A recognized record could not be decoded and was kept as an opaque record.
    #[error("malformed record 0x{record_id:04X} at index {index} kept as opaque: {reason}")]
    MalformedRecord {
        index: usize,
        record_id: u16,
        reason: String,
    },
    /// A sheet retarget could not resolve the destination sheet; the reference now points at
    /// the originating workbook.
    #[error("sheet `{sheet}` could not be resolved; reference degraded to external workbook `{workbook}`")]
    UnresolvableSheet { sheet: String, workbook: String },
}

/// Failure of a series-level edit on a [`crate::ChartTree`]. The tree is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error(transparent)]
    Retarget(#[from] RetargetError),
    #[error("series {index} does not exist (chart has {count})")]
    UnknownSeries { index: usize, count: usize },
    #[error("chart-type group {group} does not exist (chart has {count})")]
    UnknownGroup { group: usize, count: usize },
}
