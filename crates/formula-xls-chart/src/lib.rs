//! BIFF8 chart substream model.
//!
//! Legacy `.xls` charts are flat record sequences whose structure is expressed by `BEGIN`/`END`
//! bracket records. This crate:
//! - parses a chart span into a [`ChartTree`] ([`HierarchyBuilder`] / [`parse_chart`]),
//! - exposes series, linked ranges (`AI` records) and chart-type groups for editing,
//! - re-emits the records ([`serialize`]), byte-identical when nothing was changed,
//! - computes automatic value-axis scales ([`scale::compute`]).
//!
//! Linked ranges refer to sheets through the workbook's `EXTERNSHEET` table. The table is
//! shared between all charts of a workbook via [`SharedExternSheet`]; [`InMemoryExternSheet`]
//! is a complete implementation for callers that do not have their own.

mod chart_type;
mod error;
mod externsheet;
mod hierarchy;
mod location;
mod ptg;
mod range;
mod records;
mod resolver;
pub mod scale;
mod serialize;
mod strings;
mod tree;

#[cfg(test)]
mod fuzz_tests;

pub use chart_type::{is_chart_type_record, ChartKind, ChartTypeRecord};
pub use error::{
    ChartError, ChartWarning, EncodeError, RefShape, RetargetError, SeriesError, TruncatedInput,
};
pub use externsheet::{
    register, ExternSheetEntry, ExternSheetTable, InMemoryExternSheet, ListenerId, Registration,
    SharedExternSheet,
};
pub use hierarchy::{BuildOptions, HierarchyBuilder};
pub use location::{CellAddress, Location, LocationParseError};
pub use ptg::{AreaRef3d, CellRef3d, ExpressionToken, MemFunc};
pub use range::{ExternalLink, RangeDescriptor, RangeRole, ReferenceKind};
pub use records::*;
pub use resolver::{CellResolver, CellValue};
pub use scale::{AxisScale, ValueRange};
pub use serialize::{serialize, serialize_to_bytes};
pub use strings::SeriesText;
pub use tree::{
    BatchUpdate, ChartChild, ChartGroup, ChartNode, ChartTree, NewSeries, NodeKind,
    SeriesMembership,
};

/// Parse the chart that starts at the beginning of `stream`.
pub fn parse_chart(stream: &[u8], options: &BuildOptions) -> Result<ChartTree, ChartError> {
    HierarchyBuilder::new(options.clone()).build(stream)
}
