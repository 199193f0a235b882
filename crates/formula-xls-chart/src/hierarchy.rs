//! Two-pass construction of a [`ChartTree`] from a flat chart record span.
//!
//! Pass one walks the records in order, tracks BEGIN/END depth, and fills side tables (linked
//! ranges, series membership, chart-type records). It stops once the depth returns to zero.
//! Pass two materializes nodes by bracket matching and resolves the queued chart-type records
//! into their groups.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::chart_type::{is_chart_type_record, ChartTypeRecord};
use crate::error::{ChartError, ChartWarning};
use crate::externsheet::SharedExternSheet;
use crate::range::RangeDescriptor;
use crate::records::{
    BiffRecord, BiffRecordIter, RECORD_AI, RECORD_BEGIN, RECORD_CHARTFORMAT, RECORD_DROPBAR,
    RECORD_END, RECORD_SERIES, RECORD_SERIESLIST, RECORD_SERIESTEXT, RECORD_VALUERANGE,
};
use crate::scale::ValueRange;
use crate::strings::SeriesText;
use crate::tree::{parse_series_list, ChartChild, ChartGroup, ChartNode, ChartTree, NodeKind};

/// Windows-1252, the codepage of most BIFF8 workbooks.
const DEFAULT_CODEPAGE: u16 = 1252;
const DEFAULT_MAX_DEPTH: usize = 64;

/// Options for [`HierarchyBuilder`].
#[derive(Clone)]
pub struct BuildOptions {
    /// Workbook codepage, used for 8-bit `SERIESTEXT` strings.
    pub codepage: u16,
    /// Maximum BEGIN nesting accepted before the chart is rejected.
    pub max_depth: usize,
    /// Workbook cross-sheet table that linked ranges resolve and register against.
    pub extern_sheet: Option<SharedExternSheet>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            codepage: DEFAULT_CODEPAGE,
            max_depth: DEFAULT_MAX_DEPTH,
            extern_sheet: None,
        }
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("codepage", &self.codepage)
            .field("max_depth", &self.max_depth)
            .field("extern_sheet", &self.extern_sheet.is_some())
            .finish()
    }
}

/// Builds one chart. Consumed by [`HierarchyBuilder::build`].
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    options: BuildOptions,
}

/// Side tables filled by the first pass.
#[derive(Default)]
struct Scan<'a> {
    records: Vec<BiffRecord<'a>>,
    ranges: BTreeMap<usize, RangeDescriptor>,
    /// `SERIESTEXT` records that were attached to the `AI` before them.
    attached_text: BTreeSet<usize>,
    /// Record index of each `CHARTFORMAT` to its group number.
    chart_formats: BTreeMap<usize, usize>,
    series_count: usize,
    /// `(series, group)` assignments from `SERIESLIST` records.
    list_assignments: Vec<(usize, usize)>,
    chart_types: Vec<(usize, usize)>,
    drop_bar_groups: BTreeSet<usize>,
    warnings: Vec<ChartWarning>,
}

impl Scan<'_> {
    fn malformed(&mut self, index: usize, record_id: u16, reason: String) {
        log::warn!("chart record 0x{record_id:04X} at index {index} is malformed ({reason}); keeping it opaque");
        self.warnings.push(ChartWarning::MalformedRecord {
            index,
            record_id,
            reason,
        });
    }
}

impl HierarchyBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Build the tree for the chart that starts at the beginning of `stream`.
    ///
    /// Records after the chart's closing END are not read; see [`ChartTree::bytes_consumed`].
    pub fn build(self, stream: &[u8]) -> Result<ChartTree, ChartError> {
        let mut scan = self.scan(stream)?;
        let consumed = scan.records.last().map_or(0, BiffRecord::end_offset);
        let records = std::mem::take(&mut scan.records);

        let (root, next) = self.build_node(&records, 0, &mut scan)?;
        debug_assert_eq!(next, records.len());

        let group_count = scan.chart_formats.len().max(1);
        let mut groups = vec![ChartGroup::default(); group_count];
        for (index, group) in std::mem::take(&mut scan.chart_types) {
            let record = &records[index];
            match ChartTypeRecord::parse(record.record_id, record.data) {
                Ok(chart_type) => {
                    if let Some(slot) = groups.get_mut(group) {
                        slot.chart_type.get_or_insert(chart_type);
                    }
                }
                Err(reason) => scan.malformed(index, record.record_id, reason),
            }
        }
        for &group in &scan.drop_bar_groups {
            if let Some(slot) = groups.get_mut(group) {
                slot.has_drop_bars = true;
            }
        }

        let mut membership = vec![0usize; scan.series_count];
        for &(series, group) in &scan.list_assignments {
            match membership.get_mut(series) {
                Some(slot) => *slot = group,
                None => log::debug!(
                    "SERIESLIST names series {} but the chart has {}",
                    series + 1,
                    scan.series_count
                ),
            }
        }

        log::debug!(
            "built chart: {} records, {} series, {} groups, {} warnings",
            records.len(),
            membership.len(),
            groups.len(),
            scan.warnings.len()
        );

        Ok(ChartTree {
            root,
            original: records.iter().map(BiffRecord::to_tagged).collect(),
            membership,
            groups,
            warnings: scan.warnings,
            dirty: false,
            consumed,
            extern_sheet: self.options.extern_sheet,
        })
    }

    fn scan<'a>(&self, stream: &'a [u8]) -> Result<Scan<'a>, ChartError> {
        if stream.is_empty() {
            return Err(ChartError::Empty);
        }

        let mut scan = Scan::default();
        let mut open: Vec<usize> = Vec::new();
        let mut current_ai: Option<usize> = None;

        for record in BiffRecordIter::new(stream) {
            let record = record?;
            let index = scan.records.len();
            let previous = scan.records.last().map(|r| r.record_id);
            scan.records.push(record);

            match (index, record.record_id) {
                (0, RECORD_END) => {
                    return Err(ChartError::UnexpectedEnd {
                        index,
                        offset: record.offset,
                    })
                }
                (0, RECORD_BEGIN) => {
                    return Err(ChartError::MissingHierarchy {
                        record_id: record.record_id,
                    })
                }
                (1, id) if id != RECORD_BEGIN => {
                    return Err(ChartError::MissingHierarchy {
                        record_id: scan.records[0].record_id,
                    })
                }
                _ => {}
            }

            let group = scan.chart_formats.len().saturating_sub(1);
            match record.record_id {
                RECORD_BEGIN => {
                    open.push(index);
                    if open.len() > self.options.max_depth {
                        return Err(ChartError::NestingTooDeep {
                            index,
                            max_depth: self.options.max_depth,
                        });
                    }
                    if previous == Some(RECORD_SERIES) {
                        scan.series_count += 1;
                    }
                }
                RECORD_END => {
                    open.pop();
                    if open.is_empty() {
                        return Ok(scan);
                    }
                }
                RECORD_AI => match RangeDescriptor::parse(record.data, self.options.extern_sheet.clone()) {
                    Ok(range) => {
                        scan.ranges.insert(index, range);
                        current_ai = Some(index);
                        continue;
                    }
                    Err(reason) => scan.malformed(index, record.record_id, reason),
                },
                RECORD_SERIESTEXT => {
                    let owner = current_ai.filter(|&ai| ai + 1 == index);
                    if let Some(ai) = owner {
                        match SeriesText::parse(record.data, self.options.codepage) {
                            Ok(text) => {
                                if let Some(range) = scan.ranges.get_mut(&ai) {
                                    range.attach_series_text(text);
                                    scan.attached_text.insert(index);
                                }
                            }
                            Err(reason) => scan.malformed(index, record.record_id, reason),
                        }
                    }
                }
                RECORD_CHARTFORMAT => {
                    let group = scan.chart_formats.len();
                    scan.chart_formats.insert(index, group);
                }
                RECORD_SERIESLIST => match parse_series_list(record.data) {
                    Ok(list) => scan.list_assignments.extend(
                        list.into_iter()
                            .filter(|&one_based| one_based > 0)
                            .map(|one_based| (one_based as usize - 1, group)),
                    ),
                    Err(reason) => scan.malformed(index, record.record_id, reason),
                },
                RECORD_DROPBAR => {
                    scan.drop_bar_groups.insert(group);
                }
                RECORD_VALUERANGE => {
                    if let Err(reason) = ValueRange::parse(record.data) {
                        scan.malformed(index, record.record_id, reason);
                    }
                }
                id if is_chart_type_record(id) => scan.chart_types.push((index, group)),
                _ => {}
            }
            current_ai = None;
        }

        match open.last() {
            Some(&index) => Err(ChartError::UnmatchedBracket {
                index,
                offset: scan.records[index].offset,
            }),
            None => Err(ChartError::MissingHierarchy {
                record_id: scan.records.first().map_or(0, |r| r.record_id),
            }),
        }
    }

    /// Build the node whose header is `records[index]` (followed by BEGIN). Returns the node
    /// and the index after its END.
    fn build_node(
        &self,
        records: &[BiffRecord<'_>],
        index: usize,
        scan: &mut Scan<'_>,
    ) -> Result<(ChartNode, usize), ChartError> {
        let header = &records[index];
        let begin = index + 1;
        let end = matching_end(records, begin)?;

        let kind = NodeKind::classify(header.record_id, scan.chart_formats.get(&index).copied());
        let mut node = ChartNode::new(kind, header.to_tagged());
        node.begin = records[begin].to_tagged();
        node.end = records[end].to_tagged();

        let mut i = begin + 1;
        while i < end {
            let record = &records[i];
            let has_children = !matches!(record.record_id, RECORD_BEGIN | RECORD_END)
                && records.get(i + 1).is_some_and(|next| next.record_id == RECORD_BEGIN)
                && i + 1 < end;
            if has_children {
                let (child, next) = self.build_node(records, i, scan)?;
                node.children.push(ChartChild::Node(child));
                i = next;
                continue;
            }

            if scan.attached_text.contains(&i) {
                i += 1;
                continue;
            }
            let child = match scan.ranges.remove(&i) {
                Some(range) => ChartChild::Range(range),
                None => ChartChild::Record(record.to_tagged()),
            };
            node.children.push(child);
            i += 1;
        }

        if node.kind == NodeKind::Text && node.links_to_title() {
            node.kind = NodeKind::Title;
        }
        Ok((node, end + 1))
    }
}

/// Index of the END that closes the BEGIN at `begin`.
fn matching_end(records: &[BiffRecord<'_>], begin: usize) -> Result<usize, ChartError> {
    let mut depth = 0usize;
    for (offset, record) in records.iter().enumerate().skip(begin) {
        match record.record_id {
            RECORD_BEGIN => depth += 1,
            RECORD_END => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Ok(offset);
                }
            }
            _ => {}
        }
    }
    Err(ChartError::UnmatchedBracket {
        index: begin,
        offset: records.get(begin).map_or(0, |r| r.offset),
    })
}
