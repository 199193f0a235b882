//! In-memory chart model built by [`crate::HierarchyBuilder`].
//!
//! The tree mirrors the BEGIN/END nesting of the record stream exactly. Every record that is not
//! a node header or a linked range is kept as a [`ChartChild::Record`] in its original position,
//! so re-linearizing the tree reproduces the input order.

use std::fmt;

use crate::chart_type::{is_chart_type_record, ChartKind, ChartTypeRecord};
use crate::error::{ChartWarning, RetargetError, SeriesError};
use crate::externsheet::SharedExternSheet;
use crate::location::Location;
use crate::range::{RangeDescriptor, RangeRole, ReferenceKind};
use crate::records::{
    TaggedRecord, RECORD_AXIS, RECORD_AXISPARENT, RECORD_CHART, RECORD_CHARTFORMAT,
    RECORD_DATAFORMAT, RECORD_DROPBAR, RECORD_FRAME, RECORD_LEGEND, RECORD_OBJECTLINK,
    RECORD_SERIES, RECORD_SERIESLIST, RECORD_SERTOCRT, RECORD_TEXT, RECORD_VALUERANGE,
};
use crate::resolver::CellResolver;
use crate::scale::ValueRange;

/// Series index (document order) to chart-type group index.
pub type SeriesMembership = Vec<usize>;

/// `OBJECTLINK.wLinkObj` value for a chart title.
const OBJECT_LINK_TITLE: u16 = 1;

/// Largest category/value count a `SERIES` record may declare.
const MAX_SERIES_VALUES: u32 = 0x0F9F;

// SERIES: [sdtX:u16][sdtY:u16][cValx:u16][cValy:u16][sdtBSize:u16][cValBSize:u16]
const SERIES_PROTOTYPE: [u8; 12] = [3, 0, 1, 0, 3, 0, 3, 0, 1, 0, 0, 0];
const SERIES_CVALX_OFFSET: usize = 4;
const SERIES_CVALY_OFFSET: usize = 6;
const SERIES_CVALBSIZE_OFFSET: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Chart,
    Axes,
    Axis,
    ChartTypeGroup { group: usize },
    Series,
    Legend,
    Title,
    Text,
    FormatBlock,
    /// A record with sub-structure this crate does not interpret.
    Opaque,
}

impl NodeKind {
    pub(crate) fn classify(record_id: u16, group: Option<usize>) -> Self {
        match record_id {
            RECORD_CHART => NodeKind::Chart,
            RECORD_AXISPARENT => NodeKind::Axes,
            RECORD_AXIS => NodeKind::Axis,
            RECORD_CHARTFORMAT => NodeKind::ChartTypeGroup {
                group: group.unwrap_or(0),
            },
            RECORD_SERIES => NodeKind::Series,
            RECORD_LEGEND => NodeKind::Legend,
            RECORD_TEXT => NodeKind::Text,
            RECORD_FRAME | RECORD_DATAFORMAT | RECORD_DROPBAR => NodeKind::FormatBlock,
            _ => NodeKind::Opaque,
        }
    }
}

#[derive(Debug)]
pub enum ChartChild {
    Record(TaggedRecord),
    Range(RangeDescriptor),
    Node(ChartNode),
}

/// A record followed by a BEGIN/END bracket and everything between them.
#[derive(Debug)]
pub struct ChartNode {
    pub kind: NodeKind,
    pub record: TaggedRecord,
    pub begin: TaggedRecord,
    pub end: TaggedRecord,
    pub children: Vec<ChartChild>,
}

impl ChartNode {
    pub fn new(kind: NodeKind, record: TaggedRecord) -> Self {
        Self {
            kind,
            record,
            begin: TaggedRecord::begin(),
            end: TaggedRecord::end(),
            children: Vec::new(),
        }
    }

    pub fn record_id(&self) -> u16 {
        self.record.record_id
    }

    /// Linked ranges directly under this node.
    pub fn ranges(&self) -> impl Iterator<Item = &RangeDescriptor> {
        self.children.iter().filter_map(|child| match child {
            ChartChild::Range(range) => Some(range),
            _ => None,
        })
    }

    pub fn range(&self, role: RangeRole) -> Option<&RangeDescriptor> {
        self.ranges().find(|range| range.role() == role)
    }

    pub fn range_mut(&mut self, role: RangeRole) -> Option<&mut RangeDescriptor> {
        self.children.iter_mut().find_map(|child| match child {
            ChartChild::Range(range) if range.role() == role => Some(range),
            _ => None,
        })
    }

    pub fn child_nodes(&self) -> impl Iterator<Item = &ChartNode> {
        self.children.iter().filter_map(|child| match child {
            ChartChild::Node(node) => Some(node),
            _ => None,
        })
    }

    /// First leaf record with `record_id` directly under this node.
    pub fn find_record(&self, record_id: u16) -> Option<&TaggedRecord> {
        self.children.iter().find_map(|child| match child {
            ChartChild::Record(record) if record.record_id == record_id => Some(record),
            _ => None,
        })
    }

    /// Number of records this node linearizes to.
    pub fn record_count(&self) -> usize {
        let children: usize = self
            .children
            .iter()
            .map(|child| match child {
                ChartChild::Record(_) => 1,
                ChartChild::Range(range) => 1 + usize::from(range.series_text().is_some()),
                ChartChild::Node(node) => node.record_count(),
            })
            .sum();
        3 + children
    }

    /// Visit this node and every descendant node, parents first.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a ChartNode)) {
        f(self);
        for node in self.child_nodes() {
            node.walk(f);
        }
    }

    pub(crate) fn for_each_range_mut(&mut self, f: &mut dyn FnMut(&mut RangeDescriptor)) {
        for child in &mut self.children {
            match child {
                ChartChild::Range(range) => f(range),
                ChartChild::Node(node) => node.for_each_range_mut(f),
                ChartChild::Record(_) => {}
            }
        }
    }

    /// A TEXT node whose OBJECTLINK attaches it to the chart title.
    pub(crate) fn links_to_title(&self) -> bool {
        self.find_record(RECORD_OBJECTLINK)
            .and_then(|link| link.data.get(..2))
            .is_some_and(|w| u16::from_le_bytes([w[0], w[1]]) == OBJECT_LINK_TITLE)
    }
}

/// One chart-type group (`CHARTFORMAT`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartGroup {
    pub chart_type: Option<ChartTypeRecord>,
    pub has_drop_bars: bool,
}

impl ChartGroup {
    /// A line group with drop bars is a stock chart.
    pub fn kind(&self) -> Option<ChartKind> {
        let kind = self.chart_type?.kind;
        if kind == ChartKind::Line && self.has_drop_bars {
            return Some(ChartKind::Stock);
        }
        Some(kind)
    }
}

/// Outcome of a best-effort bulk range change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchUpdate {
    pub changed: usize,
    /// Series index and error for every matching range that could not be changed.
    pub failures: Vec<(usize, RetargetError)>,
}

impl BatchUpdate {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ranges for a series added with [`ChartTree::add_series`].
///
/// Empty locations produce text-only ranges with no backing cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSeries {
    pub values: String,
    pub categories: String,
    pub legend: String,
    pub legend_text: Option<String>,
    pub bubble_sizes: Option<String>,
    pub group: usize,
}

pub struct ChartTree {
    pub(crate) root: ChartNode,
    pub(crate) original: Vec<TaggedRecord>,
    pub(crate) membership: SeriesMembership,
    pub(crate) groups: Vec<ChartGroup>,
    pub(crate) warnings: Vec<ChartWarning>,
    pub(crate) dirty: bool,
    pub(crate) consumed: usize,
    pub(crate) extern_sheet: Option<SharedExternSheet>,
}

impl fmt::Debug for ChartTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartTree")
            .field("root", &self.root)
            .field("membership", &self.membership)
            .field("groups", &self.groups)
            .field("warnings", &self.warnings)
            .field("dirty", &self.dirty)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

impl ChartTree {
    pub fn root(&self) -> &ChartNode {
        &self.root
    }

    /// The record list the next clean serialization returns.
    pub fn original_records(&self) -> &[TaggedRecord] {
        &self.original
    }

    pub fn groups(&self) -> &[ChartGroup] {
        &self.groups
    }

    pub fn membership(&self) -> &[usize] {
        &self.membership
    }

    pub fn warnings(&self) -> &[ChartWarning] {
        &self.warnings
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Force the next serialization to rebuild records from the tree.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Bytes of the input stream that belong to this chart.
    pub fn bytes_consumed(&self) -> usize {
        self.consumed
    }

    /// Kind of the primary chart-type group.
    pub fn chart_kind(&self) -> Option<ChartKind> {
        self.groups.first().and_then(ChartGroup::kind)
    }

    pub fn series_count(&self) -> usize {
        self.membership.len()
    }

    /// Series nodes in document order.
    pub fn series(&self) -> Vec<&ChartNode> {
        let mut out = Vec::new();
        self.root.walk(&mut |node| {
            if node.kind == NodeKind::Series {
                out.push(node);
            }
        });
        out
    }

    /// Every linked range in the chart, in document order.
    pub fn ranges(&self) -> Vec<&RangeDescriptor> {
        let mut out = Vec::new();
        self.root.walk(&mut |node| out.extend(node.ranges()));
        out
    }

    fn series_in_group(&self, group: Option<usize>) -> Vec<&ChartNode> {
        self.series()
            .into_iter()
            .enumerate()
            .filter(|(index, _)| group.is_none() || self.membership.get(*index).copied() == group)
            .map(|(_, node)| node)
            .collect()
    }

    fn role_definitions(&self, group: Option<usize>, role: RangeRole) -> Vec<String> {
        self.series_in_group(group)
            .into_iter()
            .filter_map(|series| series.range(role))
            .map(RangeDescriptor::definition_text)
            .collect()
    }

    /// Value ranges of every series, or of the series in `group`.
    pub fn series_ranges(&self, group: Option<usize>) -> Vec<String> {
        self.role_definitions(group, RangeRole::Values)
    }

    pub fn category_ranges(&self, group: Option<usize>) -> Vec<String> {
        self.role_definitions(group, RangeRole::Categories)
    }

    pub fn bubble_size_ranges(&self, group: Option<usize>) -> Vec<String> {
        self.role_definitions(group, RangeRole::BubbleSizes)
    }

    /// Legend entry per series: the literal text when present, otherwise the linked cell.
    pub fn legend_texts(&self, group: Option<usize>) -> Vec<String> {
        self.series_in_group(group)
            .into_iter()
            .map(|series| match series.range(RangeRole::Text) {
                Some(range) => range
                    .legend_text()
                    .map(str::to_string)
                    .unwrap_or_else(|| range.definition_text()),
                None => String::new(),
            })
            .collect()
    }

    /// Retarget every series value range that currently reads `old` to `new`.
    ///
    /// Ranges are compared case-insensitively and ignoring `$` markers. Failures are collected
    /// and the sweep continues with the next series.
    pub fn change_series_range(&mut self, old: &str, new: &str) -> BatchUpdate {
        self.change_role_range(RangeRole::Values, old, new)
    }

    pub fn change_category_range(&mut self, old: &str, new: &str) -> BatchUpdate {
        self.change_role_range(RangeRole::Categories, old, new)
    }

    fn change_role_range(&mut self, role: RangeRole, old: &str, new: &str) -> BatchUpdate {
        let mut update = BatchUpdate::default();
        for (index, path) in series_paths(&self.root).into_iter().enumerate() {
            let Some(range) = node_at_mut(&mut self.root, &path).and_then(|n| n.range_mut(role))
            else {
                continue;
            };
            if !same_range_text(&range.definition_text(), old) {
                continue;
            }
            match range.retarget(new) {
                Ok(()) => update.changed += 1,
                Err(err) => update.failures.push((index, err)),
            }
        }
        if update.changed > 0 {
            self.dirty = true;
        }
        update
    }

    /// Point one range of series `series` at `location`, adding the range if the series has
    /// none for `role`.
    pub fn retarget_series_range(
        &mut self,
        series: usize,
        role: RangeRole,
        location: &str,
        cells: Option<&dyn CellResolver>,
    ) -> Result<(), SeriesError> {
        let extern_sheet = self.extern_sheet.clone();
        let count = self.series_count();
        let node = self
            .series_node_mut(series)
            .ok_or(SeriesError::UnknownSeries { index: series, count })?;

        match node.range_mut(role) {
            Some(range) => range.retarget_with_cells(location, cells)?,
            None => {
                let mut range = RangeDescriptor::new(role, ReferenceKind::Worksheet, extern_sheet);
                range.retarget_with_cells(location, cells)?;
                let at = node
                    .children
                    .iter()
                    .rposition(|child| matches!(child, ChartChild::Range(_)))
                    .map_or(0, |pos| pos + 1);
                node.children.insert(at, ChartChild::Range(range));
            }
        }
        self.dirty = true;
        Ok(())
    }

    /// Mutable access to one range of a series. Marks the tree dirty when the range exists.
    pub fn series_range_mut(
        &mut self,
        series: usize,
        role: RangeRole,
    ) -> Option<&mut RangeDescriptor> {
        self.series().get(series)?.range(role)?;
        self.dirty = true;
        self.series_node_mut(series)?.range_mut(role)
    }

    /// Replace the literal legend text `old` with `new` on every series showing it.
    /// Returns the number of series changed.
    pub fn change_text_value(&mut self, old: &str, new: &str) -> usize {
        let mut changed = 0usize;
        for path in series_paths(&self.root) {
            let Some(legend) =
                node_at_mut(&mut self.root, &path).and_then(|n| n.range_mut(RangeRole::Text))
            else {
                continue;
            };
            if legend.legend_text() == Some(old) {
                legend.set_legend_text(new);
                changed += 1;
            }
        }
        if changed > 0 {
            self.dirty = true;
        }
        changed
    }

    /// Remove series `index`. Later series shift down and keep their groups.
    pub fn remove_series(&mut self, index: usize) -> Result<(), SeriesError> {
        let paths = series_paths(&self.root);
        let unknown = SeriesError::UnknownSeries {
            index,
            count: paths.len(),
        };
        let Some((child, parent_path)) = paths.get(index).and_then(|p| p.split_last()) else {
            return Err(unknown);
        };
        let parent = node_at_mut(&mut self.root, parent_path).ok_or(unknown)?;
        parent.children.remove(*child);
        if index < self.membership.len() {
            self.membership.remove(index);
        }
        self.dirty = true;
        Ok(())
    }

    pub fn assign_series_to_group(&mut self, series: usize, group: usize) -> Result<(), SeriesError> {
        let count = self.series_count();
        if group >= self.groups.len() {
            return Err(SeriesError::UnknownGroup {
                group,
                count: self.groups.len(),
            });
        }
        let slot = self
            .membership
            .get_mut(series)
            .ok_or(SeriesError::UnknownSeries { index: series, count })?;
        if *slot != group {
            *slot = group;
            self.dirty = true;
        }
        Ok(())
    }

    /// Append a series after the last existing one. Returns its index.
    pub fn add_series(&mut self, new: &NewSeries) -> Result<usize, SeriesError> {
        if new.group >= self.groups.len() {
            return Err(SeriesError::UnknownGroup {
                group: new.group,
                count: self.groups.len(),
            });
        }

        let table = &self.extern_sheet;
        let mut legend = if new.legend.trim().is_empty() {
            RangeDescriptor::new(RangeRole::Text, ReferenceKind::Text, table.clone())
        } else {
            let mut legend =
                RangeDescriptor::new(RangeRole::Text, ReferenceKind::Worksheet, table.clone());
            legend.retarget(&new.legend)?;
            legend
        };
        if let Some(text) = &new.legend_text {
            legend.set_legend_text(text);
        }

        let mut values =
            RangeDescriptor::new(RangeRole::Values, ReferenceKind::Worksheet, table.clone());
        values.retarget(&new.values)?;
        let mut categories =
            RangeDescriptor::new(RangeRole::Categories, ReferenceKind::Worksheet, table.clone());
        categories.retarget(&new.categories)?;
        let mut bubbles =
            RangeDescriptor::new(RangeRole::BubbleSizes, ReferenceKind::Text, table.clone());
        if let Some(location) = &new.bubble_sizes {
            bubbles.retarget(location)?;
        }

        let mut record = SERIES_PROTOTYPE.to_vec();
        write_count(&mut record, SERIES_CVALX_OFFSET, &new.categories);
        write_count(&mut record, SERIES_CVALY_OFFSET, &new.values);
        if let Some(location) = &new.bubble_sizes {
            write_count(&mut record, SERIES_CVALBSIZE_OFFSET, location);
        }

        let mut series = ChartNode::new(
            NodeKind::Series,
            TaggedRecord::new(RECORD_SERIES, record),
        );
        series.children.extend([
            ChartChild::Range(legend),
            ChartChild::Range(values),
            ChartChild::Range(categories),
            ChartChild::Range(bubbles),
            ChartChild::Record(TaggedRecord::new(
                RECORD_SERTOCRT,
                (new.group as u16).to_le_bytes().to_vec(),
            )),
        ]);

        let index = self.series_count();
        match series_paths(&self.root).last().and_then(|p| p.split_last()) {
            Some((last, parent_path)) => {
                let at = *last + 1;
                let parent = node_at_mut(&mut self.root, parent_path)
                    .ok_or(SeriesError::UnknownSeries { index, count: index })?;
                parent.children.insert(at, ChartChild::Node(series));
            }
            None => {
                let at = self
                    .root
                    .children
                    .iter()
                    .position(|child| {
                        matches!(child, ChartChild::Node(n) if n.kind == NodeKind::Axes)
                    })
                    .unwrap_or(self.root.children.len());
                self.root.children.insert(at, ChartChild::Node(series));
            }
        }
        self.membership.push(new.group);
        self.dirty = true;
        Ok(index)
    }

    /// Record the current sheet bindings of every range before the chart is copied or moved.
    pub fn populate_for_transfer(&mut self, origin_sheet: &str) {
        self.root
            .for_each_range_mut(&mut |range| range.prepare_for_transfer(origin_sheet));
    }

    /// Rebind every range after the chart's sheet was copied or moved to `new_sheet`.
    ///
    /// Returns the warnings for ranges whose sheet could not be resolved; they are also kept in
    /// [`ChartTree::warnings`].
    pub fn update_sheet_refs(&mut self, new_sheet: &str, origin_workbook: &str) -> Vec<ChartWarning> {
        let mut warnings = Vec::new();
        self.root.for_each_range_mut(&mut |range| {
            warnings.extend(range.retarget_sheet(new_sheet, origin_workbook));
        });
        self.warnings.extend(warnings.iter().cloned());
        self.dirty = true;
        warnings
    }

    /// Text of the chart title, if the chart has one.
    pub fn title(&self) -> Option<String> {
        let mut title = None;
        self.root.walk(&mut |node| {
            if title.is_none() && node.kind == NodeKind::Title {
                title = Some(
                    node.range(RangeRole::Text)
                        .map(|range| {
                            range
                                .legend_text()
                                .map(str::to_string)
                                .unwrap_or_else(|| range.definition_text())
                        })
                        .unwrap_or_default(),
                );
            }
        });
        title
    }

    /// Set the literal text of the chart title. Returns `false` if the chart has no title.
    pub fn set_title(&mut self, text: &str) -> bool {
        let is_title = |node: &ChartNode| node.kind == NodeKind::Title;
        let Some(range) =
            find_node_mut(&mut self.root, &is_title).and_then(|node| node.range_mut(RangeRole::Text))
        else {
            return false;
        };
        range.set_legend_text(text);
        self.dirty = true;
        true
    }

    /// The first value-axis scale record.
    pub fn value_range(&self) -> Option<ValueRange> {
        let mut found = None;
        self.root.walk(&mut |node| {
            if found.is_none() {
                found = node.find_record(RECORD_VALUERANGE).map(|r| ValueRange::parse(&r.data));
            }
        });
        found.and_then(Result::ok)
    }

    /// Overwrite the first value-axis scale record. Returns `false` if the chart has none.
    pub fn set_value_range(&mut self, value_range: &ValueRange) -> bool {
        let Some(record) = find_record_mut(&mut self.root, RECORD_VALUERANGE) else {
            return false;
        };
        record.data = value_range.to_bytes();
        self.dirty = true;
        true
    }

    /// Pick up cross-sheet index changes for every range. Returns `true` if any range changed.
    pub fn sync_externsheet_indices(&mut self) -> bool {
        let mut changed = false;
        self.root
            .for_each_range_mut(&mut |range| changed |= range.sync_externsheet_indices());
        if changed {
            self.dirty = true;
        }
        changed
    }

    fn series_node_mut(&mut self, index: usize) -> Option<&mut ChartNode> {
        let path = series_paths(&self.root).into_iter().nth(index)?;
        node_at_mut(&mut self.root, &path)
    }

    /// Bring `SERIESLIST` and `SERTOCRT` records in line with the current membership.
    ///
    /// Lists are only rewritten when their content differs. An overlay group with members but
    /// no list gets one after its chart-type record; group 0 stays implicit.
    pub(crate) fn apply_membership(&mut self) {
        let mut lists: Vec<Vec<u16>> = vec![Vec::new(); self.groups.len()];
        for (series, &group) in self.membership.iter().enumerate() {
            if let Some(list) = lists.get_mut(group) {
                list.push(u16::try_from(series + 1).unwrap_or(u16::MAX));
            }
        }

        let mut seen = vec![false; lists.len()];
        let mut chart_formats = 0usize;
        rewrite_series_lists(&mut self.root, &lists, &mut chart_formats, &mut seen);

        for (index, path) in series_paths(&self.root).into_iter().enumerate() {
            let Some(group) = self.membership.get(index).copied() else {
                continue;
            };
            let Some(series) = node_at_mut(&mut self.root, &path) else {
                continue;
            };
            for child in &mut series.children {
                if let ChartChild::Record(record) = child {
                    if record.record_id == RECORD_SERTOCRT && record.data.len() >= 2 {
                        record.data[..2].copy_from_slice(&(group as u16).to_le_bytes());
                    }
                }
            }
        }

        for (group, list) in lists.iter().enumerate().skip(1) {
            if seen[group] || list.is_empty() {
                continue;
            }
            let Some(node) = find_node_mut(&mut self.root, &|n: &ChartNode| {
                n.kind == NodeKind::ChartTypeGroup { group }
            }) else {
                log::debug!("chart-type group {group} has no node; SERIESLIST not written");
                continue;
            };
            let at = node
                .children
                .iter()
                .position(|child| {
                    matches!(child, ChartChild::Record(r) if is_chart_type_record(r.record_id))
                })
                .map_or(0, |pos| pos + 1);
            node.children.insert(
                at,
                ChartChild::Record(TaggedRecord::new(RECORD_SERIESLIST, encode_series_list(list))),
            );
        }
    }
}

fn rewrite_series_lists(
    node: &mut ChartNode,
    lists: &[Vec<u16>],
    chart_formats: &mut usize,
    seen: &mut [bool],
) {
    for child in &mut node.children {
        match child {
            ChartChild::Record(record) if record.record_id == RECORD_CHARTFORMAT => {
                *chart_formats += 1;
            }
            ChartChild::Record(record) if record.record_id == RECORD_SERIESLIST => {
                let group = chart_formats.saturating_sub(1);
                let Some(list) = lists.get(group) else {
                    continue;
                };
                seen[group] = true;
                if parse_series_list(&record.data).ok().as_ref() != Some(list) {
                    record.data = encode_series_list(list);
                }
            }
            ChartChild::Node(child) => {
                if child.record_id() == RECORD_CHARTFORMAT {
                    *chart_formats += 1;
                }
                rewrite_series_lists(child, lists, chart_formats, seen);
            }
            _ => {}
        }
    }
}

/// Decode `SERIESLIST`: `[n:u16][n x one-based series index:u16]`.
pub(crate) fn parse_series_list(data: &[u8]) -> Result<Vec<u16>, String> {
    let Some(header) = data.get(..2) else {
        return Err(format!("SERIESLIST payload is {} bytes; expected at least 2", data.len()));
    };
    let count = u16::from_le_bytes([header[0], header[1]]) as usize;
    let Some(body) = data.get(2..2 + count * 2) else {
        return Err(format!(
            "SERIESLIST declares {count} entries but has {} bytes",
            data.len() - 2
        ));
    };
    Ok(body
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect())
}

pub(crate) fn encode_series_list(list: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + list.len() * 2);
    out.extend_from_slice(&(list.len() as u16).to_le_bytes());
    for index in list {
        out.extend_from_slice(&index.to_le_bytes());
    }
    out
}

fn write_count(record: &mut [u8], offset: usize, location: &str) {
    let count = Location::parse(location.trim())
        .map(|l| l.cell_count().min(MAX_SERIES_VALUES))
        .unwrap_or(0) as u16;
    record[offset..offset + 2].copy_from_slice(&count.to_le_bytes());
}

fn same_range_text(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.trim().replace('$', "");
    strip(a).eq_ignore_ascii_case(&strip(b))
}

/// Child-index paths from the root to every series node, in document order.
fn series_paths(root: &ChartNode) -> Vec<Vec<usize>> {
    fn collect(node: &ChartNode, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        for (i, child) in node.children.iter().enumerate() {
            if let ChartChild::Node(child) = child {
                prefix.push(i);
                if child.kind == NodeKind::Series {
                    out.push(prefix.clone());
                }
                collect(child, prefix, out);
                prefix.pop();
            }
        }
    }

    let mut out = Vec::new();
    collect(root, &mut Vec::new(), &mut out);
    out
}

fn node_at_mut<'a>(root: &'a mut ChartNode, path: &[usize]) -> Option<&'a mut ChartNode> {
    let mut node = root;
    for &index in path {
        node = match node.children.get_mut(index)? {
            ChartChild::Node(child) => child,
            _ => return None,
        };
    }
    Some(node)
}

fn find_node_mut<'a>(
    node: &'a mut ChartNode,
    pred: &dyn Fn(&ChartNode) -> bool,
) -> Option<&'a mut ChartNode> {
    if pred(node) {
        return Some(node);
    }
    for child in &mut node.children {
        if let ChartChild::Node(child) = child {
            if let Some(found) = find_node_mut(child, pred) {
                return Some(found);
            }
        }
    }
    None
}

fn find_record_mut(node: &mut ChartNode, record_id: u16) -> Option<&mut TaggedRecord> {
    for child in &mut node.children {
        match child {
            ChartChild::Record(record) if record.record_id == record_id => return Some(record),
            ChartChild::Node(child) => {
                if let Some(found) = find_record_mut(child, record_id) {
                    return Some(found);
                }
            }
            _ => {}
        }
    }
    None
}
