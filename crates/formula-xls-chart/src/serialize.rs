//! Re-linearize a [`ChartTree`] into BIFF records.
//!
//! An untouched tree returns its input records unchanged. A dirty tree is walked depth-first:
//! each node emits its header record, BEGIN, children, and END. Linked ranges are re-encoded
//! from their descriptors, followed by their `SERIESTEXT` if they carry one.

use crate::error::EncodeError;
use crate::records::{encode_all, TaggedRecord, RECORD_AI, RECORD_SERIESTEXT};
use crate::tree::{ChartChild, ChartNode, ChartTree};

/// Produce the chart's record list.
///
/// Pending cross-sheet index changes are picked up first, so a table edit alone makes the tree
/// dirty. After a dirty emission the output becomes the new baseline and the tree is clean.
pub fn serialize(tree: &mut ChartTree) -> Vec<TaggedRecord> {
    tree.sync_externsheet_indices();

    if !tree.dirty {
        log::debug!("chart is clean; returning {} original records", tree.original.len());
        return tree.original.clone();
    }

    tree.apply_membership();

    let mut out = Vec::with_capacity(tree.original.len());
    emit_node(&tree.root, &mut out);
    log::debug!(
        "re-emitted dirty chart: {} records (was {})",
        out.len(),
        tree.original.len()
    );

    tree.original = out.clone();
    tree.dirty = false;
    out
}

/// [`serialize`] followed by record framing.
pub fn serialize_to_bytes(tree: &mut ChartTree) -> Result<Vec<u8>, EncodeError> {
    encode_all(&serialize(tree))
}

fn emit_node(node: &ChartNode, out: &mut Vec<TaggedRecord>) {
    out.push(node.record.clone());
    out.push(node.begin.clone());
    for child in &node.children {
        match child {
            ChartChild::Record(record) => out.push(record.clone()),
            ChartChild::Range(range) => {
                out.push(TaggedRecord::new(RECORD_AI, range.to_bytes()));
                if let Some(text) = range.series_text() {
                    out.push(TaggedRecord::new(RECORD_SERIESTEXT, text.to_bytes()));
                }
            }
            ChartChild::Node(child) => emit_node(child, out),
        }
    }
    out.push(node.end.clone());
}
