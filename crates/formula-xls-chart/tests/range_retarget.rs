use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use formula_xls_chart::{
    serialize, serialize_to_bytes, BiffRecordIter, CellValue, ChartWarning, ExternSheetTable,
    InMemoryExternSheet, RangeDescriptor, RangeRole, ReferenceKind, RefShape, RetargetError,
    SharedExternSheet, RECORD_AI,
};

mod common;

use common::chart_fixture_builder::{
    ai, area3d, build_two_group_chart, build_two_group_chart_at, find_records, record, ref3d,
    series_text, AI_ID_TEXT, AI_ID_VALUES, AI_RT_TEXT, AI_RT_WORKSHEET, RECORD_BEGIN,
    RECORD_CHART, RECORD_END, RECORD_SERIES, RECORD_SERIESTEXT,
};

/// `(record id, header offset, payload length)` of every record in `bytes`.
fn layout(bytes: &[u8]) -> Vec<(u16, usize, usize)> {
    BiffRecordIter::new(bytes)
        .map(|r| r.map(|r| (r.record_id, r.offset, r.data.len())))
        .collect::<Result<_, _>>()
        .unwrap()
}

#[test]
fn values_descriptor_renders_its_area() {
    let (_table, shared) = common::sheet_table();
    let data = ai(AI_ID_VALUES, AI_RT_WORKSHEET, &area3d(0, (0, 11), (0, 0)));

    let range = RangeDescriptor::parse(&data, Some(shared)).unwrap();
    assert_eq!(range.role(), RangeRole::Values);
    assert_eq!(range.ref_kind(), ReferenceKind::Worksheet);
    assert_eq!(range.definition_text(), "Sheet1!A1:A12");
    assert_eq!(range.serialized_size(), 8 + 11);
}

#[test]
fn retarget_moves_an_area_to_a_new_area() {
    let (_table, shared) = common::sheet_table();
    let data = ai(AI_ID_VALUES, AI_RT_WORKSHEET, &area3d(0, (0, 11), (0, 0)));
    let mut range = RangeDescriptor::parse(&data, Some(shared)).unwrap();

    range.retarget("Sheet1!B1:B20").unwrap();
    assert_eq!(range.definition_text(), "Sheet1!B1:B20");
    assert_eq!(range.expression_size(), 11);
    assert_eq!(range.serialized_size(), 8 + 11);
    assert_eq!(range.to_bytes().len(), range.serialized_size());
}

#[test]
fn empty_retarget_on_a_bare_legend_becomes_text_only() {
    let mut legend = RangeDescriptor::new(RangeRole::Text, ReferenceKind::Worksheet, None);
    legend.retarget("").unwrap();

    assert_eq!(legend.ref_kind(), ReferenceKind::Text);
    assert_eq!(legend.definition_text(), "");
    assert_eq!(legend.to_bytes(), vec![0, 1, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn sheet_transfer_rebinds_to_the_destination_sheet() {
    let (table, shared) = common::sheet_table();
    let data = ai(AI_ID_VALUES, AI_RT_WORKSHEET, &ref3d(0, 0, 0));
    let mut range = RangeDescriptor::parse(&data, Some(shared)).unwrap();
    assert_eq!(range.definition_text(), "Sheet1!A1");

    range.prepare_for_transfer("Sheet1");
    assert_eq!(range.bound_sheet_name(), Some("Sheet1"));
    assert_eq!(range.retarget_sheet("Sheet2", "Book1.xls"), None);

    assert_eq!(range.definition_text(), "Sheet2!A1");
    assert_eq!(range.external_link(), None);
    assert_eq!(table.borrow().listeners_for(1), 1);
    assert_eq!(table.borrow().listeners_for(0), 0);
}

#[test]
fn sheet_transfer_to_an_unknown_sheet_degrades_to_an_external_reference() {
    let (_table, shared) = common::sheet_table();
    let data = ai(AI_ID_VALUES, AI_RT_WORKSHEET, &ref3d(0, 0, 0));
    let mut range = RangeDescriptor::parse(&data, Some(shared)).unwrap();

    range.prepare_for_transfer("Sheet1");
    let warning = range.retarget_sheet("Archive", "Book1.xls");

    assert_eq!(
        warning,
        Some(ChartWarning::UnresolvableSheet {
            sheet: "Archive".to_string(),
            workbook: "Book1.xls".to_string(),
        })
    );
    assert_eq!(range.to_bytes(), data);
    let link = range.external_link().expect("external link recorded");
    assert_eq!(link.workbook, "Book1.xls");
    assert_eq!(range.definition_text(), "[Book1.xls]Archive!A1");
}

#[test]
fn retarget_to_the_current_location_is_idempotent() {
    let (table, shared) = common::sheet_table();
    let data = ai(AI_ID_VALUES, AI_RT_WORKSHEET, &area3d(0, (1, 4), (1, 1)));
    let mut range = RangeDescriptor::parse(&data, Some(shared)).unwrap();

    range.retarget("Sheet1!B2:B5").unwrap();
    let once = range.to_bytes();
    range.retarget("Sheet1!B2:B5").unwrap();

    assert_eq!(once, data);
    assert_eq!(range.to_bytes(), once);
    assert_eq!(table.borrow().entries().len(), 1);
    assert_eq!(table.borrow().listener_count(), 1);
}

#[test]
fn failed_retarget_leaves_the_descriptor_unchanged() {
    let (_table, shared) = common::sheet_table();
    let data = ai(AI_ID_VALUES, AI_RT_WORKSHEET, &area3d(0, (1, 4), (1, 1)));
    let mut range = RangeDescriptor::parse(&data, Some(shared)).unwrap();

    assert!(matches!(
        range.retarget("Sheet1!B2:"),
        Err(RetargetError::InvalidLocation { .. })
    ));
    assert_eq!(
        range.retarget("Missing!A1"),
        Err(RetargetError::UnknownSheet("Missing".to_string()))
    );
    assert_eq!(range.to_bytes(), data);
}

#[test]
fn union_member_shape_cannot_change() {
    let (_table, shared) = common::sheet_table();
    // PtgMemFunc wrapping two areas (a non-contiguous range).
    let mut members = area3d(0, (1, 4), (1, 1));
    members.extend(area3d(0, (1, 4), (3, 3)));
    let mut rgce = vec![0x29];
    rgce.extend_from_slice(&(members.len() as u16).to_le_bytes());
    rgce.extend(members);
    let data = ai(AI_ID_VALUES, AI_RT_WORKSHEET, &rgce);
    let mut range = RangeDescriptor::parse(&data, Some(shared)).unwrap();
    assert_eq!(range.definition_text(), "Sheet1!B2:B5,Sheet1!D2:D5");

    assert_eq!(
        range.retarget("Sheet1!C1"),
        Err(RetargetError::ShapeMismatch {
            existing: RefShape::Area,
            replacement: RefShape::Cell,
        })
    );
    range.retarget("Sheet1!C2:C9").unwrap();
    assert_eq!(range.definition_text(), "Sheet1!C2:C9,Sheet1!D2:D5");
    assert_eq!(range.serialized_size(), data.len());
}

#[test]
fn growing_a_legend_reference_patches_the_record_length() {
    let (_table, shared) = common::sheet_table();
    let bytes = build_two_group_chart(None);
    let mut tree = common::build_with_table(&bytes, &shared);

    tree.retarget_series_range(0, RangeRole::Text, "Sheet1!B1:B2", None)
        .unwrap();
    let out = serialize_to_bytes(&mut tree).unwrap();
    assert_eq!(out.len(), bytes.len() + 4);

    let ais = find_records(&out, RECORD_AI);
    let legend = &ais[0];
    assert_eq!(legend.len(), 8 + 11);
    assert_eq!(u16::from_le_bytes([legend[6], legend[7]]), 11);

    // Only the legend record grows; everything after it moves by the same delta.
    let before = layout(&bytes);
    let after = layout(&out);
    assert_eq!(before.len(), after.len());
    let grown = before.iter().position(|r| r.0 == RECORD_AI).unwrap();
    for (index, (old, new)) in before.iter().zip(&after).enumerate() {
        assert_eq!(old.0, new.0, "record {index}");
        let shift = if index > grown { 4 } else { 0 };
        assert_eq!(new.1, old.1 + shift, "offset of record {index}");
        let growth = if index == grown { 4 } else { 0 };
        assert_eq!(new.2, old.2 + growth, "length of record {index}");
    }
    // The legend keeps its literal text.
    assert_eq!(tree.legend_texts(None), vec!["North".to_string(), "South".to_string()]);
}

#[test]
fn text_range_on_a_single_cell_takes_the_cell_value() {
    let (_table, shared) = common::sheet_table();
    let bytes = build_two_group_chart(None);
    let mut tree = common::build_with_table(&bytes, &shared);

    let cells = |range: &str| {
        assert_eq!(range, "Sheet1!E1");
        vec![CellValue::Text("East".to_string())]
    };
    tree.retarget_series_range(1, RangeRole::Text, "Sheet1!E1", Some(&cells))
        .unwrap();
    assert_eq!(tree.legend_texts(None), vec!["North".to_string(), "East".to_string()]);

    let records = serialize(&mut tree);
    let reparsed = common::build_with_table(
        &formula_xls_chart::encode_all(&records).unwrap(),
        &shared,
    );
    assert_eq!(reparsed.legend_texts(Some(1)), vec!["East".to_string()]);
}

#[test]
fn listeners_are_released_when_the_chart_is_dropped() {
    let (table, shared) = common::sheet_table();
    let bytes = build_two_group_chart(None);
    let before = table.borrow().listener_count();

    let mut tree = common::build_with_table(&bytes, &shared);
    // Legend, values and categories of both series.
    assert_eq!(table.borrow().listener_count(), before + 6);

    tree.change_series_range("Sheet1!B2:B5", "Sheet2!B2:B5");
    assert_eq!(table.borrow().listener_count(), before + 6);
    assert_eq!(table.borrow().listeners_for(1), 1);

    drop(tree);
    assert_eq!(table.borrow().listener_count(), before);
}

#[test]
fn compaction_renumbers_references_on_the_next_serialize() {
    let table = Rc::new(RefCell::new(InMemoryExternSheet::new(["Sheet1", "Sheet2"])));
    {
        let mut table = table.borrow_mut();
        // ixti 0 -> Sheet2 (unreferenced), ixti 1 -> Sheet1.
        table.insert_location(1, 1);
        table.insert_location(0, 0);
    }
    let shared: SharedExternSheet = table.clone();
    let bytes = build_two_group_chart_at(1, None);
    let mut tree = common::build_with_table(&bytes, &shared);
    assert_eq!(serialize_to_bytes(&mut tree).unwrap(), bytes);

    assert_eq!(table.borrow_mut().compact(), 1);
    let out = serialize_to_bytes(&mut tree).unwrap();

    assert_eq!(out, build_two_group_chart_at(0, None));
    assert!(!tree.is_dirty());
    assert_eq!(tree.series_ranges(None), vec!["Sheet1!B2:B5", "Sheet1!C2:C5"]);
    assert_eq!(table.borrow().listeners_for(0), 6);
}

#[test]
fn clearing_a_legend_without_cells_makes_it_text_only() {
    let (_table, shared) = common::sheet_table();
    let mut bytes = record(RECORD_CHART, &[0; 16]);
    bytes.extend(record(RECORD_BEGIN, &[]));
    bytes.extend(record(RECORD_SERIES, &[1, 0, 1, 0, 4, 0, 4, 0, 1, 0, 0, 0]));
    bytes.extend(record(RECORD_BEGIN, &[]));
    bytes.extend(record(RECORD_AI, &ai(AI_ID_TEXT, AI_RT_WORKSHEET, &[])));
    bytes.extend(record(RECORD_SERIESTEXT, &series_text("Budget")));
    bytes.extend(record(
        RECORD_AI,
        &ai(AI_ID_VALUES, AI_RT_WORKSHEET, &area3d(0, (1, 4), (1, 1))),
    ));
    bytes.extend(record(RECORD_END, &[]));
    bytes.extend(record(RECORD_END, &[]));
    let mut tree = common::build_with_table(&bytes, &shared);

    tree.retarget_series_range(0, RangeRole::Text, "", None)
        .unwrap();
    let series = tree.series();
    let legend = series[0].range(RangeRole::Text).unwrap();
    assert_eq!(legend.ref_kind(), ReferenceKind::Text);
    assert_eq!(legend.definition_text(), "");
    assert_eq!(tree.legend_texts(None), vec!["Budget".to_string()]);

    let out = serialize_to_bytes(&mut tree).unwrap();
    assert_eq!(
        find_records(&out, RECORD_AI)[0],
        ai(AI_ID_TEXT, AI_RT_TEXT, &[])
    );
    // Only the rt byte of the legend changed.
    let mut expected = bytes.clone();
    let legend_rt = bytes
        .windows(6)
        .position(|w| w[..2] == RECORD_AI.to_le_bytes() && w[4] == AI_ID_TEXT)
        .unwrap()
        + 5;
    expected[legend_rt] = AI_RT_TEXT;
    assert_eq!(out, expected);
}
