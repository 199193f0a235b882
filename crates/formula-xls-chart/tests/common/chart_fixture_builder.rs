#![allow(dead_code)]

// This fixture builder writes just enough of a BIFF8 chart substream to exercise the hierarchy
// builder and serializer. Keep record ids and commonly-used constants named so the intent stays
// readable.
pub const RECORD_CHART: u16 = 0x1002;
pub const RECORD_SERIES: u16 = 0x1003;
pub const RECORD_DATAFORMAT: u16 = 0x1006;
pub const RECORD_SERIESTEXT: u16 = 0x100D;
pub const RECORD_CHARTFORMAT: u16 = 0x1014;
pub const RECORD_SERIESLIST: u16 = 0x1016;
pub const RECORD_BAR: u16 = 0x1017;
pub const RECORD_LINE: u16 = 0x1018;
pub const RECORD_AXIS: u16 = 0x101D;
pub const RECORD_VALUERANGE: u16 = 0x101F;
pub const RECORD_TEXT: u16 = 0x1025;
pub const RECORD_OBJECTLINK: u16 = 0x1027;
pub const RECORD_BEGIN: u16 = 0x1033;
pub const RECORD_END: u16 = 0x1034;
pub const RECORD_AXISPARENT: u16 = 0x1041;
pub const RECORD_SERTOCRT: u16 = 0x1045;
pub const RECORD_AI: u16 = 0x1051;
pub const RECORD_EOF: u16 = 0x000A;

pub const AI_ID_TEXT: u8 = 0;
pub const AI_ID_VALUES: u8 = 1;
pub const AI_ID_CATEGORIES: u8 = 2;
pub const AI_ID_BUBBLES: u8 = 3;
pub const AI_RT_TEXT: u8 = 1;
pub const AI_RT_WORKSHEET: u8 = 2;

const PTG_REF3D: u8 = 0x3A;
const PTG_AREA3D: u8 = 0x3B;
/// Row-relative and column-relative bits of a BIFF8 column field.
const COL_RELATIVE_ROW_AND_COL: u16 = 0xC000;

const OBJECT_LINK_TITLE: u16 = 1;
const AXIS_TYPE_VALUE: u16 = 1;
const VALUERANGE_ALL_AUTO: u16 = 0x011F;

pub fn record(id: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// `PtgRef3d` for one relative cell (0-based row/col).
pub fn ref3d(ixti: u16, row: u16, col: u16) -> Vec<u8> {
    let mut out = vec![PTG_REF3D];
    out.extend_from_slice(&ixti.to_le_bytes());
    out.extend_from_slice(&row.to_le_bytes());
    out.extend_from_slice(&(col | COL_RELATIVE_ROW_AND_COL).to_le_bytes());
    out
}

/// `PtgArea3d` for a relative area (0-based, inclusive).
pub fn area3d(ixti: u16, rows: (u16, u16), cols: (u16, u16)) -> Vec<u8> {
    let mut out = vec![PTG_AREA3D];
    out.extend_from_slice(&ixti.to_le_bytes());
    out.extend_from_slice(&rows.0.to_le_bytes());
    out.extend_from_slice(&rows.1.to_le_bytes());
    out.extend_from_slice(&(cols.0 | COL_RELATIVE_ROW_AND_COL).to_le_bytes());
    out.extend_from_slice(&(cols.1 | COL_RELATIVE_ROW_AND_COL).to_le_bytes());
    out
}

/// `AI` payload: `[id][rt][grbit][ifmt][cce][rgce]`.
pub fn ai(id: u8, rt: u8, rgce: &[u8]) -> Vec<u8> {
    let mut out = vec![id, rt, 0, 0, 0, 0];
    out.extend_from_slice(&(rgce.len() as u16).to_le_bytes());
    out.extend_from_slice(rgce);
    out
}

/// Compressed (8-bit) `SERIESTEXT` payload.
pub fn series_text(text: &str) -> Vec<u8> {
    let mut out = vec![0, 0, text.len() as u8, 0];
    out.extend_from_slice(text.as_bytes());
    out
}

pub fn series_list(one_based: &[u16]) -> Vec<u8> {
    let mut out = (one_based.len() as u16).to_le_bytes().to_vec();
    for index in one_based {
        out.extend_from_slice(&index.to_le_bytes());
    }
    out
}

/// One series in column `col` of the sheet behind `ixti`: legend in row 1, values in rows 2-5,
/// categories in `A2:A5`.
fn push_series(out: &mut Vec<u8>, ixti: u16, col: u16, legend: &str, group: u16) {
    out.extend(record(RECORD_SERIES, &[1, 0, 1, 0, 4, 0, 4, 0, 1, 0, 0, 0]));
    out.extend(record(RECORD_BEGIN, &[]));
    out.extend(record(RECORD_AI, &ai(AI_ID_TEXT, AI_RT_WORKSHEET, &ref3d(ixti, 0, col))));
    out.extend(record(RECORD_SERIESTEXT, &series_text(legend)));
    out.extend(record(
        RECORD_AI,
        &ai(AI_ID_VALUES, AI_RT_WORKSHEET, &area3d(ixti, (1, 4), (col, col))),
    ));
    out.extend(record(
        RECORD_AI,
        &ai(AI_ID_CATEGORIES, AI_RT_WORKSHEET, &area3d(ixti, (1, 4), (0, 0))),
    ));
    out.extend(record(RECORD_AI, &ai(AI_ID_BUBBLES, AI_RT_TEXT, &[])));
    out.extend(record(RECORD_DATAFORMAT, &[0xFF, 0xFF, 0, 0, 0, 0, 0, 0]));
    out.extend(record(RECORD_BEGIN, &[]));
    out.extend(record(RECORD_END, &[]));
    out.extend(record(RECORD_SERTOCRT, &group.to_le_bytes()));
    out.extend(record(RECORD_END, &[]));
}

fn push_chart_format(out: &mut Vec<u8>, chart_type: (u16, &[u8]), members: &[u16]) {
    out.extend(record(RECORD_CHARTFORMAT, &[0; 20]));
    out.extend(record(RECORD_BEGIN, &[]));
    out.extend(record(chart_type.0, chart_type.1));
    out.extend(record(RECORD_SERIESLIST, &series_list(members)));
    out.extend(record(RECORD_END, &[]));
}

/// A column + line chart over `Sheet1` (ixti 0):
///
/// - series 0 "North": `B2:B5` by `A2:A5`, in the column group;
/// - series 1 "South": `C2:C5` by `A2:A5`, in the line group;
/// - title "Sales by region";
/// - one value axis with an all-automatic `VALUERANGE`.
///
/// `between_series` is written as a leaf record between the two series.
pub fn build_two_group_chart(between_series: Option<(u16, &[u8])>) -> Vec<u8> {
    build_two_group_chart_at(0, between_series)
}

/// [`build_two_group_chart`] with every reference using `ixti`.
pub fn build_two_group_chart_at(ixti: u16, between_series: Option<(u16, &[u8])>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(record(RECORD_CHART, &[0; 16]));
    out.extend(record(RECORD_BEGIN, &[]));

    push_series(&mut out, ixti, 1, "North", 0);
    if let Some((id, payload)) = between_series {
        out.extend(record(id, payload));
    }
    push_series(&mut out, ixti, 2, "South", 1);

    out.extend(record(RECORD_TEXT, &[0; 26]));
    out.extend(record(RECORD_BEGIN, &[]));
    out.extend(record(RECORD_AI, &ai(AI_ID_TEXT, AI_RT_TEXT, &[])));
    out.extend(record(RECORD_SERIESTEXT, &series_text("Sales by region")));
    let mut link = OBJECT_LINK_TITLE.to_le_bytes().to_vec();
    link.extend_from_slice(&[0, 0, 0, 0]);
    out.extend(record(RECORD_OBJECTLINK, &link));
    out.extend(record(RECORD_END, &[]));

    out.extend(record(RECORD_AXISPARENT, &[0; 18]));
    out.extend(record(RECORD_BEGIN, &[]));
    let mut axis = AXIS_TYPE_VALUE.to_le_bytes().to_vec();
    axis.extend_from_slice(&[0; 16]);
    out.extend(record(RECORD_AXIS, &axis));
    out.extend(record(RECORD_BEGIN, &[]));
    let mut value_range = vec![0u8; 40];
    value_range.extend_from_slice(&VALUERANGE_ALL_AUTO.to_le_bytes());
    out.extend(record(RECORD_VALUERANGE, &value_range));
    out.extend(record(RECORD_END, &[]));
    push_chart_format(&mut out, (RECORD_BAR, &[0, 0, 150, 0, 0, 0]), &[1]);
    push_chart_format(&mut out, (RECORD_LINE, &[0, 0]), &[2]);
    out.extend(record(RECORD_END, &[]));

    out.extend(record(RECORD_END, &[]));
    out
}

/// Payloads of every record in `bytes` with `id`, in stream order.
pub fn find_records(bytes: &[u8], id: u16) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    while offset + 4 <= bytes.len() {
        let rid = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let len = u16::from_le_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        let payload = &bytes[offset + 4..offset + 4 + len];
        if rid == id {
            out.push(payload.to_vec());
        }
        offset += 4 + len;
    }
    out
}
