#![allow(dead_code)]

pub mod chart_fixture_builder;

use std::cell::RefCell;
use std::rc::Rc;

use formula_xls_chart::{BuildOptions, ChartTree, ExternSheetTable, InMemoryExternSheet, SharedExternSheet};

/// A `Sheet1`/`Sheet2` workbook table whose first XTI entry (ixti 0) is `Sheet1`.
pub fn sheet_table() -> (Rc<RefCell<InMemoryExternSheet>>, SharedExternSheet) {
    let table = Rc::new(RefCell::new(InMemoryExternSheet::new(["Sheet1", "Sheet2"])));
    table.borrow_mut().insert_location(0, 0);
    let shared: SharedExternSheet = table.clone();
    (table, shared)
}

pub fn build_with_table(bytes: &[u8], table: &SharedExternSheet) -> ChartTree {
    let options = BuildOptions {
        extern_sheet: Some(table.clone()),
        ..BuildOptions::default()
    };
    formula_xls_chart::parse_chart(bytes, &options).expect("parse chart")
}
