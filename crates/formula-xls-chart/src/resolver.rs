/// A worksheet cell value as reported by the host workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(String),
}

impl CellValue {
    /// Text shown for this value when it is used as a legend or title.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::Error(e) => e.clone(),
        }
    }
}

/// Host-side cell lookup used when a text range needs its current value.
pub trait CellResolver {
    /// Values of the cells in `range_text` (e.g. `Sheet1!$B$1`), row-major.
    fn resolve_range(&self, range_text: &str) -> Vec<CellValue>;
}

impl<F> CellResolver for F
where
    F: Fn(&str) -> Vec<CellValue>,
{
    fn resolve_range(&self, range_text: &str) -> Vec<CellValue> {
        self(range_text)
    }
}
