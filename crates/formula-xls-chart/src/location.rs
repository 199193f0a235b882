//! A1-style location strings as they appear in chart range APIs (`Sheet1!$A$1:$A$12`).

use core::fmt;

use thiserror::Error;

use crate::error::RefShape;

/// Number of rows addressable by a BIFF8 cell reference.
pub const BIFF8_MAX_ROWS: u32 = 65_536;
/// Number of columns addressable by a BIFF8 cell reference.
pub const BIFF8_MAX_COLS: u32 = 256;

/// Errors that can occur when parsing a location string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationParseError {
    #[error("empty location")]
    Empty,
    #[error("missing column in A1 reference")]
    MissingColumn,
    #[error("missing row in A1 reference")]
    MissingRow,
    #[error("invalid column in A1 reference")]
    InvalidColumn,
    #[error("invalid row in A1 reference")]
    InvalidRow,
    #[error("trailing characters in A1 reference")]
    TrailingCharacters,
    #[error("unterminated quoted sheet name")]
    UnterminatedQuote,
    #[error("empty sheet name")]
    EmptySheetName,
}

/// A single cell with per-axis absolute (`$`) markers.
///
/// Rows and columns are **0-indexed**.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub row: u16,
    pub col: u16,
    pub row_absolute: bool,
    pub col_absolute: bool,
}

impl CellAddress {
    /// A fully relative address.
    pub const fn new(row: u16, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// A fully absolute address (`$A$1`).
    pub const fn absolute(row: u16, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: true,
            col_absolute: true,
        }
    }

    /// Parse an A1-style reference (e.g. `A1`, `$B$2`), bounded to the BIFF8 grid.
    pub fn parse(a1: &str) -> Result<Self, LocationParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(LocationParseError::Empty);
        }

        let bytes = s.as_bytes();
        let mut idx = 0usize;
        let col_absolute = bytes.get(idx) == Some(&b'$');
        if col_absolute {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(LocationParseError::MissingColumn);
        }
        let col_str = &s[col_start..idx];

        let row_absolute = bytes.get(idx) == Some(&b'$');
        if row_absolute {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == row_start {
            return Err(LocationParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(LocationParseError::TrailingCharacters);
        }

        let col = name_to_col(col_str)?;
        if col >= BIFF8_MAX_COLS {
            return Err(LocationParseError::InvalidColumn);
        }
        let row_1_based: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| LocationParseError::InvalidRow)?;
        if row_1_based == 0 || row_1_based > BIFF8_MAX_ROWS {
            return Err(LocationParseError::InvalidRow);
        }

        Ok(Self {
            row: (row_1_based - 1) as u16,
            col: col as u16,
            row_absolute,
            col_absolute,
        })
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.col_absolute {
            f.write_str("$")?;
        }
        f.write_str(&col_to_name(u32::from(self.col)))?;
        if self.row_absolute {
            f.write_str("$")?;
        }
        write!(f, "{}", u32::from(self.row) + 1)
    }
}

/// A parsed location: an optional sheet plus a cell or an inclusive area.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub sheet: Option<String>,
    pub first: CellAddress,
    /// `None` for a single-cell location. `A1:A1` is still an area.
    pub last: Option<CellAddress>,
}

impl Location {
    /// Parse `[sheet!]cell[:cell]`. Sheet names may be quoted (`'My Sheet'!A1`), with `''`
    /// standing for a literal quote.
    pub fn parse(text: &str) -> Result<Self, LocationParseError> {
        let s = text.trim();
        if s.is_empty() {
            return Err(LocationParseError::Empty);
        }

        let (sheet, rest) = split_sheet(s)?;
        let (first, last) = match rest.split_once(':') {
            None => (CellAddress::parse(rest)?, None),
            Some((a, b)) => {
                let a = CellAddress::parse(a)?;
                let b = CellAddress::parse(b)?;
                let (first, last) = normalize(a, b);
                (first, Some(last))
            }
        };

        Ok(Self { sheet, first, last })
    }

    pub fn is_single_cell(&self) -> bool {
        self.last.is_none()
    }

    pub fn shape(&self) -> RefShape {
        if self.is_single_cell() {
            RefShape::Cell
        } else {
            RefShape::Area
        }
    }

    /// Number of cells covered.
    pub fn cell_count(&self) -> u32 {
        match self.last {
            None => 1,
            Some(last) => {
                let rows = u32::from(last.row) - u32::from(self.first.row) + 1;
                let cols = u32::from(last.col) - u32::from(self.first.col) + 1;
                rows.saturating_mul(cols)
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            let mut prefix = String::new();
            push_sheet_prefix(&mut prefix, sheet);
            f.write_str(&prefix)?;
        }
        write!(f, "{}", self.first)?;
        if let Some(last) = &self.last {
            write!(f, ":{last}")?;
        }
        Ok(())
    }
}

/// Append `sheet!` to `out`, quoting the name when A1 syntax requires it.
///
/// `sheet` may be a `First:Last` span; the span is quoted as a whole only when one of its
/// names needs it.
pub fn push_sheet_prefix(out: &mut String, sheet: &str) {
    // ':' is not allowed in sheet names, so it only ever separates a span.
    if sheet.split(':').any(sheet_needs_quotes) {
        out.push('\'');
        for ch in sheet.chars() {
            if ch == '\'' {
                out.push('\'');
            }
            out.push(ch);
        }
        out.push('\'');
    } else {
        out.push_str(sheet);
    }
    out.push('!');
}

fn sheet_needs_quotes(sheet: &str) -> bool {
    let starts_with_digit = sheet.chars().next().is_some_and(|c| c.is_ascii_digit());
    starts_with_digit
        || sheet
            .chars()
            .any(|c| !(c.is_alphanumeric() || c == '_' || c == '.'))
}

fn split_sheet(s: &str) -> Result<(Option<String>, &str), LocationParseError> {
    if let Some(quoted) = s.strip_prefix('\'') {
        let mut name = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch != '\'' {
                name.push(ch);
                continue;
            }
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                name.push('\'');
                continue;
            }
            let rest = &quoted[idx + 1..];
            let rest = rest
                .strip_prefix('!')
                .ok_or(LocationParseError::TrailingCharacters)?;
            if name.is_empty() {
                return Err(LocationParseError::EmptySheetName);
            }
            return Ok((Some(name), rest));
        }
        return Err(LocationParseError::UnterminatedQuote);
    }

    match s.split_once('!') {
        None => Ok((None, s)),
        Some((sheet, rest)) => {
            let sheet = sheet.trim();
            if sheet.is_empty() {
                return Err(LocationParseError::EmptySheetName);
            }
            Ok((Some(sheet.to_string()), rest))
        }
    }
}

fn normalize(a: CellAddress, b: CellAddress) -> (CellAddress, CellAddress) {
    let (top, bottom) = if a.row <= b.row { (a, b) } else { (b, a) };
    let (left, right) = if a.col <= b.col { (a, b) } else { (b, a) };
    (
        CellAddress {
            row: top.row,
            row_absolute: top.row_absolute,
            col: left.col,
            col_absolute: left.col_absolute,
        },
        CellAddress {
            row: bottom.row,
            row_absolute: bottom.row_absolute,
            col: right.col,
            col_absolute: right.col_absolute,
        },
    )
}

pub(crate) fn col_to_name(col: u32) -> String {
    // Columns are 1-based in A1 notation. We store 0-based internally.
    let mut n = col + 1;
    let mut out = String::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.insert(0, char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    out
}

fn name_to_col(s: &str) -> Result<u32, LocationParseError> {
    let mut col: u32 = 0;
    for b in s.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(LocationParseError::InvalidColumn);
        }
        let v = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or(LocationParseError::InvalidColumn)?;
    }
    if col == 0 {
        return Err(LocationParseError::InvalidColumn);
    }
    Ok(col - 1)
}
