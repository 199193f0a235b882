//! Linked range descriptors (`AI`, 0x1051).
//!
//! Each `AI` record binds one chart element (series values, categories, bubble sizes, or a
//! legend/title text) to worksheet cells through a small `rgce` expression.
//!
//! Payload layout:
//!
//! ```text
//! [id:u8][rt:u8][grbit:u16][ifmt:u16][cce:u16][rgce:cce bytes][trailing bytes]
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ChartWarning, RetargetError};
use crate::records::MAX_RECORD_PAYLOAD;
use crate::externsheet::{self, ExternSheetTable, Registration, SharedExternSheet};
use crate::location::{push_sheet_prefix, Location, LocationParseError};
use crate::ptg::{self, ExpressionToken};
use crate::resolver::CellResolver;
use crate::strings::SeriesText;

pub const AI_HEADER_LEN: usize = 8;
const AI_CCE_OFFSET: usize = 6;
/// `grbit` bit: `ifmt` overrides the source cells' number format.
const AI_FLAG_CUSTOM_NUMBER_FORMAT: u16 = 0x0001;

/// Which chart element the range feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeRole {
    /// Legend entry or title text.
    Text,
    Values,
    Categories,
    BubbleSizes,
}

impl RangeRole {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(RangeRole::Text),
            1 => Some(RangeRole::Values),
            2 => Some(RangeRole::Categories),
            3 => Some(RangeRole::BubbleSizes),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            RangeRole::Text => 0,
            RangeRole::Values => 1,
            RangeRole::Categories => 2,
            RangeRole::BubbleSizes => 3,
        }
    }
}

/// The `rt` byte: where the element's data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Default,
    /// Literal text or values; no backing cells.
    Text,
    Worksheet,
    Error,
    Other(u8),
}

impl ReferenceKind {
    pub fn from_byte(rt: u8) -> Self {
        match rt {
            0 => ReferenceKind::Default,
            1 => ReferenceKind::Text,
            2 => ReferenceKind::Worksheet,
            4 => ReferenceKind::Error,
            other => ReferenceKind::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ReferenceKind::Default => 0,
            ReferenceKind::Text => 1,
            ReferenceKind::Worksheet => 2,
            ReferenceKind::Error => 4,
            ReferenceKind::Other(other) => other,
        }
    }
}

/// Where a reference points after a sheet retarget could not resolve its destination sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    pub workbook: String,
    pub sheet: String,
}

pub struct RangeDescriptor {
    role: RangeRole,
    ref_kind: ReferenceKind,
    flags: u16,
    number_format: u16,
    expression: Vec<ExpressionToken>,
    trailing: Vec<u8>,
    /// Owned record payload, patched in place after every mutation.
    payload: Vec<u8>,
    bound_sheet_name: Option<String>,
    bound_sheet_ref: Option<u16>,
    origin_sheet: Option<String>,
    series_text: Option<SeriesText>,
    external_link: Option<ExternalLink>,
    extern_sheet: Option<SharedExternSheet>,
    registrations: Vec<Registration>,
}

impl RangeDescriptor {
    /// Decode an `AI` payload. Every 3-D reference in the expression is registered with
    /// `extern_sheet` for as long as the descriptor lives.
    pub fn parse(data: &[u8], extern_sheet: Option<SharedExternSheet>) -> Result<Self, String> {
        if data.len() < AI_HEADER_LEN {
            return Err(format!(
                "AI payload is {} bytes; expected at least {AI_HEADER_LEN}",
                data.len()
            ));
        }
        let role =
            RangeRole::from_id(data[0]).ok_or_else(|| format!("unknown AI id {}", data[0]))?;
        let cce = u16::from_le_bytes([data[AI_CCE_OFFSET], data[AI_CCE_OFFSET + 1]]) as usize;
        let Some(rgce) = data.get(AI_HEADER_LEN..AI_HEADER_LEN + cce) else {
            return Err(format!(
                "AI declares cce={cce} but only {} expression bytes remain",
                data.len() - AI_HEADER_LEN
            ));
        };

        let mut out = Self {
            role,
            ref_kind: ReferenceKind::from_byte(data[1]),
            flags: u16::from_le_bytes([data[2], data[3]]),
            number_format: u16::from_le_bytes([data[4], data[5]]),
            expression: ptg::parse(rgce),
            trailing: data[AI_HEADER_LEN + cce..].to_vec(),
            payload: data.to_vec(),
            bound_sheet_name: None,
            bound_sheet_ref: None,
            origin_sheet: None,
            series_text: None,
            external_link: None,
            extern_sheet,
            registrations: Vec::new(),
        };
        out.refresh_registrations();
        Ok(out)
    }

    /// An empty descriptor, as inserted for a new series.
    ///
    /// The usual prototypes are `(Text, Worksheet)` for a legend, `(Text, Text)` for a legend
    /// without backing cell, `(Values, Worksheet)`, `(Categories, Worksheet)` and
    /// `(BubbleSizes, Text)`.
    pub fn new(
        role: RangeRole,
        ref_kind: ReferenceKind,
        extern_sheet: Option<SharedExternSheet>,
    ) -> Self {
        let mut out = Self {
            role,
            ref_kind,
            flags: 0,
            number_format: 0,
            expression: Vec::new(),
            trailing: Vec::new(),
            payload: Vec::with_capacity(AI_HEADER_LEN),
            bound_sheet_name: None,
            bound_sheet_ref: None,
            origin_sheet: None,
            series_text: None,
            external_link: None,
            extern_sheet,
            registrations: Vec::new(),
        };
        out.rebuild_payload();
        out
    }

    pub fn role(&self) -> RangeRole {
        self.role
    }

    pub fn ref_kind(&self) -> ReferenceKind {
        self.ref_kind
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn custom_number_format(&self) -> Option<u16> {
        (self.flags & AI_FLAG_CUSTOM_NUMBER_FORMAT != 0).then_some(self.number_format)
    }

    pub fn set_custom_number_format(&mut self, ifmt: Option<u16>) {
        match ifmt {
            Some(ifmt) => {
                self.flags |= AI_FLAG_CUSTOM_NUMBER_FORMAT;
                self.number_format = ifmt;
            }
            None => {
                self.flags &= !AI_FLAG_CUSTOM_NUMBER_FORMAT;
                self.number_format = 0;
            }
        }
        self.rebuild_payload();
    }

    pub fn expression(&self) -> &[ExpressionToken] {
        &self.expression
    }

    pub fn trailing_bytes(&self) -> &[u8] {
        &self.trailing
    }

    pub fn bound_sheet_name(&self) -> Option<&str> {
        self.bound_sheet_name.as_deref()
    }

    pub fn bound_sheet_ref(&self) -> Option<u16> {
        self.bound_sheet_ref
    }

    pub fn origin_sheet(&self) -> Option<&str> {
        self.origin_sheet.as_deref()
    }

    pub fn external_link(&self) -> Option<&ExternalLink> {
        self.external_link.as_ref()
    }

    pub fn extern_sheet(&self) -> Option<&SharedExternSheet> {
        self.extern_sheet.as_ref()
    }

    pub fn series_text(&self) -> Option<&SeriesText> {
        self.series_text.as_ref()
    }

    pub(crate) fn attach_series_text(&mut self, text: SeriesText) {
        self.series_text = Some(text);
    }

    pub fn legend_text(&self) -> Option<&str> {
        self.series_text.as_ref().map(SeriesText::text)
    }

    /// Set the literal text, adding a `SERIESTEXT` record if there was none.
    pub fn set_legend_text(&mut self, text: &str) {
        match &mut self.series_text {
            Some(st) => st.set_text(text),
            None => self.series_text = Some(SeriesText::new(text)),
        }
    }

    /// Number of listener registrations currently held against the cross-sheet table.
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// The referenced range as A1 text, e.g. `Sheet1!$A$1:$A$12`.
    ///
    /// Union members are separated by `,`. A degraded external reference renders as
    /// `[Book.xls]Sheet!A1`.
    pub fn definition_text(&self) -> String {
        if let Some(link) = &self.external_link {
            let mut prefix = format!("[{}]", link.workbook);
            push_sheet_prefix(&mut prefix, &link.sheet);
            let cells = ptg::render(&self.expression, None);
            if cells.is_empty() {
                return String::new();
            }
            return cells
                .split(',')
                .map(|piece| format!("{prefix}{piece}"))
                .collect::<Vec<_>>()
                .join(",");
        }

        let table = self.extern_sheet.as_ref().and_then(|t| t.try_borrow().ok());
        let sheets: Option<&dyn ExternSheetTable> = table.as_deref();
        ptg::render(&self.expression, sheets)
    }

    /// Byte length of the expression (`cce`).
    pub fn expression_size(&self) -> usize {
        ptg::encoded_len(&self.expression)
    }

    /// Full payload length, which is the owning record's length field.
    pub fn serialized_size(&self) -> usize {
        self.payload.len()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.payload.clone()
    }

    /// Point the descriptor at `new_location` (e.g. `Sheet1!$B$1:$B$20`).
    pub fn retarget(&mut self, new_location: &str) -> Result<(), RetargetError> {
        self.retarget_with_cells(new_location, None)
    }

    /// Like [`RangeDescriptor::retarget`]; a text descriptor bound to a single cell also takes
    /// that cell's current value from `cells` as its literal text.
    ///
    /// Nothing is modified when an error is returned.
    pub fn retarget_with_cells(
        &mut self,
        new_location: &str,
        cells: Option<&dyn CellResolver>,
    ) -> Result<(), RetargetError> {
        let text = new_location.trim();
        let slot = ptg::first_addressing_slot(&self.expression);

        if text.is_empty() {
            if slot.is_some() {
                return Err(RetargetError::InvalidLocation {
                    location: String::new(),
                    source: LocationParseError::Empty,
                });
            }
            // A legend or category without backing cells.
            self.ref_kind = ReferenceKind::Text;
            self.rebuild_payload();
            return Ok(());
        }

        let location = Location::parse(text).map_err(|source| RetargetError::InvalidLocation {
            location: text.to_string(),
            source,
        })?;

        let current = slot.and_then(|s| ptg::slot_token(&self.expression, s));
        let current_shape = current.and_then(ExpressionToken::shape);
        let current_class = current.and_then(ExpressionToken::ptg);
        let current_ixti = current.and_then(ExpressionToken::ixti);

        if let (Some(slot), Some(existing)) = (slot, current_shape) {
            if slot.is_mem_func_member() && existing != location.shape() {
                return Err(RetargetError::ShapeMismatch {
                    existing,
                    replacement: location.shape(),
                });
            }
        }

        let ixti = self.resolve_ixti(&location, current_ixti)?;
        let token = ExpressionToken::from_location(&location, ixti, current_class);

        let mut expression = self.expression.clone();
        match slot.and_then(|s| ptg::slot_token_mut(&mut expression, s)) {
            Some(existing) => *existing = token,
            None => expression = vec![token],
        }
        self.encode_expression(&expression)?;
        self.expression = expression;
        self.ref_kind = ReferenceKind::Worksheet;
        self.external_link = None;
        self.rebuild_payload();
        self.refresh_registrations();

        if self.role == RangeRole::Text && location.is_single_cell() {
            if let (Some(cells), true) = (cells, self.series_text.is_some()) {
                let values = cells.resolve_range(&self.definition_text());
                if let (Some(value), Some(st)) = (values.first(), self.series_text.as_mut()) {
                    st.set_text(&value.to_display_string());
                }
            }
        }
        Ok(())
    }

    fn resolve_ixti(
        &self,
        location: &Location,
        current_ixti: Option<u16>,
    ) -> Result<u16, RetargetError> {
        let sheet = match &location.sheet {
            Some(sheet) => sheet.as_str(),
            None => {
                if let Some(ixti) = current_ixti.or(self.bound_sheet_ref) {
                    return Ok(ixti);
                }
                match self.origin_sheet.as_deref() {
                    Some(origin) => origin,
                    None => return Err(RetargetError::MissingSheet(location.to_string())),
                }
            }
        };

        let unknown = || RetargetError::UnknownSheet(sheet.to_string());
        let table = self.extern_sheet.as_ref().ok_or_else(unknown)?;
        let mut table = table.try_borrow_mut().map_err(|_| unknown())?;
        let itab = table.sheet_index(sheet).ok_or_else(unknown)?;

        if let Some(current) = current_ixti {
            let same_sheet = table
                .sheet_name(current)
                .is_some_and(|name| name.eq_ignore_ascii_case(sheet));
            if same_sheet {
                return Ok(current);
            }
        }
        Ok(table.insert_location(itab, itab))
    }

    /// Remember where this range pointed before a sheet copy or move. No-op once populated.
    pub fn prepare_for_transfer(&mut self, origin_sheet: &str) {
        if self.bound_sheet_name.is_some() || self.bound_sheet_ref.is_some() {
            return;
        }
        self.origin_sheet = Some(origin_sheet.to_string());

        let Some(ixti) = ptg::addressing_ixtis(&self.expression).first().copied() else {
            return;
        };
        self.bound_sheet_ref = Some(ixti);
        self.bound_sheet_name = self
            .extern_sheet
            .as_ref()
            .and_then(|t| t.try_borrow().ok())
            .and_then(|t| t.sheet_name(ixti));
    }

    /// Rebind sheet-qualified references after the owning sheet was copied or moved.
    ///
    /// A reference to the chart's own sheet follows it to `new_sheet`. A reference to another
    /// sheet is looked up again by name. When the sheet cannot be resolved the expression bytes
    /// are left alone and the reference is marked as pointing into `origin_workbook`.
    pub fn retarget_sheet(&mut self, new_sheet: &str, origin_workbook: &str) -> Option<ChartWarning> {
        if ptg::first_addressing_slot(&self.expression).is_none() {
            return None;
        }

        // A reference to another sheet keeps pointing there; one to the chart's own sheet moves.
        let target = match (&self.bound_sheet_name, &self.origin_sheet) {
            (Some(bound), Some(origin)) if !bound.eq_ignore_ascii_case(origin) => bound.clone(),
            _ => new_sheet.to_string(),
        };
        let follows_chart = target == new_sheet;

        let resolved = self.extern_sheet.as_ref().and_then(|table| {
            let mut table = table.try_borrow_mut().ok()?;
            let itab = table.sheet_index(&target)?;
            Some(table.insert_location(itab, itab))
        });

        match resolved {
            Some(ixti) => {
                self.set_externsheet_index(ixti);
                self.external_link = None;
                self.bound_sheet_ref = Some(ixti);
                if follows_chart {
                    self.origin_sheet = Some(target.clone());
                }
                self.bound_sheet_name = Some(target);
                None
            }
            None => {
                log::warn!(
                    "chart range sheet `{target}` not found; keeping reference into `{origin_workbook}`"
                );
                self.external_link = Some(ExternalLink {
                    workbook: origin_workbook.to_string(),
                    sheet: target.clone(),
                });
                Some(ChartWarning::UnresolvableSheet {
                    sheet: target,
                    workbook: origin_workbook.to_string(),
                })
            }
        }
    }

    /// Point every 3-D reference at `ixti`.
    pub fn set_externsheet_index(&mut self, ixti: u16) {
        ptg::for_each_addressing_mut(&mut self.expression, &mut |t: &mut ExpressionToken| {
            t.set_ixti(ixti)
        });
        self.rebuild_payload();
        self.refresh_registrations();
    }

    /// Point every 3-D reference currently at `old` to `new`. Returns how many were changed.
    pub fn replace_externsheet_index(&mut self, old: u16, new: u16) -> usize {
        let mut changed = 0usize;
        ptg::for_each_addressing_mut(&mut self.expression, &mut |t: &mut ExpressionToken| {
            if t.ixti() == Some(old) {
                t.set_ixti(new);
                changed += 1;
            }
        });
        if changed > 0 {
            self.rebuild_payload();
            self.refresh_registrations();
        }
        changed
    }

    /// Apply index changes the cross-sheet table made to registered references (for example
    /// after [`crate::InMemoryExternSheet::compact`]). Returns `true` when the payload changed.
    pub fn sync_externsheet_indices(&mut self) -> bool {
        let remap: BTreeMap<u16, u16> = self
            .registrations
            .iter_mut()
            .filter_map(Registration::sync)
            .collect();
        if remap.is_empty() {
            return false;
        }

        ptg::for_each_addressing_mut(&mut self.expression, &mut |t: &mut ExpressionToken| {
            if let Some(new) = t.ixti().and_then(|old| remap.get(&old)) {
                t.set_ixti(*new);
            }
        });
        if let Some(new) = self.bound_sheet_ref.and_then(|old| remap.get(&old)) {
            self.bound_sheet_ref = Some(*new);
        }
        self.rebuild_payload();
        true
    }

    fn refresh_registrations(&mut self) {
        self.registrations.clear();
        let Some(table) = &self.extern_sheet else {
            return;
        };
        self.registrations = ptg::addressing_ixtis(&self.expression)
            .into_iter()
            .filter_map(|ixti| externsheet::register(table, ixti))
            .collect();
    }

    /// Serialized tokens for `expression`, provided the resulting `AI` payload fits a record.
    fn encode_expression(&self, expression: &[ExpressionToken]) -> Result<Vec<u8>, RetargetError> {
        let rgce = ptg::serialize(expression);
        let len = AI_HEADER_LEN + rgce.len() + self.trailing.len();
        if len > MAX_RECORD_PAYLOAD {
            return Err(RetargetError::ExpressionTooLarge { len });
        }
        Ok(rgce)
    }

    fn rebuild_payload(&mut self) {
        let rgce = match self.encode_expression(&self.expression) {
            Ok(rgce) => rgce,
            Err(err) => {
                // Only retarget grows the expression and it checks the size before committing.
                log::warn!("keeping previous AI payload: {err}");
                return;
            }
        };
        // Bounded by MAX_RECORD_PAYLOAD above.
        let cce = rgce.len() as u16;

        self.payload.truncate(AI_HEADER_LEN);
        self.payload.resize(AI_HEADER_LEN, 0);
        self.payload[0] = self.role.id();
        self.payload[1] = self.ref_kind.to_byte();
        self.payload[2..4].copy_from_slice(&self.flags.to_le_bytes());
        self.payload[4..6].copy_from_slice(&self.number_format.to_le_bytes());
        self.payload[AI_CCE_OFFSET..AI_HEADER_LEN].copy_from_slice(&cce.to_le_bytes());
        self.payload.extend_from_slice(&rgce);
        self.payload.extend_from_slice(&self.trailing);
    }
}

impl fmt::Debug for RangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeDescriptor")
            .field("role", &self.role)
            .field("ref_kind", &self.ref_kind)
            .field("definition", &self.definition_text())
            .field("legend_text", &self.legend_text())
            .field("external_link", &self.external_link)
            .field("registrations", &self.registrations.len())
            .finish()
    }
}
