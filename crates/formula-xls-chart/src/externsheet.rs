//! Cross-sheet reference table (`EXTERNSHEET`) collaborator.
//!
//! Chart range tokens (`PtgRef3d` / `PtgArea3d`) address sheets indirectly through an `ixti`
//! index into the workbook-global XTI table. The table is shared by every chart in a workbook,
//! so this module exposes it as a trait object behind `Rc<RefCell<..>>` and ties listener
//! registration to a drop guard.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Hard cap on the number of XTI entries parsed from an `EXTERNSHEET` record.
const MAX_XTI_ENTRIES: usize = 16_384;

/// `itabFirst`/`itabLast` marker for a reference to a sheet that no longer exists.
pub const ITAB_DELETED: i16 = -2;

/// Handle identifying one registered token reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// The workbook's cross-sheet reference table, as seen by chart range descriptors.
pub trait ExternSheetTable {
    /// Display name for the sheet (or `First:Last` sheet span) behind `ixti`.
    fn sheet_name(&self, ixti: u16) -> Option<String>;

    /// Tab index of the sheet named `name` (case-insensitive).
    fn sheet_index(&self, name: &str) -> Option<u16>;

    /// Returns the `ixti` for the internal sheet span `first..=last`, adding an entry if needed.
    fn insert_location(&mut self, first: u16, last: u16) -> u16;

    /// Record that a token currently refers to `ixti`.
    fn register(&mut self, ixti: u16) -> ListenerId;

    fn unregister(&mut self, id: ListenerId);

    /// Current `ixti` for a registered token. Differs from the registered value after the
    /// table renumbers its entries.
    fn registered_ixti(&self, id: ListenerId) -> Option<u16>;
}

pub type SharedExternSheet = Rc<RefCell<dyn ExternSheetTable>>;

/// Register `ixti` with `table`. The listener is removed when the returned guard is dropped.
///
/// Returns `None` when the table is already borrowed by the caller.
pub fn register(table: &SharedExternSheet, ixti: u16) -> Option<Registration> {
    let id = match table.try_borrow_mut() {
        Ok(mut table) => table.register(ixti),
        Err(_) => {
            log::warn!("cross-sheet table busy; reference to ixti={ixti} not registered");
            return None;
        }
    };
    Some(Registration {
        table: Rc::downgrade(table),
        id,
        ixti,
    })
}

/// Scoped listener registration.
pub struct Registration {
    table: Weak<RefCell<dyn ExternSheetTable>>,
    id: ListenerId,
    ixti: u16,
}

impl Registration {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The `ixti` this registration last synchronized to.
    pub fn ixti(&self) -> u16 {
        self.ixti
    }

    /// Pull the table's current `ixti` for this listener. Returns `(old, new)` when it moved.
    pub(crate) fn sync(&mut self) -> Option<(u16, u16)> {
        let table = self.table.upgrade()?;
        let current = table.try_borrow().ok()?.registered_ixti(self.id)?;
        if current == self.ixti {
            return None;
        }
        let old = std::mem::replace(&mut self.ixti, current);
        Some((old, current))
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("ixti", &self.ixti)
            .finish()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        match table.try_borrow_mut() {
            Ok(mut table) => table.unregister(self.id),
            Err(_) => log::warn!(
                "cross-sheet table busy while dropping listener {:?} (ixti={}); listener leaked",
                self.id,
                self.ixti
            ),
        };
    }
}

/// An entry in the BIFF8 `EXTERNSHEET` table.
///
/// This corresponds to one `XTI` structure in [MS-XLS] 2.4.102.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternSheetEntry {
    /// Index of the referenced `SUPBOOK` record (`iSupBook`).
    ///
    /// `0` indicates an internal workbook reference.
    pub supbook: u16,
    /// First BIFF sheet index in the referenced sheet range (`itabFirst`).
    pub itab_first: i16,
    /// Last BIFF sheet index in the referenced sheet range (`itabLast`).
    pub itab_last: i16,
}

/// In-memory cross-sheet reference table for a single workbook.
#[derive(Debug, Default)]
pub struct InMemoryExternSheet {
    sheets: Vec<String>,
    entries: Vec<ExternSheetEntry>,
    listeners: BTreeMap<ListenerId, u16>,
    next_listener: u64,
    /// Any non-fatal parse warnings.
    pub warnings: Vec<String>,
}

impl InMemoryExternSheet {
    /// A table with the given sheets (tab order) and no XTI entries yet.
    pub fn new<S: Into<String>>(sheets: impl IntoIterator<Item = S>) -> Self {
        Self {
            sheets: sheets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Build a table from the payload of a BIFF8 `EXTERNSHEET` record.
    ///
    /// Best-effort: truncated or oversized tables are clamped and reported in `warnings`.
    pub fn from_record_data<S: Into<String>>(
        sheets: impl IntoIterator<Item = S>,
        data: &[u8],
    ) -> Self {
        let mut out = Self::new(sheets);
        out.parse_externsheet_record(data);
        out
    }

    pub fn into_shared(self) -> SharedExternSheet {
        Rc::new(RefCell::new(self))
    }

    pub fn sheets(&self) -> &[String] {
        &self.sheets
    }

    pub fn entries(&self) -> &[ExternSheetEntry] {
        &self.entries
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Listeners currently registered against `ixti`.
    pub fn listeners_for(&self, ixti: u16) -> usize {
        self.listeners.values().filter(|&&v| v == ixti).count()
    }

    /// Serialize the XTI table as an `EXTERNSHEET` payload.
    pub fn to_record_data(&self) -> Vec<u8> {
        let count = self.entries.len().min(u16::MAX as usize);
        let mut out = Vec::with_capacity(2 + count * 6);
        out.extend_from_slice(&(count as u16).to_le_bytes());
        for entry in &self.entries[..count] {
            out.extend_from_slice(&entry.supbook.to_le_bytes());
            out.extend_from_slice(&entry.itab_first.to_le_bytes());
            out.extend_from_slice(&entry.itab_last.to_le_bytes());
        }
        out
    }

    /// Insert a sheet at tab position `at`. Entries pointing at or past `at` shift right.
    pub fn insert_sheet(&mut self, at: usize, name: impl Into<String>) {
        let at = at.min(self.sheets.len());
        self.sheets.insert(at, name.into());
        for entry in self.internal_entries_mut() {
            for itab in [&mut entry.itab_first, &mut entry.itab_last] {
                if *itab >= 0 && *itab as usize >= at {
                    *itab = itab.saturating_add(1);
                }
            }
        }
    }

    /// Remove the sheet at tab position `at`. Entries pointing at it become deleted
    /// references; entries past it shift left.
    pub fn remove_sheet(&mut self, at: usize) -> Option<String> {
        if at >= self.sheets.len() {
            return None;
        }
        let removed = self.sheets.remove(at);
        for entry in self.internal_entries_mut() {
            let first_hit = entry.itab_first >= 0 && entry.itab_first as usize == at;
            let last_hit = entry.itab_last >= 0 && entry.itab_last as usize == at;
            if first_hit && last_hit {
                entry.itab_first = ITAB_DELETED;
                entry.itab_last = ITAB_DELETED;
                continue;
            }
            // A 3-D span shrinks around the removed sheet.
            if entry.itab_first >= 0 && entry.itab_first as usize > at {
                entry.itab_first -= 1;
            }
            if entry.itab_last >= 0 && entry.itab_last as usize >= at {
                entry.itab_last -= 1;
            }
        }
        Some(removed)
    }

    pub fn rename_sheet(&mut self, at: usize, name: impl Into<String>) -> bool {
        match self.sheets.get_mut(at) {
            Some(slot) => {
                *slot = name.into();
                true
            }
            None => false,
        }
    }

    /// Drop XTI entries that no listener references and renumber the rest.
    ///
    /// Registered listeners are remapped; holders pick the new index up on their next sync.
    /// Returns the number of entries removed.
    pub fn compact(&mut self) -> usize {
        let mut remap: Vec<Option<u16>> = Vec::with_capacity(self.entries.len());
        let mut kept = Vec::with_capacity(self.entries.len());
        for (ixti, entry) in self.entries.iter().enumerate() {
            let referenced = self.listeners.values().any(|&v| v as usize == ixti);
            if referenced {
                remap.push(Some(kept.len() as u16));
                kept.push(*entry);
            } else {
                remap.push(None);
            }
        }

        let removed = self.entries.len() - kept.len();
        self.entries = kept;
        for ixti in self.listeners.values_mut() {
            if let Some(Some(new)) = remap.get(*ixti as usize) {
                *ixti = *new;
            }
        }
        removed
    }

    fn internal_entries_mut(&mut self) -> impl Iterator<Item = &mut ExternSheetEntry> {
        self.entries.iter_mut().filter(|e| e.supbook == 0)
    }

    fn parse_externsheet_record(&mut self, data: &[u8]) {
        // BIFF8 EXTERNSHEET layout:
        //   [cXTI: u16]
        //   cXTI * [iSupBook: u16, itabFirst: i16, itabLast: i16]
        if data.len() < 2 {
            self.warnings
                .push("truncated EXTERNSHEET record: missing cxti".to_string());
            return;
        }

        let cxti = u16::from_le_bytes([data[0], data[1]]) as usize;
        let max_entries = (data.len().saturating_sub(2)) / 6;
        if cxti > max_entries {
            self.warnings.push(format!(
                "EXTERNSHEET cxti={cxti} exceeds available data; clamping to {max_entries}"
            ));
        }

        let mut to_parse = cxti.min(max_entries);
        if to_parse > MAX_XTI_ENTRIES {
            self.warnings.push(format!(
                "EXTERNSHEET has {to_parse} XTI entries; capping to {MAX_XTI_ENTRIES}"
            ));
            to_parse = MAX_XTI_ENTRIES;
        }

        let _ = self.entries.try_reserve_exact(to_parse);
        for chunk in data[2..].chunks_exact(6).take(to_parse) {
            self.entries.push(ExternSheetEntry {
                supbook: u16::from_le_bytes([chunk[0], chunk[1]]),
                itab_first: i16::from_le_bytes([chunk[2], chunk[3]]),
                itab_last: i16::from_le_bytes([chunk[4], chunk[5]]),
            });
        }
    }

    fn tab_name(&self, itab: i16) -> Option<&str> {
        if itab < 0 {
            return None;
        }
        self.sheets.get(itab as usize).map(String::as_str)
    }
}

impl ExternSheetTable for InMemoryExternSheet {
    fn sheet_name(&self, ixti: u16) -> Option<String> {
        let entry = self.entries.get(ixti as usize)?;
        if entry.supbook != 0 {
            return None;
        }
        let first = self.tab_name(entry.itab_first)?;
        if entry.itab_first == entry.itab_last {
            return Some(first.to_string());
        }
        let last = self.tab_name(entry.itab_last)?;
        Some(format!("{first}:{last}"))
    }

    fn sheet_index(&self, name: &str) -> Option<u16> {
        self.sheets
            .iter()
            .position(|s| s.eq_ignore_ascii_case(name))
            .and_then(|idx| u16::try_from(idx).ok())
    }

    fn insert_location(&mut self, first: u16, last: u16) -> u16 {
        let itab_first = first as i16;
        let itab_last = last as i16;
        if let Some(existing) = self.entries.iter().position(|e| {
            e.supbook == 0 && e.itab_first == itab_first && e.itab_last == itab_last
        }) {
            return existing as u16;
        }
        self.entries.push(ExternSheetEntry {
            supbook: 0,
            itab_first,
            itab_last,
        });
        (self.entries.len() - 1) as u16
    }

    fn register(&mut self, ixti: u16) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener = self.next_listener.wrapping_add(1);
        self.listeners.insert(id, ixti);
        id
    }

    fn unregister(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn registered_ixti(&self, id: ListenerId) -> Option<u16> {
        self.listeners.get(&id).copied()
    }
}
