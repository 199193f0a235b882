//! BIFF8 `rgce` token streams as used by chart linked ranges.
//!
//! Chart ranges only ever need the sheet-qualified reference tokens (`PtgRef3d`, `PtgArea3d`),
//! the non-contiguous union wrapper (`PtgMemFunc`) and `PtgParen`. Every other ptg is kept as an
//! opaque [`ExpressionToken::Unknown`] so that `serialize(parse(rgce)) == rgce` holds for any
//! input.

use crate::error::RefShape;
use crate::externsheet::ExternSheetTable;
use crate::location::{push_sheet_prefix, CellAddress, Location};

pub const PTG_UNION: u8 = 0x10;
pub const PTG_PAREN: u8 = 0x15;

const PTG_BASE_REF3D: u8 = 0x1A;
const PTG_BASE_AREA3D: u8 = 0x1B;
const PTG_BASE_REF_ERR3D: u8 = 0x1C;
const PTG_BASE_AREA_ERR3D: u8 = 0x1D;

const PTG_CLASS_MASK: u8 = 0x60;
const PTG_CLASS_REFERENCE: u8 = 0x20;

// BIFF8 column field: [col:14 bits][row relative:1][col relative:1]
const COL_INDEX_MASK: u16 = 0x3FFF;
const ROW_RELATIVE_BIT: u16 = 0x4000;
const COL_RELATIVE_BIT: u16 = 0x8000;

const REF3D_PAYLOAD_LEN: usize = 6;
const AREA3D_PAYLOAD_LEN: usize = 10;

/// Nested `PtgMemFunc` sub-expressions deeper than this are kept opaque.
const MAX_MEM_FUNC_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRef3d {
    /// Original ptg byte, including class bits.
    pub ptg: u8,
    pub ixti: u16,
    pub cell: CellAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaRef3d {
    /// Original ptg byte, including class bits.
    pub ptg: u8,
    pub ixti: u16,
    pub first: CellAddress,
    pub last: CellAddress,
}

/// `PtgMemFunc`: a reference-valued sub-expression, in charts always a union of areas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemFunc {
    pub ptg: u8,
    pub tokens: Vec<ExpressionToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionToken {
    CellRef3d(CellRef3d),
    AreaRef3d(AreaRef3d),
    MemFunc(MemFunc),
    /// The token preceding a `PtgParen` in RPN order.
    Paren(Box<ExpressionToken>),
    /// Raw token bytes, starting with the ptg byte.
    Unknown(Vec<u8>),
}

impl ExpressionToken {
    /// Build the canonical 3-D token for `location`, using `class` bits from the token it
    /// replaces (`None` for a fresh reference-class token).
    pub fn from_location(location: &Location, ixti: u16, class: Option<u8>) -> Self {
        let class = match class.map(|c| c & PTG_CLASS_MASK) {
            Some(c) if c != 0 => c,
            _ => PTG_CLASS_REFERENCE,
        };
        match location.last {
            None => ExpressionToken::CellRef3d(CellRef3d {
                ptg: PTG_BASE_REF3D | class,
                ixti,
                cell: location.first,
            }),
            Some(last) => ExpressionToken::AreaRef3d(AreaRef3d {
                ptg: PTG_BASE_AREA3D | class,
                ixti,
                first: location.first,
                last,
            }),
        }
    }

    pub fn ptg(&self) -> Option<u8> {
        match self {
            ExpressionToken::CellRef3d(r) => Some(r.ptg),
            ExpressionToken::AreaRef3d(a) => Some(a.ptg),
            ExpressionToken::MemFunc(m) => Some(m.ptg),
            ExpressionToken::Paren(_) => Some(PTG_PAREN),
            ExpressionToken::Unknown(raw) => raw.first().copied(),
        }
    }

    pub fn shape(&self) -> Option<RefShape> {
        match self {
            ExpressionToken::CellRef3d(_) => Some(RefShape::Cell),
            ExpressionToken::AreaRef3d(_) => Some(RefShape::Area),
            _ => None,
        }
    }

    /// Sheet index of a 3-D reference token.
    pub fn ixti(&self) -> Option<u16> {
        match self {
            ExpressionToken::CellRef3d(r) => Some(r.ixti),
            ExpressionToken::AreaRef3d(a) => Some(a.ixti),
            _ => None,
        }
    }

    pub(crate) fn set_ixti(&mut self, ixti: u16) {
        match self {
            ExpressionToken::CellRef3d(r) => r.ixti = ixti,
            ExpressionToken::AreaRef3d(a) => a.ixti = ixti,
            _ => {}
        }
    }

    pub fn is_addressing(&self) -> bool {
        self.shape().is_some()
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            ExpressionToken::CellRef3d(_) => 1 + REF3D_PAYLOAD_LEN,
            ExpressionToken::AreaRef3d(_) => 1 + AREA3D_PAYLOAD_LEN,
            ExpressionToken::MemFunc(m) => 3 + encoded_len(&m.tokens),
            ExpressionToken::Paren(inner) => inner.encoded_len() + 1,
            ExpressionToken::Unknown(raw) => raw.len(),
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            ExpressionToken::CellRef3d(r) => {
                out.push(r.ptg);
                out.extend_from_slice(&r.ixti.to_le_bytes());
                out.extend_from_slice(&r.cell.row.to_le_bytes());
                out.extend_from_slice(&col_field(&r.cell).to_le_bytes());
            }
            ExpressionToken::AreaRef3d(a) => {
                out.push(a.ptg);
                out.extend_from_slice(&a.ixti.to_le_bytes());
                out.extend_from_slice(&a.first.row.to_le_bytes());
                out.extend_from_slice(&a.last.row.to_le_bytes());
                out.extend_from_slice(&col_field(&a.first).to_le_bytes());
                out.extend_from_slice(&col_field(&a.last).to_le_bytes());
            }
            ExpressionToken::MemFunc(m) => {
                let cce = encoded_len(&m.tokens).min(u16::MAX as usize) as u16;
                out.push(m.ptg);
                out.extend_from_slice(&cce.to_le_bytes());
                for token in &m.tokens {
                    token.encode_into(out);
                }
            }
            ExpressionToken::Paren(inner) => {
                inner.encode_into(out);
                out.push(PTG_PAREN);
            }
            ExpressionToken::Unknown(raw) => out.extend_from_slice(raw),
        }
    }

    fn render_into(&self, out: &mut String, sheets: Option<&dyn ExternSheetTable>) {
        match self {
            ExpressionToken::CellRef3d(r) => {
                push_sheet(out, r.ixti, sheets);
                out.push_str(&r.cell.to_string());
            }
            ExpressionToken::AreaRef3d(a) => {
                push_sheet(out, a.ixti, sheets);
                out.push_str(&a.first.to_string());
                out.push(':');
                out.push_str(&a.last.to_string());
            }
            ExpressionToken::MemFunc(m) => out.push_str(&render(&m.tokens, sheets)),
            ExpressionToken::Paren(inner) => inner.render_into(out, sheets),
            ExpressionToken::Unknown(raw) => {
                let is_ref_error = raw.first().is_some_and(|&ptg| {
                    ptg & PTG_CLASS_MASK != 0
                        && matches!(ptg & 0x1F, PTG_BASE_REF_ERR3D | PTG_BASE_AREA_ERR3D)
                });
                if is_ref_error {
                    out.push_str("#REF!");
                }
            }
        }
    }
}

fn push_sheet(out: &mut String, ixti: u16, sheets: Option<&dyn ExternSheetTable>) {
    let Some(sheets) = sheets else {
        return;
    };
    match sheets.sheet_name(ixti) {
        Some(name) => push_sheet_prefix(out, &name),
        None => out.push_str("#REF!"),
    }
}

fn cell_from_biff(row: u16, col_field: u16) -> CellAddress {
    CellAddress {
        row,
        col: col_field & COL_INDEX_MASK,
        row_absolute: col_field & ROW_RELATIVE_BIT == 0,
        col_absolute: col_field & COL_RELATIVE_BIT == 0,
    }
}

fn col_field(cell: &CellAddress) -> u16 {
    let mut field = cell.col & COL_INDEX_MASK;
    if !cell.row_absolute {
        field |= ROW_RELATIVE_BIT;
    }
    if !cell.col_absolute {
        field |= COL_RELATIVE_BIT;
    }
    field
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

/// Decode an `rgce` token stream. Never fails: anything not understood is kept as
/// [`ExpressionToken::Unknown`].
pub fn parse(rgce: &[u8]) -> Vec<ExpressionToken> {
    parse_tokens(rgce, 0)
}

fn parse_tokens(rgce: &[u8], depth: usize) -> Vec<ExpressionToken> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < rgce.len() {
        let ptg = rgce[i];
        let rest = &rgce[i + 1..];

        match ptg {
            PTG_PAREN => {
                let token = match out.pop() {
                    Some(inner) => ExpressionToken::Paren(Box::new(inner)),
                    None => ExpressionToken::Unknown(vec![ptg]),
                };
                out.push(token);
                i += 1;
            }

            // PtgRef3d: [ixti:u16][row:u16][col+flags:u16]
            0x3A | 0x5A | 0x7A if rest.len() >= REF3D_PAYLOAD_LEN => {
                out.push(ExpressionToken::CellRef3d(CellRef3d {
                    ptg,
                    ixti: read_u16(rest, 0),
                    cell: cell_from_biff(read_u16(rest, 2), read_u16(rest, 4)),
                }));
                i += 1 + REF3D_PAYLOAD_LEN;
            }

            // PtgArea3d: [ixti:u16][row1:u16][row2:u16][col1+flags:u16][col2+flags:u16]
            0x3B | 0x5B | 0x7B if rest.len() >= AREA3D_PAYLOAD_LEN => {
                out.push(ExpressionToken::AreaRef3d(AreaRef3d {
                    ptg,
                    ixti: read_u16(rest, 0),
                    first: cell_from_biff(read_u16(rest, 2), read_u16(rest, 6)),
                    last: cell_from_biff(read_u16(rest, 4), read_u16(rest, 8)),
                }));
                i += 1 + AREA3D_PAYLOAD_LEN;
            }

            // PtgMemFunc: [cce:u16][rgce:cce bytes]
            0x29 | 0x49 | 0x69 if rest.len() >= 2 && depth < MAX_MEM_FUNC_DEPTH => {
                let cce = read_u16(rest, 0) as usize;
                let Some(sub) = rest.get(2..2 + cce) else {
                    out.push(ExpressionToken::Unknown(rgce[i..].to_vec()));
                    break;
                };
                out.push(ExpressionToken::MemFunc(MemFunc {
                    ptg,
                    tokens: parse_tokens(sub, depth + 1),
                }));
                i += 3 + cce;
            }

            _ => match ptg_payload_len(ptg, rest) {
                Some(len) => {
                    out.push(ExpressionToken::Unknown(rgce[i..i + 1 + len].to_vec()));
                    i += 1 + len;
                }
                None => {
                    out.push(ExpressionToken::Unknown(rgce[i..].to_vec()));
                    break;
                }
            },
        }
    }
    out
}

/// Payload width of a BIFF8 ptg, or `None` when the code is unknown or the payload is
/// truncated.
fn ptg_payload_len(ptg: u8, rest: &[u8]) -> Option<usize> {
    let len = match ptg {
        // PtgExp / PtgTbl: [rw:u16][col:u16]
        0x01 | 0x02 => 4,

        // Range operators inside PtgMemFunc.
        PTG_UNION | PTG_PAREN => 0,
        // Remaining fixed-width/no-payload operators.
        0x03..=0x16 | 0x2F => 0,

        // PtgStr: [cch:u8][flags:u8][chars...]
        0x17 => {
            let cch = *rest.first()? as usize;
            let flags = *rest.get(1)?;
            2 + if flags & 0x01 != 0 { cch * 2 } else { cch }
        }

        // PtgExtend: [etpg:u8] + 12 bytes for PtgList, 4 otherwise.
        0x18 | 0x38 | 0x58 | 0x78 => {
            if *rest.first()? == 0x19 {
                13
            } else {
                5
            }
        }

        // PtgAttr: [grbit:u8][wAttr:u16] (+ optional jump table for tAttrChoose)
        0x19 => {
            let grbit = *rest.first()?;
            let w_attr = u16::from_le_bytes([*rest.get(1)?, *rest.get(2)?]) as usize;
            const T_ATTR_CHOOSE: u8 = 0x04;
            if grbit & T_ATTR_CHOOSE != 0 {
                3 + w_attr * 2
            } else {
                3
            }
        }

        // PtgErr / PtgBool
        0x1C | 0x1D => 1,
        // PtgInt
        0x1E => 2,
        // PtgNum
        0x1F => 8,
        // PtgArray
        0x20 | 0x40 | 0x60 => 7,
        // PtgFunc
        0x21 | 0x41 | 0x61 => 2,
        // PtgFuncVar
        0x22 | 0x42 | 0x62 => 3,
        // PtgName: [name_id:u32][reserved:u16]
        0x23 | 0x43 | 0x63 => 6,
        // PtgRef / PtgRefErr / PtgRefN
        0x24 | 0x44 | 0x64 | 0x2A | 0x4A | 0x6A | 0x2C | 0x4C | 0x6C => 4,
        // PtgArea / PtgAreaErr / PtgAreaN
        0x25 | 0x45 | 0x65 | 0x2B | 0x4B | 0x6B | 0x2D | 0x4D | 0x6D => 8,

        // PtgMem* tokens: [cce:u16][rgce:cce bytes]
        0x26 | 0x46 | 0x66 | 0x27 | 0x47 | 0x67 | 0x28 | 0x48 | 0x68 | 0x29 | 0x49 | 0x69
        | 0x2E | 0x4E | 0x6E => {
            2 + u16::from_le_bytes([*rest.first()?, *rest.get(1)?]) as usize
        }

        // PtgNameX: [ixti:u16][iname:u16][reserved:u16]
        0x39 | 0x59 | 0x79 => 6,
        // PtgRef3d / PtgRefErr3d / PtgRefN3d
        0x3A | 0x5A | 0x7A | 0x3C | 0x5C | 0x7C | 0x3E | 0x5E | 0x7E => 6,
        // PtgArea3d / PtgAreaErr3d / PtgAreaN3d
        0x3B | 0x5B | 0x7B | 0x3D | 0x5D | 0x7D | 0x3F | 0x5F | 0x7F => 10,

        _ => return None,
    };
    (rest.len() >= len).then_some(len)
}

/// Re-encode a token stream.
pub fn serialize(tokens: &[ExpressionToken]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(tokens));
    for token in tokens {
        token.encode_into(&mut out);
    }
    out
}

/// Encoded byte length (`cce`) of a token stream.
pub fn encoded_len(tokens: &[ExpressionToken]) -> usize {
    tokens.iter().map(ExpressionToken::encoded_len).sum()
}

/// Render a token stream as A1 text. Separate addressing pieces (union members) are joined
/// with `,`. Sheet prefixes are only emitted when a table is available.
pub fn render(tokens: &[ExpressionToken], sheets: Option<&dyn ExternSheetTable>) -> String {
    let mut pieces: Vec<String> = Vec::new();
    for token in tokens {
        let mut piece = String::new();
        token.render_into(&mut piece, sheets);
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    pieces.join(",")
}

/// Where the first addressing token of an expression lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddressSlot {
    TopLevel(usize),
    MemFuncMember { token: usize, member: usize },
}

impl AddressSlot {
    pub(crate) fn is_mem_func_member(self) -> bool {
        matches!(self, AddressSlot::MemFuncMember { .. })
    }
}

fn unwrap_paren(token: &ExpressionToken) -> &ExpressionToken {
    match token {
        ExpressionToken::Paren(inner) => unwrap_paren(inner),
        other => other,
    }
}

fn unwrap_paren_mut(token: &mut ExpressionToken) -> &mut ExpressionToken {
    match token {
        ExpressionToken::Paren(inner) => unwrap_paren_mut(inner),
        other => other,
    }
}

pub(crate) fn first_addressing_slot(tokens: &[ExpressionToken]) -> Option<AddressSlot> {
    for (idx, token) in tokens.iter().enumerate() {
        match unwrap_paren(token) {
            t if t.is_addressing() => return Some(AddressSlot::TopLevel(idx)),
            ExpressionToken::MemFunc(m) => {
                let member = m.tokens.iter().position(|t| unwrap_paren(t).is_addressing());
                if let Some(member) = member {
                    return Some(AddressSlot::MemFuncMember { token: idx, member });
                }
            }
            _ => {}
        }
    }
    None
}

/// The addressing token at `slot`, with any `Paren` wrapper removed.
pub(crate) fn slot_token(tokens: &[ExpressionToken], slot: AddressSlot) -> Option<&ExpressionToken> {
    match slot {
        AddressSlot::TopLevel(idx) => tokens.get(idx).map(unwrap_paren),
        AddressSlot::MemFuncMember { token, member } => match tokens.get(token).map(unwrap_paren) {
            Some(ExpressionToken::MemFunc(m)) => m.tokens.get(member).map(unwrap_paren),
            _ => None,
        },
    }
}

pub(crate) fn slot_token_mut(
    tokens: &mut [ExpressionToken],
    slot: AddressSlot,
) -> Option<&mut ExpressionToken> {
    match slot {
        AddressSlot::TopLevel(idx) => tokens.get_mut(idx).map(unwrap_paren_mut),
        AddressSlot::MemFuncMember { token, member } => {
            match tokens.get_mut(token).map(unwrap_paren_mut) {
                Some(ExpressionToken::MemFunc(m)) => m.tokens.get_mut(member).map(unwrap_paren_mut),
                _ => None,
            }
        }
    }
}

/// Visit every 3-D reference token, including union members.
pub(crate) fn for_each_addressing_mut(
    tokens: &mut [ExpressionToken],
    f: &mut dyn FnMut(&mut ExpressionToken),
) {
    for token in tokens {
        match unwrap_paren_mut(token) {
            ExpressionToken::MemFunc(m) => for_each_addressing_mut(&mut m.tokens, f),
            t if t.is_addressing() => f(t),
            _ => {}
        }
    }
}

pub(crate) fn addressing_ixtis(tokens: &[ExpressionToken]) -> Vec<u16> {
    let mut out = Vec::new();
    collect_ixtis(tokens, &mut out);
    out
}

fn collect_ixtis(tokens: &[ExpressionToken], out: &mut Vec<u16>) {
    for token in tokens {
        match unwrap_paren(token) {
            ExpressionToken::MemFunc(m) => collect_ixtis(&m.tokens, out),
            t => out.extend(t.ixti()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::externsheet::InMemoryExternSheet;

    fn area3d(ptg: u8, ixti: u16, rows: (u16, u16), cols: (u16, u16)) -> Vec<u8> {
        let mut out = vec![ptg];
        out.extend_from_slice(&ixti.to_le_bytes());
        out.extend_from_slice(&rows.0.to_le_bytes());
        out.extend_from_slice(&rows.1.to_le_bytes());
        out.extend_from_slice(&cols.0.to_le_bytes());
        out.extend_from_slice(&cols.1.to_le_bytes());
        out
    }

    fn sheets() -> InMemoryExternSheet {
        let mut table = InMemoryExternSheet::new(["Sheet1", "My Data"]);
        table.insert_location(0, 0);
        table.insert_location(1, 1);
        table
    }

    #[test]
    fn parses_absolute_area3d() {
        // Sheet1!$A$1:$A$12 with all relative bits cleared.
        let rgce = area3d(0x3B, 0, (0, 11), (0, 0));
        let tokens = parse(&rgce);
        assert_eq!(
            tokens,
            vec![ExpressionToken::AreaRef3d(AreaRef3d {
                ptg: 0x3B,
                ixti: 0,
                first: CellAddress::absolute(0, 0),
                last: CellAddress::absolute(11, 0),
            })]
        );
        let table = sheets();
        assert_eq!(render(&tokens, Some(&table)), "Sheet1!$A$1:$A$12");
        assert_eq!(render(&tokens, None), "$A$1:$A$12");
        assert_eq!(serialize(&tokens), rgce);
    }

    #[test]
    fn relative_bits_render_without_dollars() {
        let mut rgce = vec![0x3A];
        rgce.extend_from_slice(&1u16.to_le_bytes());
        rgce.extend_from_slice(&4u16.to_le_bytes());
        rgce.extend_from_slice(&(2u16 | ROW_RELATIVE_BIT | COL_RELATIVE_BIT).to_le_bytes());
        let tokens = parse(&rgce);
        let table = sheets();
        assert_eq!(render(&tokens, Some(&table)), "'My Data'!C5");
        assert_eq!(serialize(&tokens), rgce);
    }

    #[test]
    fn mem_func_union_renders_members_and_roundtrips() {
        let mut sub = area3d(0x3B, 0, (0, 2), (0, 0));
        sub.extend(area3d(0x3B, 0, (0, 2), (2, 2)));
        sub.push(PTG_UNION);

        let mut rgce = vec![0x29];
        rgce.extend_from_slice(&(sub.len() as u16).to_le_bytes());
        rgce.extend_from_slice(&sub);

        let tokens = parse(&rgce);
        assert!(matches!(&tokens[..], [ExpressionToken::MemFunc(m)] if m.tokens.len() == 3));
        let table = sheets();
        assert_eq!(
            render(&tokens, Some(&table)),
            "Sheet1!$A$1:$A$3,Sheet1!$C$1:$C$3"
        );
        assert_eq!(serialize(&tokens), rgce);
        assert_eq!(
            first_addressing_slot(&tokens),
            Some(AddressSlot::MemFuncMember { token: 0, member: 0 })
        );
    }

    #[test]
    fn paren_wraps_preceding_token() {
        let mut rgce = area3d(0x3B, 0, (0, 0), (0, 1));
        rgce.push(PTG_PAREN);
        let tokens = parse(&rgce);
        assert!(matches!(&tokens[..], [ExpressionToken::Paren(inner)] if inner.is_addressing()));
        let table = sheets();
        assert_eq!(render(&tokens, Some(&table)), "Sheet1!$A$1:$B$1");
        assert_eq!(serialize(&tokens), rgce);
        assert_eq!(first_addressing_slot(&tokens), Some(AddressSlot::TopLevel(0)));
    }

    #[test]
    fn unknown_ptg_swallows_the_rest() {
        let rgce = [0x1E, 0x05, 0x00, 0xFE, 0x01, 0x02];
        let tokens = parse(&rgce);
        assert_eq!(
            tokens,
            vec![
                ExpressionToken::Unknown(vec![0x1E, 0x05, 0x00]),
                ExpressionToken::Unknown(vec![0xFE, 0x01, 0x02]),
            ]
        );
        assert_eq!(serialize(&tokens), rgce);
    }

    #[test]
    fn truncated_reference_is_kept_opaque() {
        let rgce = [0x3B, 0x00, 0x00, 0x01];
        let tokens = parse(&rgce);
        assert_eq!(tokens, vec![ExpressionToken::Unknown(rgce.to_vec())]);
        assert_eq!(first_addressing_slot(&tokens), None);
    }

    #[test]
    fn ref_error_tokens_render_as_ref_error() {
        let mut rgce = vec![0x3C];
        rgce.extend_from_slice(&[0; 6]);
        let tokens = parse(&rgce);
        assert_eq!(render(&tokens, None), "#REF!");
    }

    #[test]
    fn fresh_tokens_use_full_3d_width_and_keep_class() {
        let cell = Location::parse("B2").unwrap();
        let token = ExpressionToken::from_location(&cell, 3, Some(0x5B));
        assert_eq!(token.encoded_len(), 7);
        assert_eq!(token.ptg(), Some(0x5A));

        let area = Location::parse("$B$2:$B$20").unwrap();
        let token = ExpressionToken::from_location(&area, 3, None);
        assert_eq!(token.encoded_len(), 11);
        assert_eq!(token.ptg(), Some(0x3B));
        assert_eq!(parse(&serialize(std::slice::from_ref(&token))), vec![token]);
    }

    #[test]
    fn unresolvable_sheet_renders_ref_error_prefix() {
        let rgce = area3d(0x3B, 9, (0, 0), (0, 0));
        let table = sheets();
        assert_eq!(render(&parse(&rgce), Some(&table)), "#REF!$A$1:$A$1");
    }
}
