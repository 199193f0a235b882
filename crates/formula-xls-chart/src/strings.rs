use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};

use encoding_rs::{
    Encoding, BIG5, EUC_KR, GBK, SHIFT_JIS, UTF_8, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252,
    WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256, WINDOWS_1257, WINDOWS_1258,
    WINDOWS_874,
};

/// Set in the string option flags when characters are stored as UTF-16LE.
const STR_FLAG_HIGH_BYTE: u8 = 0x01;

/// `cch` is a single byte in `SERIESTEXT`.
pub const MAX_SERIES_TEXT_CHARS: usize = u8::MAX as usize;

pub(crate) fn encoding_for_codepage(codepage: u16) -> Option<&'static Encoding> {
    Some(match codepage as u32 {
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1252 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        65001 => UTF_8,
        _ => return None,
    })
}

/// Decode 8-bit ("compressed") string bytes using the workbook codepage.
pub(crate) fn decode_ansi(codepage: u16, bytes: &[u8]) -> String {
    if let Some(encoding) = encoding_for_codepage(codepage) {
        let (cow, _, _) = encoding.decode(bytes);
        return cow.into_owned();
    }

    warn_unsupported_codepage(codepage);

    // Lossless byte-to-Unicode mapping keeps ASCII intact for unknown codepages.
    bytes.iter().copied().map(char::from).collect()
}

fn warn_unsupported_codepage(codepage: u16) {
    static WARNED: OnceLock<Mutex<BTreeSet<u16>>> = OnceLock::new();

    let warned = WARNED.get_or_init(|| Mutex::new(BTreeSet::new()));
    let mut warned = match warned.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if warned.insert(codepage) {
        log::warn!(
            "unsupported BIFF CODEPAGE {codepage}; decoding chart text using lossless byte-to-Unicode mapping"
        );
    }
}

/// `SERIESTEXT` (0x100D): literal text for the preceding `AI` record.
///
/// Layout: `[id:u16 = 0][cch:u8][flags:u8][chars]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesText {
    text: String,
    /// Original payload; cleared when the text changes.
    raw: Option<Vec<u8>>,
}

impl SeriesText {
    pub fn new(text: &str) -> Self {
        let mut out = Self {
            text: String::new(),
            raw: None,
        };
        out.set_text(text);
        out
    }

    pub fn parse(data: &[u8], codepage: u16) -> Result<Self, String> {
        if data.len() < 4 {
            return Err(format!(
                "SERIESTEXT payload is {} bytes; expected at least 4",
                data.len()
            ));
        }
        let cch = data[2] as usize;
        let flags = data[3];
        let chars = &data[4..];

        let text = if flags & STR_FLAG_HIGH_BYTE != 0 {
            let Some(bytes) = chars.get(..cch * 2) else {
                return Err(format!(
                    "SERIESTEXT declares {cch} UTF-16 characters but has {} bytes",
                    chars.len()
                ));
            };
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            let Some(bytes) = chars.get(..cch) else {
                return Err(format!(
                    "SERIESTEXT declares {cch} characters but has {} bytes",
                    chars.len()
                ));
            };
            decode_ansi(codepage, bytes)
        };

        Ok(Self {
            text,
            raw: Some(data.to_vec()),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text. Longer strings are cut to the 255 UTF-16 units `cch` can describe.
    pub fn set_text(&mut self, text: &str) {
        let mut units = 0usize;
        let mut kept = String::new();
        for ch in text.chars() {
            units += ch.len_utf16();
            if units > MAX_SERIES_TEXT_CHARS {
                log::warn!(
                    "SERIESTEXT truncated to {MAX_SERIES_TEXT_CHARS} characters (was {} chars)",
                    text.chars().count()
                );
                break;
            }
            kept.push(ch);
        }
        self.text = kept;
        self.raw = None;
    }

    /// Payload bytes. Unchanged text re-encodes to the original bytes; new text is written as
    /// UTF-16.
    pub fn to_bytes(&self) -> Vec<u8> {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let units: Vec<u16> = self.text.encode_utf16().collect();
        let mut out = Vec::with_capacity(4 + units.len() * 2);
        out.extend_from_slice(&0u16.to_le_bytes());
        out.push(units.len() as u8);
        out.push(STR_FLAG_HIGH_BYTE);
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }
}
