//! BIFF8 record framing for chart substreams.
//!
//! Every record is `[record_id: u16][len: u16][payload: len bytes]`, little-endian. This module
//! reads and writes that framing only; payload semantics live in the modules that own each
//! record type.

use std::io::{self, Write};

use crate::error::{EncodeError, TruncatedInput};

/// Size of a physical record header.
pub const RECORD_HEADER_LEN: usize = 4;
/// Largest payload the 16-bit length field can describe.
pub const MAX_RECORD_PAYLOAD: usize = u16::MAX as usize;

/// BIFF `CONTINUE` record id.
pub const RECORD_CONTINUE: u16 = 0x003C;
/// Workbook-global `EXTERNSHEET` record id.
pub const RECORD_EXTERNSHEET: u16 = 0x0017;

pub const RECORD_UNITS: u16 = 0x1001;
/// Chart root (position and size of the chart area).
pub const RECORD_CHART: u16 = 0x1002;
pub const RECORD_SERIES: u16 = 0x1003;
pub const RECORD_DATAFORMAT: u16 = 0x1006;
pub const RECORD_LINEFORMAT: u16 = 0x1007;
pub const RECORD_AREAFORMAT: u16 = 0x100A;
pub const RECORD_PIEFORMAT: u16 = 0x100B;
pub const RECORD_ATTACHEDLABEL: u16 = 0x100C;
/// Literal text attached to the preceding `AI` record.
pub const RECORD_SERIESTEXT: u16 = 0x100D;
/// One chart-type group (`CHARTFORMAT`); each one starts a new overlay group.
pub const RECORD_CHARTFORMAT: u16 = 0x1014;
pub const RECORD_LEGEND: u16 = 0x1015;
/// Series indices that belong to the enclosing chart-type group.
pub const RECORD_SERIESLIST: u16 = 0x1016;
pub const RECORD_BAR: u16 = 0x1017;
pub const RECORD_LINE: u16 = 0x1018;
pub const RECORD_PIE: u16 = 0x1019;
pub const RECORD_AREA: u16 = 0x101A;
pub const RECORD_SCATTER: u16 = 0x101B;
pub const RECORD_CHARTLINE: u16 = 0x101C;
pub const RECORD_AXIS: u16 = 0x101D;
pub const RECORD_TICK: u16 = 0x101E;
/// Value axis scale.
pub const RECORD_VALUERANGE: u16 = 0x101F;
pub const RECORD_CATSERRANGE: u16 = 0x1020;
pub const RECORD_AXISLINEFORMAT: u16 = 0x1021;
pub const RECORD_CHARTFORMATLINK: u16 = 0x1022;
pub const RECORD_DEFAULTTEXT: u16 = 0x1024;
pub const RECORD_TEXT: u16 = 0x1025;
pub const RECORD_FONTX: u16 = 0x1026;
pub const RECORD_OBJECTLINK: u16 = 0x1027;
pub const RECORD_FRAME: u16 = 0x1032;
pub const RECORD_BEGIN: u16 = 0x1033;
pub const RECORD_END: u16 = 0x1034;
pub const RECORD_PLOTAREA: u16 = 0x1035;
pub const RECORD_CHART3D: u16 = 0x103A;
pub const RECORD_DROPBAR: u16 = 0x103D;
pub const RECORD_RADAR: u16 = 0x103E;
pub const RECORD_SURFACE: u16 = 0x103F;
pub const RECORD_RADARAREA: u16 = 0x1040;
pub const RECORD_AXISPARENT: u16 = 0x1041;
pub const RECORD_SHTPROPS: u16 = 0x1044;
/// Binds a series to a chart-type group by its `CHARTFORMAT` ordinal.
pub const RECORD_SERTOCRT: u16 = 0x1045;
pub const RECORD_AXESUSED: u16 = 0x1046;
pub const RECORD_POS: u16 = 0x104F;
/// Linked range (`AI`).
pub const RECORD_AI: u16 = 0x1051;
pub const RECORD_SERFMT: u16 = 0x105D;
pub const RECORD_BOPPOP: u16 = 0x1061;

pub fn is_bracket_record(record_id: u16) -> bool {
    record_id == RECORD_BEGIN || record_id == RECORD_END
}

/// An owned record: the unit the hierarchy builder stores and the serializer emits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggedRecord {
    pub record_id: u16,
    pub data: Vec<u8>,
}

impl TaggedRecord {
    pub fn new(record_id: u16, data: Vec<u8>) -> Self {
        Self { record_id, data }
    }

    pub fn begin() -> Self {
        Self::new(RECORD_BEGIN, Vec::new())
    }

    pub fn end() -> Self {
        Self::new(RECORD_END, Vec::new())
    }

    pub fn is_begin(&self) -> bool {
        self.record_id == RECORD_BEGIN
    }

    pub fn is_end(&self) -> bool {
        self.record_id == RECORD_END
    }

    /// Header plus payload.
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_LEN.saturating_add(self.data.len())
    }
}

/// A record borrowed from its parent stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiffRecord<'a> {
    /// Offset of the record header in the parent stream.
    pub offset: usize,
    pub record_id: u16,
    pub data: &'a [u8],
}

impl<'a> BiffRecord<'a> {
    /// Offset one past the last payload byte.
    pub fn end_offset(&self) -> usize {
        self.offset
            .saturating_add(RECORD_HEADER_LEN)
            .saturating_add(self.data.len())
    }

    pub fn to_tagged(&self) -> TaggedRecord {
        TaggedRecord::new(self.record_id, self.data.to_vec())
    }
}

/// Read one record at `offset` without advancing anything.
pub fn read_record(stream: &[u8], offset: usize) -> Result<BiffRecord<'_>, TruncatedInput> {
    let remaining = stream.len().saturating_sub(offset);
    let header_end = offset.checked_add(RECORD_HEADER_LEN).ok_or(TruncatedInput {
        offset,
        needed: RECORD_HEADER_LEN,
        remaining,
    })?;
    let Some(header) = stream.get(offset..header_end) else {
        return Err(TruncatedInput {
            offset,
            needed: RECORD_HEADER_LEN,
            remaining,
        });
    };
    let record_id = u16::from_le_bytes([header[0], header[1]]);
    let len = u16::from_le_bytes([header[2], header[3]]) as usize;

    let needed = RECORD_HEADER_LEN + len;
    let data = header_end
        .checked_add(len)
        .and_then(|data_end| stream.get(header_end..data_end))
        .ok_or(TruncatedInput {
            offset,
            needed,
            remaining,
        })?;

    Ok(BiffRecord {
        offset,
        record_id,
        data,
    })
}

/// Decode the record at `*cursor` and advance the cursor past it.
///
/// On failure the cursor is left where it was.
pub fn decode(stream: &[u8], cursor: &mut usize) -> Result<TaggedRecord, TruncatedInput> {
    let record = read_record(stream, *cursor)?;
    *cursor = record.end_offset();
    Ok(record.to_tagged())
}

/// Write `record` (header + payload) to `sink`.
pub fn encode<W: Write>(record: &TaggedRecord, sink: &mut W) -> Result<(), EncodeError> {
    RecordWriter::new(sink).write_record(record.record_id, &record.data)
}

/// Encode a full record sequence into one contiguous buffer.
pub fn encode_all(records: &[TaggedRecord]) -> Result<Vec<u8>, EncodeError> {
    let total = records.iter().map(TaggedRecord::encoded_len).sum();
    let mut writer = RecordWriter::new(Vec::with_capacity(total));
    for record in records {
        writer.write_record(record.record_id, &record.data)?;
    }
    Ok(writer.into_inner())
}

/// Iterator over physical BIFF records.
///
/// This performs bounds checking on the record header and length. A truncated header or payload
/// yields an `Err` and terminates iteration.
pub struct BiffRecordIter<'a> {
    stream: &'a [u8],
    offset: usize,
    finished: bool,
}

impl<'a> BiffRecordIter<'a> {
    pub fn new(stream: &'a [u8]) -> Self {
        Self {
            stream,
            offset: 0,
            finished: false,
        }
    }

    /// Offset of the next record header.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for BiffRecordIter<'a> {
    type Item = Result<BiffRecord<'a>, TruncatedInput>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.offset >= self.stream.len() {
            return None;
        }

        match read_record(self.stream, self.offset) {
            Ok(record) => {
                self.offset = record.end_offset();
                Some(Ok(record))
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Streaming BIFF8 record writer.
pub struct RecordWriter<W: Write> {
    inner: W,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_record(&mut self, record_id: u16, payload: &[u8]) -> Result<(), EncodeError> {
        self.write_record_header(record_id, payload.len())?;
        self.inner.write_all(payload)?;
        Ok(())
    }

    pub fn write_record_header(&mut self, record_id: u16, len: usize) -> Result<(), EncodeError> {
        let len = u16::try_from(len).map_err(|_| EncodeError::PayloadTooLarge { record_id, len })?;
        self.inner.write_all(&record_id.to_le_bytes())?;
        self.inner.write_all(&len.to_le_bytes())?;
        Ok(())
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
