//! Chart-type records (BAR, LINE, PIE, ...) and the chart-kind codes they resolve to.

use crate::records::{
    RECORD_AREA, RECORD_BAR, RECORD_BOPPOP, RECORD_LINE, RECORD_PIE, RECORD_RADAR,
    RECORD_RADARAREA, RECORD_SCATTER, RECORD_SURFACE,
};

/// Chart kind of a chart-type group.
///
/// The numeric codes are the host application's chart-type constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Column,
    Bar,
    Line,
    Pie,
    Area,
    Scatter,
    Radar,
    Surface,
    Doughnut,
    Bubble,
    OfPie,
    RadarArea,
    Stock,
}

impl ChartKind {
    pub fn code(self) -> u8 {
        match self {
            ChartKind::Column => 0,
            ChartKind::Bar => 1,
            ChartKind::Line => 2,
            ChartKind::Pie => 3,
            ChartKind::Area => 4,
            ChartKind::Scatter => 5,
            ChartKind::Radar => 6,
            ChartKind::Surface => 7,
            ChartKind::Doughnut => 8,
            ChartKind::Bubble => 9,
            ChartKind::OfPie => 10,
            ChartKind::RadarArea => 17,
            ChartKind::Stock => 18,
        }
    }

    /// Whether auto-scaling pads the axis maximum above the largest value.
    pub(crate) fn pads_maximum(self) -> bool {
        matches!(
            self,
            ChartKind::Area
                | ChartKind::Column
                | ChartKind::Bar
                | ChartKind::Line
                | ChartKind::Scatter
                | ChartKind::Bubble
        )
    }

    /// Scatter-style charts place the axis minimum at the data minimum instead of at zero.
    pub(crate) fn has_value_x_axis(self) -> bool {
        matches!(self, ChartKind::Scatter | ChartKind::Bubble)
    }
}

pub fn is_chart_type_record(record_id: u16) -> bool {
    matches!(
        record_id,
        RECORD_BAR
            | RECORD_LINE
            | RECORD_PIE
            | RECORD_AREA
            | RECORD_SCATTER
            | RECORD_RADAR
            | RECORD_SURFACE
            | RECORD_RADARAREA
            | RECORD_BOPPOP
    )
}

/// A decoded chart-type record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartTypeRecord {
    pub record_id: u16,
    pub kind: ChartKind,
    pub stacked: bool,
    pub percent: bool,
}

impl ChartTypeRecord {
    pub fn parse(record_id: u16, data: &[u8]) -> Result<Self, String> {
        let u16_at = |offset: usize| -> Result<u16, String> {
            data.get(offset..offset + 2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .ok_or_else(|| {
                    format!(
                        "chart type record 0x{record_id:04X} is {} bytes; field at offset {offset} is missing",
                        data.len()
                    )
                })
        };

        let (kind, stacked, percent) = match record_id {
            // BAR: [pcOverlap:i16][pcGap:u16][grbit:u16]
            RECORD_BAR => {
                let grbit = u16_at(4)?;
                let kind = if grbit & 0x1 != 0 {
                    ChartKind::Bar
                } else {
                    ChartKind::Column
                };
                (kind, grbit & 0x2 != 0, grbit & 0x4 != 0)
            }
            // LINE / AREA: [grbit:u16]
            RECORD_LINE | RECORD_AREA => {
                let grbit = u16_at(0)?;
                let kind = if record_id == RECORD_LINE {
                    ChartKind::Line
                } else {
                    ChartKind::Area
                };
                (kind, grbit & 0x1 != 0, grbit & 0x2 != 0)
            }
            // PIE: [anStart:u16][pcDonut:u16][grbit:u16]
            RECORD_PIE => {
                let kind = if u16_at(2)? != 0 {
                    ChartKind::Doughnut
                } else {
                    ChartKind::Pie
                };
                (kind, false, false)
            }
            // SCATTER: [pcBubbleSizeRatio:u16][wBubbleSize:u16][grbit:u16]
            RECORD_SCATTER => {
                let kind = if u16_at(4)? & 0x1 != 0 {
                    ChartKind::Bubble
                } else {
                    ChartKind::Scatter
                };
                (kind, false, false)
            }
            RECORD_RADAR => (ChartKind::Radar, false, false),
            RECORD_RADARAREA => (ChartKind::RadarArea, false, false),
            RECORD_SURFACE => (ChartKind::Surface, false, false),
            RECORD_BOPPOP => (ChartKind::OfPie, false, false),
            other => return Err(format!("record 0x{other:04X} is not a chart type record")),
        };

        Ok(Self {
            record_id,
            kind,
            stacked,
            percent,
        })
    }
}
