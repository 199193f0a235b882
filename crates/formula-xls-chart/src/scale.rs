//! Value-axis scaling: the `VALUERANGE` record and automatic min/max/major/minor computation.
//!
//! The host application does not document its automatic scaling. [`compute`] follows the
//! published rules for automatic axis bounds and approximates the major unit from the data
//! extent; layout-dependent adjustments (plot height, font size) are not modeled.

use crate::chart_type::ChartKind;

pub const VALUE_RANGE_LEN: usize = 42;

pub const VALUE_RANGE_AUTO_MIN: u16 = 0x0001;
pub const VALUE_RANGE_AUTO_MAX: u16 = 0x0002;
pub const VALUE_RANGE_AUTO_MAJOR: u16 = 0x0004;
pub const VALUE_RANGE_AUTO_MINOR: u16 = 0x0008;
pub const VALUE_RANGE_AUTO_CROSS: u16 = 0x0010;
pub const VALUE_RANGE_LOG_SCALE: u16 = 0x0020;
pub const VALUE_RANGE_REVERSED: u16 = 0x0040;
pub const VALUE_RANGE_MAX_CROSS: u16 = 0x0080;

const AUTO_FLAGS: u16 = VALUE_RANGE_AUTO_MIN
    | VALUE_RANGE_AUTO_MAX
    | VALUE_RANGE_AUTO_MAJOR
    | VALUE_RANGE_AUTO_MINOR
    | VALUE_RANGE_AUTO_CROSS;

/// Headroom factor applied to the data maximum before picking a major unit.
const MAX_HEADROOM: f64 = 1.1;
/// Fraction of the range added above the maximum for padded chart kinds.
const PAD_FRACTION: f64 = 0.05;
/// The minimum drops to zero when the data spread exceeds this share of the axis maximum.
const ZERO_BASELINE_SPREAD: f64 = 0.16667;
const MAX_MAJOR_STEPS: f64 = 9.0;
const MINOR_DIVISIONS: f64 = 5.0;

/// Resolved axis bounds and tick units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisScale {
    pub min: f64,
    pub max: f64,
    pub major: f64,
    pub minor: f64,
}

impl AxisScale {
    fn unit() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            major: 1.0,
            minor: 1.0 / MINOR_DIVISIONS,
        }
    }
}

/// `VALUERANGE` (0x101F): scaling of a value axis.
///
/// When an `AUTO_*` flag is set the matching stored field is whatever the writer last computed
/// and must be recomputed before display; see [`ValueRange::resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
    pub major: f64,
    pub minor: f64,
    pub cross: f64,
    pub flags: u16,
}

impl Default for ValueRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            major: 0.0,
            minor: 0.0,
            cross: 0.0,
            flags: AUTO_FLAGS,
        }
    }
}

impl ValueRange {
    pub fn parse(data: &[u8]) -> Result<Self, String> {
        if data.len() < VALUE_RANGE_LEN {
            return Err(format!(
                "VALUERANGE payload is {} bytes; expected {VALUE_RANGE_LEN}",
                data.len()
            ));
        }
        let f64_at = |offset: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&data[offset..offset + 8]);
            f64::from_le_bytes(bytes)
        };
        Ok(Self {
            min: f64_at(0),
            max: f64_at(8),
            major: f64_at(16),
            minor: f64_at(24),
            cross: f64_at(32),
            flags: u16::from_le_bytes([data[40], data[41]]),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(VALUE_RANGE_LEN);
        for value in [self.min, self.max, self.major, self.minor, self.cross] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&self.flags.to_le_bytes());
        out
    }

    fn flag(&self, mask: u16) -> bool {
        self.flags & mask != 0
    }

    pub fn auto_min(&self) -> bool {
        self.flag(VALUE_RANGE_AUTO_MIN)
    }

    pub fn auto_max(&self) -> bool {
        self.flag(VALUE_RANGE_AUTO_MAX)
    }

    pub fn auto_major(&self) -> bool {
        self.flag(VALUE_RANGE_AUTO_MAJOR)
    }

    pub fn auto_minor(&self) -> bool {
        self.flag(VALUE_RANGE_AUTO_MINOR)
    }

    pub fn auto_cross(&self) -> bool {
        self.flag(VALUE_RANGE_AUTO_CROSS)
    }

    pub fn is_log_scale(&self) -> bool {
        self.flag(VALUE_RANGE_LOG_SCALE)
    }

    pub fn is_reversed(&self) -> bool {
        self.flag(VALUE_RANGE_REVERSED)
    }

    pub fn crosses_at_max(&self) -> bool {
        self.flag(VALUE_RANGE_MAX_CROSS)
    }

    pub fn set_flag(&mut self, mask: u16, on: bool) {
        if on {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }

    /// Whether any stored bound or unit is automatic and therefore not authoritative.
    pub fn is_stale(&self) -> bool {
        self.flags & AUTO_FLAGS != 0
    }

    /// Effective scale for data spanning `data_min..=data_max`: stored values for fixed
    /// fields, computed values for automatic ones.
    pub fn resolve(&self, data_min: f64, data_max: f64, kind: ChartKind) -> AxisScale {
        let fixed = Fixed {
            min: (!self.auto_min()).then_some(self.min),
            max: (!self.auto_max()).then_some(self.max),
            major: (!self.auto_major()).then_some(self.major).filter(|m| *m > 0.0),
            minor: (!self.auto_minor()).then_some(self.minor).filter(|m| *m > 0.0),
        };
        scale(data_min, data_max, kind, fixed)
    }
}

/// Automatic scale for data spanning `data_min..=data_max` on a chart of `kind`.
pub fn compute(data_min: f64, data_max: f64, kind: ChartKind) -> AxisScale {
    scale(data_min, data_max, kind, Fixed::default())
}

/// Fields the caller pinned; `None` means automatic.
#[derive(Debug, Clone, Copy, Default)]
struct Fixed {
    min: Option<f64>,
    max: Option<f64>,
    major: Option<f64>,
    minor: Option<f64>,
}

impl Fixed {
    fn mirrored(self) -> Self {
        Self {
            min: self.max.map(|v| -v),
            max: self.min.map(|v| -v),
            major: self.major,
            minor: self.minor,
        }
    }
}

fn scale(data_min: f64, data_max: f64, kind: ChartKind, fixed: Fixed) -> AxisScale {
    if !data_min.is_finite() || !data_max.is_finite() {
        return AxisScale::unit();
    }
    let (lo, hi) = if data_min <= data_max {
        (data_min, data_max)
    } else {
        (data_max, data_min)
    };

    if lo == hi {
        let major = fixed.major.unwrap_or(1.0);
        return AxisScale {
            min: fixed.min.unwrap_or(lo),
            max: fixed.max.unwrap_or(hi),
            major,
            minor: fixed.minor.unwrap_or(major / MINOR_DIVISIONS),
        };
    }

    if lo >= 0.0 {
        return positive_scale(lo, hi, kind, fixed);
    }
    if hi <= 0.0 {
        // All-negative data scales as the mirror image of the positive case.
        let mirrored = positive_scale(-hi, -lo, kind, fixed.mirrored());
        return AxisScale {
            min: -mirrored.max,
            max: -mirrored.min,
            major: mirrored.major,
            minor: mirrored.minor,
        };
    }
    mixed_scale(lo, hi, fixed)
}

fn positive_scale(lo: f64, hi: f64, kind: ChartKind, fixed: Fixed) -> AxisScale {
    let diff = hi * MAX_HEADROOM - lo;
    let mut major = match (fixed.major, fixed.max) {
        (Some(major), _) => major,
        (None, None) => nice(diff) / 10.0,
        (None, Some(max)) if max > 0.0 => max / 10.0,
        (None, Some(_)) => nice(diff) / 10.0,
    };

    let max = fixed.max.unwrap_or_else(|| {
        if kind.pads_maximum() {
            let mut padded = hi + PAD_FRACTION * diff * MAX_HEADROOM;
            if major.fract() == 0.0 {
                padded = padded.ceil();
            }
            if kind == ChartKind::Bubble {
                padded += major;
            }
            if padded % major != 0.0 {
                padded = ((padded + major) / major).floor() * major;
            }
            padded
        } else {
            ((hi + major) / major).floor() * major
        }
    });

    let min = fixed.min.unwrap_or_else(|| {
        if kind.has_value_x_axis() {
            (lo / major).floor() * major
        } else if hi - lo > max * ZERO_BASELINE_SPREAD {
            0.0
        } else {
            let v = lo - (max - lo) / 2.0;
            if v % major == 0.0 {
                v
            } else {
                (v / major).floor() * major
            }
        }
    });

    if fixed.major.is_none()
        && fixed.max.is_none()
        && min >= 0.0
        && (max - min) / major > MAX_MAJOR_STEPS
    {
        major = nice(max * MAX_HEADROOM - min) / 10.0;
    }

    AxisScale {
        min,
        max,
        major,
        minor: fixed.minor.unwrap_or(major / MINOR_DIVISIONS),
    }
}

fn mixed_scale(lo: f64, hi: f64, fixed: Fixed) -> AxisScale {
    let padded_max = hi + PAD_FRACTION * (hi - lo);
    let padded_min = lo + PAD_FRACTION * (lo - hi);
    let major = fixed
        .major
        .unwrap_or_else(|| nice(padded_max - padded_min) / 10.0);
    AxisScale {
        min: fixed
            .min
            .unwrap_or_else(|| (padded_min / major).floor() * major),
        max: fixed
            .max
            .unwrap_or_else(|| (padded_max / major).ceil() * major),
        major,
        minor: fixed.minor.unwrap_or(major / MINOR_DIVISIONS),
    }
}

/// Round `value` up to 1, 2, 5 or 10 times a power of ten.
fn nice(value: f64) -> f64 {
    if value <= 0.0 || !value.is_finite() {
        return 1.0;
    }
    let exponent = value.log10().floor();
    let magnitude = 10f64.powf(exponent);
    let mantissa = value / magnitude;
    let step = if mantissa <= 1.0 {
        1.0
    } else if mantissa <= 2.0 {
        2.0
    } else if mantissa <= 5.0 {
        5.0
    } else {
        10.0
    };
    step * magnitude
}
