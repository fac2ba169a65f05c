//! Strategy parameters and quantized optimization ranges.
//!
//! A parameter is either integer- or real-valued; the optimizer derives the
//! type from the range's step: an integral step means every sampled value
//! for that parameter is an integer.

use std::collections::HashMap;

/// A numeric parameter value with its derived type preserved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Real(f64),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            ParamValue::Int(v) => *v as f64,
            ParamValue::Real(v) => *v,
        }
    }

    /// Parse with integer preference: "14" and "14.0" become Int(14),
    /// "14.5" becomes Real(14.5).
    pub fn parse(text: &str) -> Option<ParamValue> {
        let v: f64 = text.trim().parse().ok()?;
        Some(ParamValue::coerce(v))
    }

    /// Prefer Int when the value is integral.
    pub fn coerce(v: f64) -> ParamValue {
        if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            ParamValue::Int(v as i64)
        } else {
            ParamValue::Real(v)
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Real(v) => write!(f, "{v}"),
        }
    }
}

/// Name → value map. Read-only to the engines; the optimizer owns trial
/// assignments layered on top of the static map.
pub type ParamMap = HashMap<String, ParamValue>;

/// A (low, high, step) triple defining the discrete grid a parameter is
/// sampled from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub low: f64,
    pub high: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn new(low: f64, high: f64, step: f64) -> Self {
        ParamRange { low, high, step }
    }

    /// A range is usable when it describes a non-empty grid.
    pub fn is_usable(&self) -> bool {
        self.step > 0.0 && self.high >= self.low && self.low.is_finite() && self.high.is_finite()
    }

    /// Integral step means the parameter is integer-typed for the whole run.
    pub fn is_integer(&self) -> bool {
        self.step.fract() == 0.0
    }

    /// Number of grid points.
    pub fn grid_len(&self) -> usize {
        if !self.is_usable() {
            return 0;
        }
        ((self.high - self.low) / self.step).floor() as usize + 1
    }

    /// Snap an arbitrary value onto the grid, clamped to [low, high], typed
    /// per the step.
    pub fn quantize(&self, v: f64) -> ParamValue {
        let steps = ((v - self.low) / self.step).round();
        let snapped = (self.low + steps * self.step).clamp(self.low, self.high);
        self.type_value(snapped)
    }

    /// The grid point at `index` (clamped to the last point).
    pub fn grid_point(&self, index: usize) -> ParamValue {
        let index = index.min(self.grid_len().saturating_sub(1));
        let v = (self.low + index as f64 * self.step).min(self.high);
        self.type_value(v)
    }

    fn type_value(&self, v: f64) -> ParamValue {
        if self.is_integer() {
            ParamValue::Int(v.round() as i64)
        } else {
            ParamValue::Real(v)
        }
    }
}
