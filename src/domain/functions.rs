//! Indicator-function registry and builtin series functions.
//!
//! The indicator engine resolves external functions by name through a
//! [`FunctionRegistry`]: each function takes ordered input series plus
//! resolved numeric parameters and returns one or more series of the same
//! length. Warmup bars are NaN (null) rather than a validity flag, so the
//! outputs drop straight into the market table.

use crate::domain::params::ParamValue;
use std::collections::HashMap;

/// Why a function invocation produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FunctionError {
    #[error("expected {expected} input series, got {got}")]
    InputArity { expected: usize, got: usize },
    #[error("expected {expected} parameters, got {got}")]
    ParamArity { expected: usize, got: usize },
    #[error("invalid parameter: {0}")]
    InvalidParam(String),
}

pub type IndicatorFn =
    Box<dyn Fn(&[&[f64]], &[ParamValue]) -> Result<Vec<Vec<f64>>, FunctionError> + Send + Sync>;

/// Name → series function. The core tolerates unknown names by skipping
/// the indicator; callers may register their own functions on top of the
/// builtins.
pub struct FunctionRegistry {
    functions: HashMap<String, IndicatorFn>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        FunctionRegistry {
            functions: HashMap::new(),
        }
    }

    /// Registry with the builtin moving-average and momentum functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("SMA", |inputs, params| {
            let (series, period) = one_series_one_period(inputs, params)?;
            Ok(vec![sma(series, period)])
        });
        registry.register("EMA", |inputs, params| {
            let (series, period) = one_series_one_period(inputs, params)?;
            Ok(vec![ema(series, period)])
        });
        registry.register("WMA", |inputs, params| {
            let (series, period) = one_series_one_period(inputs, params)?;
            Ok(vec![wma(series, period)])
        });
        registry.register("RSI", |inputs, params| {
            let (series, period) = one_series_one_period(inputs, params)?;
            Ok(vec![rsi(series, period)])
        });
        registry.register("ROC", |inputs, params| {
            let (series, period) = one_series_one_period(inputs, params)?;
            Ok(vec![roc(series, period)])
        });
        registry.register("STDDEV", |inputs, params| {
            let (series, period) = one_series_one_period(inputs, params)?;
            Ok(vec![stddev(series, period)])
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[&[f64]], &[ParamValue]) -> Result<Vec<Vec<f64>>, FunctionError>
            + Send
            + Sync
            + 'static,
    {
        self.functions.insert(name.to_string(), Box::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

fn one_series_one_period<'a>(
    inputs: &[&'a [f64]],
    params: &[ParamValue],
) -> Result<(&'a [f64], usize), FunctionError> {
    if inputs.len() != 1 {
        return Err(FunctionError::InputArity {
            expected: 1,
            got: inputs.len(),
        });
    }
    if params.len() != 1 {
        return Err(FunctionError::ParamArity {
            expected: 1,
            got: params.len(),
        });
    }
    let period = match params[0] {
        ParamValue::Int(v) if v > 0 => v as usize,
        ParamValue::Real(v) if v >= 1.0 => v as usize,
        other => {
            return Err(FunctionError::InvalidParam(format!(
                "period must be a positive integer, got {:?}",
                other
            )));
        }
    };
    Ok((inputs[0], period))
}

/// Simple moving average; first (n-1) values are NaN.
pub fn sma(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }
    let mut sum: f64 = series[..period].iter().sum();
    out[period - 1] = sum / period as f64;
    for i in period..series.len() {
        sum += series[i] - series[i - period];
        out[i] = sum / period as f64;
    }
    out
}

/// Exponential moving average. k = 2/(n+1), seeded with the first SMA.
pub fn ema(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut value = series[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = value;
    for i in period..series.len() {
        value = series[i] * k + value * (1.0 - k);
        out[i] = value;
    }
    out
}

/// Weighted moving average, linear weights 1..n.
pub fn wma(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }
    let divisor = (period * (period + 1)) as f64 / 2.0;
    for i in (period - 1)..series.len() {
        let start = i + 1 - period;
        let weighted: f64 = series[start..=i]
            .iter()
            .enumerate()
            .map(|(j, v)| (j + 1) as f64 * v)
            .sum();
        out[i] = weighted / divisor;
    }
    out
}

/// RSI with Wilder's smoothing; avg_loss == 0 pins the value at 100.
/// First n values are NaN (n price changes are needed for the seed).
pub fn rsi(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if period == 0 || series.len() <= period {
        return out;
    }
    let mut gains = Vec::with_capacity(series.len() - 1);
    let mut losses = Vec::with_capacity(series.len() - 1);
    for i in 1..series.len() {
        let change = series[i] - series[i - 1];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);
    for i in (period + 1)..series.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i - 1]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i - 1]) / period as f64;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Rate of change in percent over n bars; zero base yields 0.
pub fn roc(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    for i in period..series.len() {
        let prev = series[i - period];
        out[i] = if prev == 0.0 {
            0.0
        } else {
            (series[i] - prev) / prev * 100.0
        };
    }
    out
}

/// Population standard deviation over an n-bar window.
pub fn stddev(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }
    for i in (period - 1)..series.len() {
        let window = &series[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / period as f64;
        out[i] = variance.sqrt();
    }
    out
}
