//! Domain error types.
//!
//! Only configuration-level problems surface as errors: a bad parameter
//! range, an empty rule table, windows that do not fit the data. Per-row
//! and per-step failures are recorded in [`crate::domain::diagnostics`]
//! instead and never abort a run.

/// Top-level error type for rolltrader.
#[derive(Debug, thiserror::Error)]
pub enum RolltraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error in {file}: {reason}")]
    Data { file: String, reason: String },

    #[error("market table is empty")]
    NoData,

    #[error("rule table is empty")]
    EmptyRules,

    #[error("no usable parameter ranges for {params:?}; optimization skipped")]
    NoOptimizableParams { params: Vec<String> },

    #[error("train window {train} + test window {test} exceeds available data ({bars} bars)")]
    WindowTooLarge {
        train: usize,
        test: usize,
        bars: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&RolltraderError> for std::process::ExitCode {
    fn from(err: &RolltraderError) -> Self {
        let code: u8 = match err {
            RolltraderError::Io(_) => 1,
            RolltraderError::ConfigParse { .. }
            | RolltraderError::ConfigMissing { .. }
            | RolltraderError::ConfigInvalid { .. } => 2,
            RolltraderError::Data { .. } | RolltraderError::NoData => 3,
            RolltraderError::EmptyRules => 4,
            RolltraderError::NoOptimizableParams { .. }
            | RolltraderError::WindowTooLarge { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
