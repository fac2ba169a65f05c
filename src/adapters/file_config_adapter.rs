//! INI file configuration adapter and typed section loaders.
//!
//! Layout:
//!
//! ```ini
//! [data]
//! market = data/market.csv
//! rules = data/rules.csv
//! arithmetic = data/arithmetic.csv
//! functions = data/functions.csv
//!
//! [params]
//! fast = 10
//!
//! [ranges]
//! fast = 5,20,5
//!
//! [weights]
//! AccReturn = 1.0
//!
//! [optimize]
//! params = fast
//! objective = MAX
//! train_window = 20
//! test_window = 5
//! max_evals = 100
//! ```

use std::collections::HashMap;
use std::path::Path;

use configparser::ini::Ini;

use crate::domain::error::RolltraderError;
use crate::domain::metrics::DEFAULT_INITIAL_CASH;
use crate::domain::optimizer::{Objective, OptimizerSettings};
use crate::domain::params::{ParamMap, ParamRange, ParamValue};
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        // Case-sensitive parsing: parameter and metric names carry case.
        let mut config = Ini::new_cs();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new_cs();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

/// Static parameter values from [params]. Non-numeric values are invalid.
pub fn load_params(config: &dyn ConfigPort) -> Result<ParamMap, RolltraderError> {
    let mut params = ParamMap::new();
    for key in config.keys("params") {
        let raw = config.get_string("params", &key).unwrap_or_default();
        let value =
            ParamValue::parse(&raw).ok_or_else(|| RolltraderError::ConfigInvalid {
                section: "params".into(),
                key: key.clone(),
                reason: format!("expected a number, got '{raw}'"),
            })?;
        params.insert(key, value);
    }
    Ok(params)
}

/// Quantized ranges from [ranges], each a "low,high,step" triple.
pub fn load_ranges(
    config: &dyn ConfigPort,
) -> Result<HashMap<String, ParamRange>, RolltraderError> {
    let mut ranges = HashMap::new();
    for key in config.keys("ranges") {
        let raw = config.get_string("ranges", &key).unwrap_or_default();
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| RolltraderError::ConfigInvalid {
                section: "ranges".into(),
                key: key.clone(),
                reason: format!("expected low,high,step, got '{raw}'"),
            })?;
        let [low, high, step] = parts[..] else {
            return Err(RolltraderError::ConfigInvalid {
                section: "ranges".into(),
                key,
                reason: format!("expected three values, got {}", parts.len()),
            });
        };
        ranges.insert(key, ParamRange::new(low, high, step));
    }
    Ok(ranges)
}

/// Objective weights from [weights], metric key to weight.
pub fn load_weights(config: &dyn ConfigPort) -> Result<HashMap<String, f64>, RolltraderError> {
    let mut weights = HashMap::new();
    for key in config.keys("weights") {
        let raw = config.get_string("weights", &key).unwrap_or_default();
        let weight: f64 = raw
            .trim()
            .parse()
            .map_err(|_| RolltraderError::ConfigInvalid {
                section: "weights".into(),
                key: key.clone(),
                reason: format!("expected a number, got '{raw}'"),
            })?;
        weights.insert(key, weight);
    }
    Ok(weights)
}

/// Parameters the search varies, in declaration order.
pub fn load_optimize_params(config: &dyn ConfigPort) -> Result<Vec<String>, RolltraderError> {
    let raw = config
        .get_string("optimize", "params")
        .ok_or(RolltraderError::ConfigMissing {
            section: "optimize".into(),
            key: "params".into(),
        })?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn load_settings(config: &dyn ConfigPort) -> Result<OptimizerSettings, RolltraderError> {
    let defaults = OptimizerSettings::default();
    let train_window = config.get_int("optimize", "train_window", defaults.train_window as i64);
    let test_window = config.get_int("optimize", "test_window", defaults.test_window as i64);
    let max_evals = config.get_int("optimize", "max_evals", defaults.max_evals as i64);
    for (key, value) in [
        ("train_window", train_window),
        ("test_window", test_window),
        ("max_evals", max_evals),
    ] {
        if value <= 0 {
            return Err(RolltraderError::ConfigInvalid {
                section: "optimize".into(),
                key: key.into(),
                reason: format!("must be positive, got {value}"),
            });
        }
    }
    let objective = config
        .get_string("optimize", "objective")
        .map(|s| Objective::parse(&s))
        .unwrap_or_default();
    Ok(OptimizerSettings {
        train_window: train_window as usize,
        test_window: test_window as usize,
        max_evals: max_evals as usize,
        objective,
        initial_cash: config.get_double("optimize", "initial_cash", DEFAULT_INITIAL_CASH),
        seed: config.get_int("optimize", "seed", defaults.seed as i64) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[data]
market = data/market.csv
rules = data/rules.csv

[params]
fast = 10
band = 1.5

[ranges]
fast = 5,20,5
band = 0.5,1.5,0.25

[weights]
AccReturn = 1.0
Sharpe = 0.5

[optimize]
params = fast, band
objective = MAX
train_window = 20
test_window = 5
max_evals = 50
seed = 7
"#;

    fn adapter() -> FileConfigAdapter {
        FileConfigAdapter::from_string(SAMPLE).unwrap()
    }

    #[test]
    fn from_file_round_trips() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{SAMPLE}").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "market"),
            Some("data/market.csv".to_string())
        );
    }

    #[test]
    fn keys_are_case_sensitive() {
        let adapter = adapter();
        assert_eq!(adapter.keys("weights"), ["AccReturn", "Sharpe"]);
    }

    #[test]
    fn params_parse_with_integer_preference() {
        let params = load_params(&adapter()).unwrap();
        assert_eq!(params["fast"], ParamValue::Int(10));
        assert_eq!(params["band"], ParamValue::Real(1.5));
    }

    #[test]
    fn bad_param_is_config_invalid() {
        let adapter = FileConfigAdapter::from_string("[params]\nfast = abc\n").unwrap();
        assert!(matches!(
            load_params(&adapter),
            Err(RolltraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn ranges_parse_triples() {
        let ranges = load_ranges(&adapter()).unwrap();
        assert_eq!(ranges["fast"], ParamRange::new(5.0, 20.0, 5.0));
        assert_eq!(ranges["band"], ParamRange::new(0.5, 1.5, 0.25));
    }

    #[test]
    fn range_with_wrong_arity_is_config_invalid() {
        let adapter = FileConfigAdapter::from_string("[ranges]\nfast = 5,20\n").unwrap();
        assert!(matches!(
            load_ranges(&adapter),
            Err(RolltraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn weights_keep_metric_key_case() {
        let weights = load_weights(&adapter()).unwrap();
        assert_eq!(weights["AccReturn"], 1.0);
        assert_eq!(weights["Sharpe"], 0.5);
    }

    #[test]
    fn optimize_params_keep_declaration_order() {
        let params = load_optimize_params(&adapter()).unwrap();
        assert_eq!(params, ["fast", "band"]);
    }

    #[test]
    fn settings_read_with_defaults() {
        let settings = load_settings(&adapter()).unwrap();
        assert_eq!(settings.train_window, 20);
        assert_eq!(settings.test_window, 5);
        assert_eq!(settings.max_evals, 50);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.objective, Objective::Max);
        assert_eq!(settings.initial_cash, DEFAULT_INITIAL_CASH);

        let bare = FileConfigAdapter::from_string("[optimize]\nparams = x\n").unwrap();
        let defaults = load_settings(&bare).unwrap();
        assert_eq!(defaults.train_window, 20);
        assert_eq!(defaults.test_window, 5);
        assert_eq!(defaults.max_evals, 100);
    }

    #[test]
    fn non_positive_window_is_config_invalid() {
        let adapter = FileConfigAdapter::from_string("[optimize]\ntrain_window = 0\n").unwrap();
        assert!(matches!(
            load_settings(&adapter),
            Err(RolltraderError::ConfigInvalid { .. })
        ));
    }
}
