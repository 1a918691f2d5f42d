use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::als::AlsParams;
use crate::errors::{RecError, RecResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub artifacts_dir: PathBuf,
    pub als: AlsParams,
    pub eval_k: usize,
    /// drop items the user already ordered from personalized results
    pub exclude_consumed: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("artifacts"),
            als: AlsParams::default(),
            eval_k: 5,
            exclude_consumed: false,
            log_level: String::from("info"),
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> RecResult<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| RecError::InvalidParam(format!("failed to parse env `{key}`={raw}"))),
        None => Ok(default),
    }
}

impl Settings {
    pub fn from_env() -> RecResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RecResult<Self> {
        let defaults = Settings::default();
        let als = AlsParams {
            factors: parse_var(&lookup, "ALS_FACTORS", defaults.als.factors)?,
            regularization: parse_var(&lookup, "ALS_REGULARIZATION", defaults.als.regularization)?,
            iterations: parse_var(&lookup, "ALS_ITERATIONS", defaults.als.iterations)?,
            random_seed: parse_var(&lookup, "ALS_SEED", defaults.als.random_seed)?,
            alpha: parse_var(&lookup, "ALS_ALPHA", defaults.als.alpha)?,
        };
        als.validate()?;
        let eval_k = parse_var(&lookup, "EVAL_K", defaults.eval_k)?;
        if eval_k == 0 {
            return Err(RecError::InvalidParam(String::from("EVAL_K must be positive")));
        }
        Ok(Self {
            artifacts_dir: lookup("ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifacts_dir),
            als,
            eval_k,
            exclude_consumed: parse_var(&lookup, "EXCLUDE_CONSUMED", defaults.exclude_consumed)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        })
    }
}
