//! # Generator Configuration
//!
//! Declarative configuration for a log-generation run, loadable from:
//! - declaro.toml (default configuration)
//! - Environment variables (DECLARO_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # declaro.toml
//! num_traces = 100
//! min_events = 3
//! max_events = 10
//! distributor_type = "gaussian"
//! loc = 5.0
//! scale = 1.5
//! negative_traces = 20
//! ```
//!
//! Every run validates its configuration up front; an invalid configuration
//! is fatal to the call and reported before any solver work starts.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Configuration errors, raised before any solver invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("min_events({min}) > max_events({max}) not valid! Min events are greater than max events")]
    InvalidEventRange { min: u32, max: u32 },

    #[error("min_events must be at least 1, got {0}")]
    EventsBelowOne(u32),

    #[error("negative traces ({negative}) cannot exceed the total traces to generate ({total})")]
    NegativeTracesExceedTotal { negative: u32, total: u32 },

    #[error("gaussian distribution requires both loc and scale")]
    MissingGaussianParams,

    #[error("gaussian loc must be greater than 1, got {0}")]
    InvalidLoc(f64),

    #[error("gaussian scale must be non-negative, got {0}")]
    InvalidScale(f64),

    #[error("custom distribution requires custom_probabilities")]
    MissingCustomProbabilities,

    #[error("custom_probabilities must have {expected} entries (one per trace length), got {got}")]
    CustomProbabilitiesLength { expected: usize, got: usize },

    #[error("custom_probabilities must be non-negative and sum to 1.0, sum is {0}")]
    CustomProbabilitiesSum(f64),

    #[error("activation bound for '{raw_line}' is empty: [{lower}, {upper}]")]
    InvalidActivationBound {
        raw_line: String,
        lower: u32,
        upper: u32,
    },

    #[error("configuration file error: {0}")]
    Load(String),
}

/// Shape of the trace-length distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistributorType {
    #[default]
    Uniform,
    Gaussian,
    Custom,
}

/// Bound on the number of activations of a constraint: `[lower, upper]`,
/// with `upper = None` standing for +infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationBound {
    pub lower: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<u32>,
}

/// Configuration of a log-generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Total number of traces to generate (positive + negative).
    #[serde(default)]
    pub num_traces: u32,

    /// Minimum number of events per trace.
    #[serde(default = "default_one")]
    pub min_events: u32,

    /// Maximum number of events per trace.
    #[serde(default = "default_one")]
    pub max_events: u32,

    /// Trace-length distribution shape.
    #[serde(default)]
    pub distributor_type: DistributorType,

    /// One probability per trace length in `min_events..=max_events`;
    /// required iff `distributor_type = custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_probabilities: Option<Vec<f64>>,

    /// Gaussian mean; required iff `distributor_type = gaussian`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<f64>,

    /// Gaussian standard deviation; required iff `distributor_type = gaussian`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,

    /// Whether identifiers are encoded before reaching the solver. The
    /// solver rejects names starting with a capital letter or carrying a
    /// colon.
    #[serde(default = "default_true")]
    pub encode_model: bool,

    /// How many of `num_traces` should violate the model.
    #[serde(default)]
    pub negative_traces: u32,

    /// Violate every constraint (true) or let the solver pick a non-empty
    /// subset of the violatable ones (false).
    #[serde(default)]
    pub violate_all_constraints: bool,

    /// Constraints eligible for violation, addressed by their raw line.
    #[serde(default)]
    pub violatable_constraints: Vec<String>,

    /// Bounds on activation counts, keyed by constraint raw line.
    #[serde(default)]
    pub activation_conditions: BTreeMap<String, ActivationBound>,

    /// Number of traces sharing each generated activity skeleton; 0 and 1
    /// are equivalent.
    #[serde(default)]
    pub repetitions_per_trace: u32,
}

fn default_one() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            num_traces: 0,
            min_events: 1,
            max_events: 1,
            distributor_type: DistributorType::Uniform,
            custom_probabilities: None,
            loc: None,
            scale: None,
            encode_model: true,
            negative_traces: 0,
            violate_all_constraints: false,
            violatable_constraints: Vec::new(),
            activation_conditions: BTreeMap::new(),
            repetitions_per_trace: 0,
        }
    }
}

impl GeneratorConfig {
    /// Convenience constructor for the common case.
    pub fn new(num_traces: u32, min_events: u32, max_events: u32) -> Self {
        GeneratorConfig {
            num_traces,
            min_events,
            max_events,
            ..GeneratorConfig::default()
        }
    }

    /// Load configuration from default locations: `declaro.toml` overridden
    /// by `DECLARO_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Toml::file("declaro.toml"))
            .merge(Env::prefixed("DECLARO_"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("DECLARO_"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Validate the configuration. Called by the generator before any
    /// solver work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_events < 1 {
            return Err(ConfigError::EventsBelowOne(self.min_events));
        }
        if self.min_events > self.max_events {
            return Err(ConfigError::InvalidEventRange {
                min: self.min_events,
                max: self.max_events,
            });
        }
        if self.negative_traces > self.num_traces {
            return Err(ConfigError::NegativeTracesExceedTotal {
                negative: self.negative_traces,
                total: self.num_traces,
            });
        }
        match self.distributor_type {
            DistributorType::Gaussian => {
                let (Some(loc), Some(scale)) = (self.loc, self.scale) else {
                    return Err(ConfigError::MissingGaussianParams);
                };
                if loc <= 1.0 {
                    return Err(ConfigError::InvalidLoc(loc));
                }
                if scale < 0.0 {
                    return Err(ConfigError::InvalidScale(scale));
                }
            }
            DistributorType::Custom => {
                let Some(probabilities) = &self.custom_probabilities else {
                    return Err(ConfigError::MissingCustomProbabilities);
                };
                let expected = (self.max_events - self.min_events + 1) as usize;
                if probabilities.len() != expected {
                    return Err(ConfigError::CustomProbabilitiesLength {
                        expected,
                        got: probabilities.len(),
                    });
                }
                let sum: f64 = probabilities.iter().sum();
                if probabilities.iter().any(|p| *p < 0.0) || (sum - 1.0).abs() > 1e-6 {
                    return Err(ConfigError::CustomProbabilitiesSum(sum));
                }
            }
            DistributorType::Uniform => {}
        }
        for (raw_line, bound) in &self.activation_conditions {
            if let Some(upper) = bound.upper {
                if upper < bound.lower {
                    return Err(ConfigError::InvalidActivationBound {
                        raw_line: raw_line.clone(),
                        lower: bound.lower,
                        upper,
                    });
                }
            }
        }
        Ok(())
    }
}
