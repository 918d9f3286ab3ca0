use super::cache::CachePolicy;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Where the phase energies come from.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseSourceConfig {
    /// A previously written phase table.
    Table(PathBuf),
    /// A directory of finished VASP calculations, one sub-directory per phase.
    /// With `strict`, an inconsistent composition aborts the whole batch
    /// instead of skipping the entry.
    Calculations { root: PathBuf, strict: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub policy: CachePolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitsConfig {
    pub target: String,
    /// Elements spanning the chemical potential space. `None` uses the
    /// elements of the target, in formula order.
    pub elements: Option<Vec<String>>,
    pub dependent_element: Option<String>,
    pub extrinsic: Vec<String>,
    pub tolerance: f64,
    pub source: PhaseSourceConfig,
    pub cache: Option<CacheConfig>,
}

#[derive(Default)]
pub struct LimitsConfigBuilder {
    target: Option<String>,
    elements: Option<Vec<String>>,
    dependent_element: Option<String>,
    extrinsic: Vec<String>,
    tolerance: Option<f64>,
    source: Option<PhaseSourceConfig>,
    cache: Option<CacheConfig>,
}

impl LimitsConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, formula: impl Into<String>) -> Self {
        self.target = Some(formula.into());
        self
    }
    pub fn elements(mut self, elements: Vec<String>) -> Self {
        self.elements = Some(elements);
        self
    }
    pub fn dependent_element(mut self, element: Option<String>) -> Self {
        self.dependent_element = element;
        self
    }
    pub fn extrinsic(mut self, species: Vec<String>) -> Self {
        self.extrinsic = species;
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn source(mut self, source: PhaseSourceConfig) -> Self {
        self.source = Some(source);
        self
    }
    pub fn cache(mut self, cache: Option<CacheConfig>) -> Self {
        self.cache = cache;
        self
    }

    pub fn build(self) -> Result<LimitsConfig, ConfigError> {
        let target = self
            .target
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingParameter("target"))?;
        let tolerance = self.tolerance.unwrap_or(DEFAULT_TOLERANCE);
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "tolerance",
                reason: format!("must be a positive number, got {}", tolerance),
            });
        }
        Ok(LimitsConfig {
            target,
            elements: self.elements,
            dependent_element: self.dependent_element,
            extrinsic: self.extrinsic,
            tolerance,
            source: self.source.ok_or(ConfigError::MissingParameter("source"))?,
            cache: self.cache,
        })
    }
}
