use crate::error::DkgError;
use crate::protocol::commitment::SchemeKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters for one DKG run and every refresh that follows it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DkgConfig {
    pub threshold: u32,
    pub n_parties: u32,
    #[serde(default)]
    pub scheme: SchemeKind,
    /// Fan each round out over one worker thread per party
    #[serde(default)]
    pub parallel: bool,
}

impl DkgConfig {
    pub fn new(threshold: u32, n_parties: u32) -> Self {
        Self {
            threshold,
            n_parties,
            scheme: SchemeKind::Feldman,
            parallel: false,
        }
    }

    pub fn with_scheme(mut self, scheme: SchemeKind) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<(), DkgError> {
        if self.threshold == 0 {
            return Err(DkgError::Configuration(
                "threshold must be at least 1".to_string(),
            ));
        }
        if self.threshold > self.n_parties {
            return Err(DkgError::Configuration(format!(
                "threshold {} exceeds number of parties {}",
                self.threshold, self.n_parties
            )));
        }
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: DkgConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config JSON in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }
}
