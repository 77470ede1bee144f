//! Generator configuration with builder pattern

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const FEATURE_WINDOWS_GMSA: &str = "WindowsGMSA";
pub const FEATURE_HYPERV_CONTAINER: &str = "HyperVContainer";

/// Feature gates consulted while generating Windows container configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureGates {
    /// Pass GMSA credential specs through to the runtime
    #[serde(rename = "WindowsGMSA", default)]
    pub windows_gmsa: bool,
    /// Honor the Hyper-V isolation pod annotation
    #[serde(rename = "HyperVContainer", default)]
    pub hyperv_container: bool,
}

impl FeatureGates {
    /// Parse a `Name=bool,Name=bool` list. Unlisted gates keep their current value.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut gates = Self::default();
        gates.apply(spec)?;
        Ok(gates)
    }

    /// Apply a `Name=bool,Name=bool` list on top of these gates.
    pub fn apply(&mut self, spec: &str) -> Result<()> {
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("missing value for feature gate {:?}", entry)))?;
            let enabled: bool = value.trim().parse().map_err(|_| {
                Error::Config(format!("invalid value {:?} for feature gate {}", value, name.trim()))
            })?;

            match name.trim() {
                FEATURE_WINDOWS_GMSA => self.windows_gmsa = enabled,
                FEATURE_HYPERV_CONTAINER => self.hyperv_container = enabled,
                other => return Err(Error::Config(format!("unknown feature gate {:?}", other))),
            }
        }
        Ok(())
    }
}

impl FromStr for FeatureGates {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FeatureGates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={},{}={}",
            FEATURE_HYPERV_CONTAINER, self.hyperv_container, FEATURE_WINDOWS_GMSA, self.windows_gmsa
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    #[serde(default)]
    pub feature_gates: FeatureGates,
    /// Override the host logical CPU count instead of querying the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_cpu_count: Option<u32>,
}

impl GeneratorConfig {
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.host_cpu_count == Some(0) {
            return Err(crate::Error::Config("host_cpu_count must be at least 1".into()));
        }
        Ok(())
    }

    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Default)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn feature_gates(mut self, gates: FeatureGates) -> Self {
        self.config.feature_gates = gates;
        self
    }

    pub fn windows_gmsa(mut self, enabled: bool) -> Self {
        self.config.feature_gates.windows_gmsa = enabled;
        self
    }

    pub fn hyperv_container(mut self, enabled: bool) -> Self {
        self.config.feature_gates.hyperv_container = enabled;
        self
    }

    pub fn host_cpu_count(mut self, count: u32) -> Self {
        self.config.host_cpu_count = Some(count);
        self
    }

    pub fn build(self) -> GeneratorConfig {
        self.config
    }

    pub fn build_validated(self) -> crate::Result<GeneratorConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
