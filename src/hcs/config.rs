//! HCS Configuration types
//! Based on: https://learn.microsoft.com/en-us/virtualization/api/hcs/schemareference

use serde::{Deserialize, Serialize};

use crate::resources::WindowsResourceControl;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self { major: 2, minor: 1 }
    }
}

/// Processor controls. Unset controls are omitted from the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    /// Relative weight, the HCS name for CPU shares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
    /// Ten-thousandths of the processors available to the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<u64>,
}

impl ProcessorConfig {
    pub fn is_empty(&self) -> bool {
        self.count.is_none() && self.weight.is_none() && self.maximum.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemoryConfig {
    #[serde(rename = "SizeInMB")]
    pub size_in_mb: u64,
}

/// Container section of a compute system document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<ProcessorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryConfig>,
}

fn non_zero(value: u64) -> Option<u64> {
    (value != 0).then_some(value)
}

impl From<&WindowsResourceControl> for ContainerConfig {
    fn from(rc: &WindowsResourceControl) -> Self {
        let processor = ProcessorConfig {
            count: non_zero(rc.cpu_count),
            weight: non_zero(rc.cpu_shares),
            maximum: non_zero(rc.cpu_maximum),
        };
        let memory = non_zero(rc.memory_limit_bytes).map(|bytes| MemoryConfig {
            size_in_mb: bytes.div_ceil(BYTES_PER_MB),
        });

        Self {
            processor: (!processor.is_empty()).then_some(processor),
            memory,
        }
    }
}

/// Root HCS compute system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputeSystemConfig {
    pub schema_version: SchemaVersion,
    pub owner: String,
    pub should_terminate_on_last_handle_closed: bool,
    pub container: ContainerConfig,
}

impl ComputeSystemConfig {
    /// Document carrying the resource controls of one container
    pub fn for_container(owner: &str, resources: &WindowsResourceControl) -> Self {
        Self {
            schema_version: SchemaVersion::default(),
            owner: owner.to_string(),
            should_terminate_on_last_handle_closed: true,
            container: ContainerConfig::from(resources),
        }
    }
}
