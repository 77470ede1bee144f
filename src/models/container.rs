//! Container model - resource requests/limits and container security context

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::SecurityContext;
use crate::quantity::Quantity;

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";

/// Quantities keyed by resource name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(pub BTreeMap<String, Quantity>);

impl ResourceList {
    pub fn get(&self, resource: &str) -> Option<&Quantity> {
        self.0.get(resource)
    }

    pub fn insert(&mut self, resource: impl Into<String>, quantity: Quantity) {
        self.0.insert(resource.into(), quantity);
    }

    pub fn cpu(&self) -> Option<&Quantity> {
        self.get(RESOURCE_CPU)
    }

    pub fn memory(&self) -> Option<&Quantity> {
        self.get(RESOURCE_MEMORY)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "ResourceList::is_empty")]
    pub requests: ResourceList,
    #[serde(default, skip_serializing_if = "ResourceList::is_empty")]
    pub limits: ResourceList,
}

/// A single container within a pod
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn cpu_request(mut self, quantity: Quantity) -> Self {
        self.resources.requests.insert(RESOURCE_CPU, quantity);
        self
    }

    pub fn cpu_limit(mut self, quantity: Quantity) -> Self {
        self.resources.limits.insert(RESOURCE_CPU, quantity);
        self
    }

    pub fn memory_limit(mut self, quantity: Quantity) -> Self {
        self.resources.limits.insert(RESOURCE_MEMORY, quantity);
        self
    }

    pub fn security_context(mut self, sc: SecurityContext) -> Self {
        self.security_context = Some(sc);
        self
    }
}
