//! Security context models and the pod/container merge

use serde::{Deserialize, Serialize};

use super::{Container, Pod};

/// Windows-specific security options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsSecurityContextOptions {
    /// Name of the GMSA credential spec resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gmsa_credential_spec_name: Option<String>,
    /// Inlined GMSA credential spec contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gmsa_credential_spec: Option<String>,
    /// User name to run the container entrypoint as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user_name: Option<String>,
}

impl WindowsSecurityContextOptions {
    fn overlay(&mut self, other: &WindowsSecurityContextOptions) {
        if other.gmsa_credential_spec_name.is_some() {
            self.gmsa_credential_spec_name = other.gmsa_credential_spec_name.clone();
        }
        if other.gmsa_credential_spec.is_some() {
            self.gmsa_credential_spec = other.gmsa_credential_spec.clone();
        }
        if other.run_as_user_name.is_some() {
            self.run_as_user_name = other.run_as_user_name.clone();
        }
    }
}

/// Pod-level security context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_options: Option<WindowsSecurityContextOptions>,
}

/// Container-level security context, also used for the merged result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_options: Option<WindowsSecurityContextOptions>,
}

impl SecurityContext {
    pub fn run_as_user(mut self, uid: i64) -> Self {
        self.run_as_user = Some(uid);
        self
    }

    pub fn run_as_user_name(mut self, name: impl Into<String>) -> Self {
        self.windows_options
            .get_or_insert_with(Default::default)
            .run_as_user_name = Some(name.into());
        self
    }

    pub fn gmsa_credential_spec(mut self, spec: impl Into<String>) -> Self {
        self.windows_options
            .get_or_insert_with(Default::default)
            .gmsa_credential_spec = Some(spec.into());
        self
    }
}

impl From<&PodSecurityContext> for SecurityContext {
    fn from(pod: &PodSecurityContext) -> Self {
        Self {
            run_as_user: pod.run_as_user,
            windows_options: pod.windows_options.clone(),
        }
    }
}

/// Merge the pod security context with the container's own.
///
/// Every field set on the container wins over the pod value; Windows options
/// are merged field by field.
pub fn determine_effective_security_context(pod: &Pod, container: &Container) -> SecurityContext {
    let mut effective = pod
        .spec
        .security_context
        .as_ref()
        .map(SecurityContext::from)
        .unwrap_or_default();

    let Some(container_sc) = container.security_context.as_ref() else {
        return effective;
    };

    if container_sc.run_as_user.is_some() {
        effective.run_as_user = container_sc.run_as_user;
    }
    if let Some(options) = container_sc.windows_options.as_ref() {
        effective
            .windows_options
            .get_or_insert_with(Default::default)
            .overlay(options);
    }

    effective
}
