//! Security identity for Windows containers
//!
//! Windows containers run as a named user, never a numeric uid, and may carry
//! a GMSA credential spec.

use serde::{Deserialize, Serialize};

use crate::models::SecurityContext;
use crate::{Error, Result};

/// The parts of an effective security context that matter on Windows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContextInput {
    pub run_as_user_id: Option<i64>,
    /// Windows-specific user name, overrides any supplied user name
    pub windows_run_as_username: Option<String>,
    pub gmsa_credential_spec: Option<String>,
    pub gmsa_feature_enabled: bool,
}

impl SecurityContextInput {
    pub fn from_effective(sc: &SecurityContext, gmsa_feature_enabled: bool) -> Self {
        let windows = sc.windows_options.as_ref();
        Self {
            run_as_user_id: sc.run_as_user,
            windows_run_as_username: windows.and_then(|w| w.run_as_user_name.clone()),
            gmsa_credential_spec: windows.and_then(|w| w.gmsa_credential_spec.clone()),
            gmsa_feature_enabled,
        }
    }
}

/// Identity the container process runs under. Empty fields mean the image default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowsSecurityIdentity {
    pub run_as_username: String,
    pub credential_spec: String,
}

/// Resolve the run-as user name and credential spec.
///
/// `supplied_username` is the user name determined from the image or pod by
/// the caller; a Windows-specific user name in the context replaces it.
pub fn resolve(ctx: &SecurityContextInput, supplied_username: &str) -> Result<WindowsSecurityIdentity> {
    if let Some(uid) = ctx.run_as_user_id {
        return Err(Error::UnsupportedOption(format!(
            "run as uid ({}) is not supported on Windows",
            uid
        )));
    }

    let mut identity = WindowsSecurityIdentity::default();
    if !supplied_username.is_empty() {
        identity.run_as_username = supplied_username.to_string();
    }

    if ctx.gmsa_feature_enabled {
        if let Some(spec) = &ctx.gmsa_credential_spec {
            identity.credential_spec = spec.clone();
        }
    }

    if let Some(name) = &ctx.windows_run_as_username {
        identity.run_as_username = name.clone();
    }

    Ok(identity)
}
