//! Workspace record — one user's backend workspace as stored in the
//! directory service, the shared cache, and each local snapshot.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::credential::{Credential, CredentialError};

/// Invalidation channel announcing a freshly resolved record.
pub const CHANNEL_NEW_WORKSPACE: &str = "NewWorkspace";

/// Invalidation channel announcing a conflicting record for a user.
/// Handled identically to `NewWorkspace` today (unconditional overwrite);
/// kept as a distinct name so the intended distinction stays visible.
pub const CHANNEL_WORKSPACE_CONFLICT: &str = "WorkspaceConflict";

/// All channels a streaming cache subscribes to.
pub const INVALIDATION_CHANNELS: [&str; 2] = [CHANNEL_NEW_WORKSPACE, CHANNEL_WORKSPACE_CONFLICT];

/// One user's backend workspace.
///
/// `ip` is `None` until the workspace has been provisioned; a record is
/// usable for dispatch only once it has an address, but usable for
/// credential checks regardless.
///
/// The credential arrives under the current field name (`credential`) or
/// the legacy one (`auth`); a record is valid for auth only when exactly
/// one of them resolves to a non-empty string. The typed resolution lives
/// in [`WorkspaceRecord::resolve_credential`] rather than being probed ad
/// hoc at each call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub username: String,
    #[serde(default)]
    pub ip: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    credential: Option<String>,
    #[serde(default, rename = "auth", skip_serializing_if = "Option::is_none")]
    legacy_credential: Option<String>,
}

impl WorkspaceRecord {
    /// Build a record with the current credential field populated.
    pub fn new(username: impl Into<String>, ip: Option<IpAddr>, credential: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ip,
            credential: Some(credential.into()),
            legacy_credential: None,
        }
    }

    /// Build a record carrying its credential under the legacy field name,
    /// as older directory entries still do.
    pub fn new_legacy(
        username: impl Into<String>,
        ip: Option<IpAddr>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            ip,
            credential: None,
            legacy_credential: Some(credential.into()),
        }
    }

    /// Whether the record can be dispatched to.
    pub fn is_provisioned(&self) -> bool {
        self.ip.is_some()
    }

    /// Two-step credential resolution: current field first, legacy field as
    /// fallback. Empty strings count as absent; a record populating both
    /// fields is rejected rather than silently preferring one.
    pub fn resolve_credential(&self) -> Result<Credential, CredentialError> {
        let current = self.credential.as_deref().filter(|s| !s.is_empty());
        let legacy = self.legacy_credential.as_deref().filter(|s| !s.is_empty());
        match (current, legacy) {
            (Some(_), Some(_)) => Err(CredentialError::Ambiguous),
            (Some(raw), None) | (None, Some(raw)) => Credential::parse(raw),
            (None, None) => Err(CredentialError::Missing),
        }
    }
}
