//! Rejection taxonomy shared by every listener, plus the cache-fetch error.

use thiserror::Error;

/// Why a workspace fetch failed. Surfaced distinctly from credential
/// mismatches because the user-facing severity differs: these indicate a
/// provisioning or backend problem, not a user error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no workspace record found")]
    NotFound,
    #[error("directory lookup failed: {0}")]
    Directory(String),
}

/// Terminal rejection states of the per-connection dispatch machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectKind {
    /// Credential cookies absent — rejected before any lookup.
    AuthMissing,
    /// Credential mismatch.
    AuthInvalid,
    /// Directory/cache error or unknown user.
    ResolutionFailed,
    /// Record exists but carries no address yet.
    WorkspaceUnprovisioned,
    /// Connection to the resolved address failed.
    BackendUnavailable,
}

impl RejectKind {
    /// Severe rejections get the apologetic error page; routine ones the
    /// terse one. Only resolution failures are severe — everything else is
    /// a user error or an expected lifecycle state.
    pub fn severe(&self) -> bool {
        matches!(self, Self::ResolutionFailed)
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::AuthMissing => 401,
            Self::AuthInvalid => 403,
            Self::ResolutionFailed => 500,
            Self::WorkspaceUnprovisioned => 503,
            Self::BackendUnavailable => 502,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::AuthMissing => "Invalid authentication, please try logging in again.",
            Self::AuthInvalid => "Invalid credentials for this workspace.",
            Self::ResolutionFailed => "Failed to resolve workspace.",
            Self::WorkspaceUnprovisioned => "Workspace hasn't been created for this user yet.",
            Self::BackendUnavailable => "Workspace not available (is it running?)",
        }
    }
}

impl std::fmt::Display for RejectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
