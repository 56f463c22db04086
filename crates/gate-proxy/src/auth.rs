//! Credential validation against resolved workspace records.

use std::sync::Arc;

use gate_cache::WorkspaceCache;
use gate_core::{ResolveError, WorkspaceRecord};
use tracing::{debug, warn};

/// Outcome of validating a presented credential.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Credential matched; the record is returned for dispatch.
    Authorized(WorkspaceRecord),
    /// Username or secret missing — rejected before any lookup.
    Unauthenticated,
    /// Record resolved but the credential did not match.
    InvalidCredential,
    /// The workspace could not be resolved at all; carries the fetch error
    /// so callers can surface it with the right severity.
    Unresolved(ResolveError),
}

/// Validates presented credentials against the workspace cache. One
/// instance is shared by every dispatcher in the process.
pub struct AuthGate {
    cache: Arc<WorkspaceCache>,
}

impl AuthGate {
    pub fn new(cache: Arc<WorkspaceCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &WorkspaceCache {
        &self.cache
    }

    /// Validate a presented `(username, combined-secret)` pair.
    ///
    /// Missing values fail fast without touching the cache. The record's
    /// credential is resolved current-field-first with legacy fallback and
    /// compared by exact string equality.
    pub async fn authenticate(
        &self,
        username: Option<&str>,
        secret: Option<&str>,
    ) -> AuthOutcome {
        let (Some(username), Some(secret)) = (username, secret) else {
            debug!("rejected request without credential cookies");
            return AuthOutcome::Unauthenticated;
        };

        let record = match self.cache.fetch(username).await {
            Ok(record) => record,
            Err(e) => return AuthOutcome::Unresolved(e),
        };

        let expected = match record.resolve_credential() {
            Ok(credential) => credential,
            Err(e) => {
                warn!(username, "record carries an unusable credential: {e}");
                return AuthOutcome::InvalidCredential;
            }
        };

        if expected.matches(secret) {
            AuthOutcome::Authorized(record)
        } else {
            debug!(username, "credential mismatch");
            AuthOutcome::InvalidCredential
        }
    }
}
