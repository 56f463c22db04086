//! Atrium Gate - Core Types
//!
//! Shared data model for the workspace gateway. This crate is the single
//! source of truth for the workspace record wire format, credential
//! handling, invalidation channel names, cookie names, and the rejection
//! taxonomy used by every listener.

pub mod credential;
pub mod record;
pub mod reject;

pub use credential::{Credential, CredentialError, COOKIE_SECRET_TOKEN, COOKIE_USERNAME};
pub use record::{
    WorkspaceRecord, CHANNEL_NEW_WORKSPACE, CHANNEL_WORKSPACE_CONFLICT, INVALIDATION_CHANNELS,
};
pub use reject::{RejectKind, ResolveError};
