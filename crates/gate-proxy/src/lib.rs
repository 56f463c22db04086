//! Atrium Gate - Auth-Gated Dispatcher
//!
//! Listeners, per-connection dispatch, and credential validation. Every
//! listener shares one workspace cache through one auth gate; each inbound
//! connection is authenticated from its credential cookies and forwarded
//! to the resolved backend, or rejected in-protocol.
//!
//! The upgrade path deliberately diverges from ordinary requests on
//! rejection: once a protocol-upgrade handshake has begun there is no
//! response channel, so the transport is closed without writing a byte.

pub mod auth;
pub mod cookies;
pub mod dispatch;
pub mod listener;
pub mod render;

pub use auth::{AuthGate, AuthOutcome};
pub use cookies::parse_credential_cookies;
pub use dispatch::{Dispatcher, LIVENESS_PATH};
pub use listener::{ListenerSet, ListenerSpec};
pub use render::{ErrorRenderer, HtmlErrorRenderer, ProxyBody};
