//! Per-connection dispatch: credential extraction, auth check, and the
//! proxy-or-reject decision.
//!
//! State machine per inbound request:
//! cookies → auth gate → provisioning check → forward to
//! `(record.ip, backend_port)`, relaying until either side closes.
//!
//! Rejections diverge by path. Ordinary requests get a rendered error
//! response. Protocol upgrades have no response channel once the handshake
//! has begun: the dispatcher returns an error from the hyper service,
//! which tears the connection down before any bytes are written.

use std::net::SocketAddr;
use std::sync::Arc;

use gate_core::{RejectKind, WorkspaceRecord};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderMap, CONNECTION};
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::auth::{AuthGate, AuthOutcome};
use crate::cookies::parse_credential_cookies;
use crate::listener::ListenerSpec;
use crate::render::{empty_body, full_body, ErrorRenderer, ProxyBody};

/// Fixed unauthenticated liveness endpoint, primary listener only.
pub const LIVENESS_PATH: &str = "/healthz";

/// Returned to hyper to abort an upgrade connection without a response.
#[derive(Debug, Error)]
#[error("upgrade transport closed: {0}")]
pub struct SilentClose(pub RejectKind);

enum Decision {
    Forward(WorkspaceRecord),
    Reject(RejectKind),
}

/// One dispatcher per listener; all share the auth gate (and through it
/// the workspace cache) and the error renderer.
pub struct Dispatcher {
    gate: Arc<AuthGate>,
    renderer: Arc<dyn ErrorRenderer>,
    spec: ListenerSpec,
}

impl Dispatcher {
    pub fn new(gate: Arc<AuthGate>, renderer: Arc<dyn ErrorRenderer>, spec: ListenerSpec) -> Self {
        Self { gate, renderer, spec }
    }

    pub fn spec(&self) -> &ListenerSpec {
        &self.spec
    }

    /// Entry point wired into the hyper connection service.
    pub async fn handle(&self, req: Request<Incoming>) -> Result<Response<ProxyBody>, SilentClose> {
        if self.spec.liveness && req.method() == Method::GET && req.uri().path() == LIVENESS_PATH {
            return Ok(Response::new(full_body("ok")));
        }

        let wants_upgrade = self.spec.upgrades && is_upgrade(req.headers());

        match self.decide(req.headers()).await {
            Decision::Forward(record) => self.forward(req, record, wants_upgrade).await,
            Decision::Reject(kind) => self.reject(kind, wants_upgrade),
        }
    }

    async fn decide(&self, headers: &HeaderMap) -> Decision {
        let (username, secret) = parse_credential_cookies(headers);
        if username.is_none() || secret.is_none() {
            return Decision::Reject(RejectKind::AuthMissing);
        }

        match self.gate.authenticate(username.as_deref(), secret.as_deref()).await {
            AuthOutcome::Authorized(record) => {
                if record.is_provisioned() {
                    Decision::Forward(record)
                } else {
                    Decision::Reject(RejectKind::WorkspaceUnprovisioned)
                }
            }
            AuthOutcome::Unauthenticated | AuthOutcome::InvalidCredential => {
                Decision::Reject(RejectKind::AuthInvalid)
            }
            AuthOutcome::Unresolved(e) => {
                warn!(listener = self.spec.name, "workspace resolution failed: {e}");
                Decision::Reject(RejectKind::ResolutionFailed)
            }
        }
    }

    fn reject(
        &self,
        kind: RejectKind,
        wants_upgrade: bool,
    ) -> Result<Response<ProxyBody>, SilentClose> {
        if wants_upgrade {
            debug!(listener = self.spec.name, "closing upgrade transport silently ({kind})");
            return Err(SilentClose(kind));
        }

        debug!(listener = self.spec.name, severe = kind.severe(), "rejected request: {kind}");
        let status =
            StatusCode::from_u16(kind.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Ok(self.renderer.render(kind.message(), kind.severe(), status))
    }

    /// Forward the request to the resolved backend, relaying an upgraded
    /// connection bidirectionally if the backend switches protocols.
    async fn forward(
        &self,
        mut req: Request<Incoming>,
        record: WorkspaceRecord,
        wants_upgrade: bool,
    ) -> Result<Response<ProxyBody>, SilentClose> {
        // decide() only forwards provisioned records.
        let Some(ip) = record.ip else {
            return self.reject(RejectKind::WorkspaceUnprovisioned, wants_upgrade);
        };
        let addr = SocketAddr::new(ip, self.spec.backend_port);

        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(listener = self.spec.name, %addr, "backend connect failed: {e}");
                return self.reject(RejectKind::BackendUnavailable, wants_upgrade);
            }
        };

        let (mut sender, conn) = match hyper::client::conn::http1::handshake(TokioIo::new(stream)).await
        {
            Ok(pair) => pair,
            Err(e) => {
                warn!(listener = self.spec.name, %addr, "backend handshake failed: {e}");
                return self.reject(RejectKind::BackendUnavailable, wants_upgrade);
            }
        };
        tokio::spawn(async move {
            if let Err(e) = conn.with_upgrades().await {
                debug!("backend connection ended: {e}");
            }
        });

        debug!(listener = self.spec.name, username = %record.username, %addr, "dispatching");

        // Take the client-side upgrade handle before the request moves to
        // the backend; it resolves only after our 101 response is written.
        let client_upgrade = wants_upgrade.then(|| hyper::upgrade::on(&mut req));

        let mut response = match sender.send_request(req).await {
            Ok(response) => response,
            Err(e) => {
                warn!(listener = self.spec.name, %addr, "backend request failed: {e}");
                return self.reject(RejectKind::BackendUnavailable, wants_upgrade);
            }
        };

        if response.status() == StatusCode::SWITCHING_PROTOCOLS {
            let backend_upgrade = hyper::upgrade::on(&mut response);
            let listener = self.spec.name;
            tokio::spawn(async move {
                let backend = match backend_upgrade.await {
                    Ok(upgraded) => upgraded,
                    Err(e) => {
                        warn!(listener, "backend upgrade failed: {e}");
                        return;
                    }
                };
                let client = match client_upgrade {
                    Some(pending) => match pending.await {
                        Ok(upgraded) => upgraded,
                        Err(e) => {
                            warn!(listener, "client upgrade failed: {e}");
                            return;
                        }
                    },
                    // Backend switched protocols on a request the client
                    // never marked as an upgrade; nothing to relay.
                    None => {
                        warn!(listener, "backend switched protocols without a client upgrade");
                        return;
                    }
                };

                let mut client = TokioIo::new(client);
                let mut backend = TokioIo::new(backend);
                match tokio::io::copy_bidirectional(&mut client, &mut backend).await {
                    Ok((to_backend, to_client)) => {
                        info!(listener, to_backend, to_client, "relay closed");
                    }
                    Err(e) => debug!(listener, "relay ended: {e}"),
                }
            });

            // Hand the backend's handshake response to the client; the
            // relay task takes over once hyper finishes the upgrade.
            let (parts, _) = response.into_parts();
            return Ok(Response::from_parts(parts, empty_body()));
        }

        Ok(response.map(|body| body.boxed()))
    }
}

/// Whether the request asks to switch protocols.
fn is_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|token| token.trim().eq_ignore_ascii_case("upgrade")))
        .unwrap_or(false)
}
