//! Independently bound network endpoints, each wired to its own dispatcher.
//!
//! Listeners differ only in the fixed backend port they forward to and in
//! whether they accept protocol upgrades; they all share one auth gate.
//! Binding is explicit and sequential so the caller gets a ready-to-serve
//! component graph (and the OS-assigned ports) before any traffic flows.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::auth::AuthGate;
use crate::dispatch::Dispatcher;
use crate::render::ErrorRenderer;

/// Static description of one listener.
#[derive(Debug, Clone)]
pub struct ListenerSpec {
    pub name: &'static str,
    /// Local port to bind (0 for OS-assigned).
    pub port: u16,
    /// Fixed port on the resolved workspace address to forward to.
    pub backend_port: u16,
    /// Whether protocol upgrades are relayed on this listener.
    pub upgrades: bool,
    /// Whether the liveness endpoint is served on this listener.
    pub liveness: bool,
}

impl ListenerSpec {
    /// The primary listener: ordinary requests plus upgrades, forwarding
    /// to backend port 80, carrying the liveness endpoint.
    pub fn primary(port: u16) -> Self {
        Self {
            name: "primary",
            port,
            backend_port: 80,
            upgrades: true,
            liveness: true,
        }
    }

    /// A secondary listener: ordinary requests only, forwarding to its own
    /// fixed backend port.
    pub fn secondary(port: u16, backend_port: u16) -> Self {
        Self {
            name: "secondary",
            port,
            backend_port,
            upgrades: false,
            liveness: false,
        }
    }
}

struct Listener {
    tcp: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

/// The bound set of listeners. Construction binds; `serve` accepts.
pub struct ListenerSet {
    listeners: Vec<Listener>,
}

impl ListenerSet {
    /// Bind every listener in order, wiring each to a dispatcher that
    /// shares the given gate and renderer. Any bind failure aborts the
    /// whole set — a partially bound gateway must not serve.
    pub async fn bind(
        hostname: &str,
        specs: Vec<ListenerSpec>,
        gate: Arc<AuthGate>,
        renderer: Arc<dyn ErrorRenderer>,
    ) -> io::Result<Self> {
        let mut listeners = Vec::with_capacity(specs.len());
        for spec in specs {
            let addr: SocketAddr = format!("{}:{}", hostname, spec.port)
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let tcp = TcpListener::bind(addr).await?;
            info!(
                listener = spec.name,
                addr = %tcp.local_addr()?,
                backend_port = spec.backend_port,
                upgrades = spec.upgrades,
                "listener bound"
            );
            let dispatcher = Arc::new(Dispatcher::new(gate.clone(), renderer.clone(), spec));
            listeners.push(Listener { tcp, dispatcher });
        }
        Ok(Self { listeners })
    }

    /// Actual bound addresses, in spec order. Useful with port 0.
    pub fn local_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        self.listeners.iter().map(|l| l.tcp.local_addr()).collect()
    }

    /// Run every accept loop to completion (they only end on listener
    /// failure; per-connection errors never tear a listener down).
    pub async fn serve(self) {
        let mut handles = Vec::with_capacity(self.listeners.len());
        for listener in self.listeners {
            handles.push(tokio::spawn(listener.run()));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("listener task failed: {e}");
            }
        }
    }
}

impl Listener {
    async fn run(self) {
        loop {
            let (stream, peer) = match self.tcp.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept failed: {e}");
                    continue;
                }
            };

            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                let upgrades = dispatcher.spec().upgrades;
                let service = service_fn({
                    let dispatcher = dispatcher.clone();
                    move |req| {
                        let dispatcher = dispatcher.clone();
                        async move { dispatcher.handle(req).await }
                    }
                });

                let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                if upgrades {
                    if let Err(e) = conn.with_upgrades().await {
                        debug!(%peer, "connection ended: {e}");
                    }
                } else if let Err(e) = conn.await {
                    debug!(%peer, "connection ended: {e}");
                }
            });
        }
    }
}
