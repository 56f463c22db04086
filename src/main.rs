//! Atrium Gate — authenticating workspace gateway
//!
//! A single-process reverse proxy that routes inbound HTTP and WebSocket
//! traffic to per-user backend workspaces, authenticating every connection
//! against a cached workspace record keyed by user identity.
//!
//! Usage:
//!   atrium-gate --directory-url http://directory:9000              # defaults
//!   atrium-gate --directory-url ... --port 8443                    # custom primary port
//!   atrium-gate --directory-url ... --secondary 9090:8080          # extra listener
//!   atrium-gate --directory-url ... --mode polling                 # no local snapshot

mod directory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gate_cache::{DirectoryClient, MemorySharedCache, SharedCache, WorkspaceCache};
use gate_proxy::{AuthGate, ErrorRenderer, HtmlErrorRenderer, ListenerSet, ListenerSpec};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::directory::HttpDirectoryClient;

/// `listen:backend` port pair for a secondary listener.
#[derive(Debug, Clone, Copy)]
struct PortPair {
    listen: u16,
    backend: u16,
}

impl FromStr for PortPair {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (listen, backend) = s
            .split_once(':')
            .ok_or_else(|| format!("expected LISTEN:BACKEND, got {s:?}"))?;
        Ok(Self {
            listen: listen.parse().map_err(|e| format!("bad listen port: {e}"))?,
            backend: backend.parse().map_err(|e| format!("bad backend port: {e}"))?,
        })
    }
}

impl fmt::Display for PortPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.listen, self.backend)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CacheMode {
    /// Every fetch consults the shared store directly.
    Polling,
    /// Local snapshot kept consistent via the invalidation feed.
    Streaming,
}

#[derive(Parser, Debug)]
#[command(name = "atrium-gate", about = "Atrium Gate — authenticating workspace gateway")]
struct Cli {
    /// Primary listener port (ordinary requests + protocol upgrades,
    /// forwarded to backend port 80)
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Hostname to bind all listeners to
    #[arg(long, default_value = "0.0.0.0")]
    hostname: String,

    /// Secondary listeners as LISTEN:BACKEND port pairs (repeatable)
    #[arg(long = "secondary", value_name = "LISTEN:BACKEND", default_values_t = [PortPair { listen: 8081, backend: 8080 }])]
    secondary: Vec<PortPair>,

    /// Workspace cache operating mode
    #[arg(long, value_enum, default_value_t = CacheMode::Streaming)]
    mode: CacheMode,

    /// Base URL of the authoritative workspace directory
    #[arg(long)]
    directory_url: String,

    /// Label identifying this gateway instance on error pages
    /// (defaults to $HOSTNAME)
    #[arg(long)]
    instance_label: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

// The scheduler is deliberately single-threaded: one cooperative task per
// connection plus the invalidation feed task, no preemption mid-mutation.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Component graph, built sequentially: shared store → directory →
    // cache → gate → listeners. Everything downstream holds the one
    // WorkspaceCache instance through the gate.
    let shared: Arc<dyn SharedCache> = Arc::new(MemorySharedCache::new());
    info!("using in-process shared cache");

    let directory: Arc<dyn DirectoryClient> =
        Arc::new(HttpDirectoryClient::new(&cli.directory_url));
    info!(url = %cli.directory_url, "directory client ready");

    let cache = Arc::new(match cli.mode {
        CacheMode::Polling => WorkspaceCache::polling(shared, directory),
        CacheMode::Streaming => WorkspaceCache::streaming(shared, directory),
    });
    cache
        .start()
        .await
        .context("failed to subscribe to the invalidation feed")?;
    info!(mode = ?cli.mode, "workspace cache ready");

    let gate = Arc::new(AuthGate::new(cache));

    let instance_label = cli
        .instance_label
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "atrium-gate".to_string());
    let renderer: Arc<dyn ErrorRenderer> = Arc::new(HtmlErrorRenderer::new(instance_label));

    let mut specs = vec![ListenerSpec::primary(cli.port)];
    for pair in &cli.secondary {
        specs.push(ListenerSpec::secondary(pair.listen, pair.backend));
    }

    // A bind failure is the one fatal error in this process.
    let listeners = ListenerSet::bind(&cli.hostname, specs, gate, renderer)
        .await
        .context("failed to bind listeners")?;

    for addr in listeners.local_addrs().context("failed to read listener addresses")? {
        info!(%addr, "serving");
    }

    tokio::select! {
        _ = listeners.serve() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    Ok(())
}
