//! devicehub server binary.
//!
//! Starts a single-node devicehub with the in-memory journal and the HTTP
//! gateway. The listen port comes from `DEVICEHUB_HTTP_PORT` (default 8080);
//! log verbosity from `RUST_LOG` (default `info`).

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use devicehub::{Config, LogWriter, MemoryJournal, Node, StaticMembership, Subscribe};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("DEVICEHUB_HTTP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let cfg = Config::default();
    let journal = Arc::new(MemoryJournal::new());
    let oracle = Arc::new(StaticMembership::single_node("local"));
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let node = Node::new(cfg, journal, oracle, subscribers);
    node.run(addr).await?;
    Ok(())
}
