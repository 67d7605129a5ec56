//! Node: component wiring and graceful shutdown.
//!
//! A [`Node`] owns one journal handle, one event bus, one shard registry,
//! and one gateway. [`Node::run`] serves the HTTP surface until a
//! termination signal arrives, then cancels the runtime token and waits for
//! every live entity to stop within the configured grace period.
//!
//! ```text
//! Node::run(addr)
//!   ├─► subscriber listener: Bus ─► SubscriberSet::emit (fire-and-forget)
//!   ├─► registry rebalance listener
//!   ├─► axum::serve(router) ... until signal
//!   └─► shutdown:
//!         ├─► publish ShutdownRequested, cancel runtime token
//!         ├─► registry.cancel_all() bounded by Config::grace
//!         ├─► Ok  → publish AllStoppedWithin
//!         └─► late → publish GraceExceeded, Err with stuck keys
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::gateway::{router, Gateway};
use crate::journal::JournalRef;
use crate::registry::{MembershipOracle, ShardRegistry};
use crate::runtime::shutdown;
use crate::subscribers::{Subscribe, SubscriberSet};

/// One devicehub process: registry + gateway + HTTP surface.
pub struct Node {
    cfg: Config,
    bus: Bus,
    registry: Arc<ShardRegistry>,
    gateway: Arc<Gateway>,
    subs: Arc<SubscriberSet>,
    runtime_token: CancellationToken,
}

impl Node {
    /// Wires a node from its collaborators.
    pub fn new(
        cfg: Config,
        journal: JournalRef,
        oracle: Arc<dyn MembershipOracle>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();
        let registry = ShardRegistry::new(
            &cfg,
            journal,
            oracle,
            bus.clone(),
            runtime_token.clone(),
        );
        let gateway = Gateway::new(Arc::clone(&registry), &cfg);
        let subs = Arc::new(SubscriberSet::new(subscribers));

        Self {
            cfg,
            bus,
            registry,
            gateway,
            subs,
            runtime_token,
        }
    }

    /// The node's ask gateway; useful for embedding without HTTP.
    pub fn gateway(&self) -> Arc<Gateway> {
        Arc::clone(&self.gateway)
    }

    /// The node's shard registry.
    pub fn registry(&self) -> Arc<ShardRegistry> {
        Arc::clone(&self.registry)
    }

    /// The node's event bus.
    pub fn bus(&self) -> Bus {
        self.bus.clone()
    }

    /// Serves the HTTP surface on `addr` until a termination signal, then
    /// shuts down within [`Config::grace`].
    pub async fn run(self, addr: SocketAddr) -> Result<(), RuntimeError> {
        self.subscriber_listener();
        self.registry.spawn_rebalance_listener();

        let listener = TcpListener::bind(addr).await.map_err(RuntimeError::Http)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(%local, "devicehub listening");
        }

        let app = router(Arc::clone(&self.gateway));
        let signal_bus = self.bus.clone();
        let signal_token = self.runtime_token.clone();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown::wait_for_shutdown_signal().await;
                signal_bus.publish(Event::new(EventKind::ShutdownRequested));
                signal_token.cancel();
            })
            .await
            .map_err(RuntimeError::Http)?;

        self.drain_with_grace().await
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget).
    fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            while let Ok(ev) = rx.recv().await {
                set.emit(&ev);
            }
        });
    }

    /// Waits for all entities to stop within the configured grace period.
    async fn drain_with_grace(&self) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        match time::timeout(grace, self.registry.cancel_all()).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                self.bus.publish(Event::new(EventKind::GraceExceeded));
                let stuck = self.registry.live_keys().await;
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}
