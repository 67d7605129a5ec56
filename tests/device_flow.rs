//! End-to-end flows through gateway + registry + supervised entities.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use devicehub::{
    apply, shard_of, BackoffPolicy, Bus, CommandKind, Config, EventKind, Gateway, GatewayError,
    JitterPolicy, JournalRef, MembershipOracle, MemoryJournal, Reply, RegistryError,
    ShardRegistry, State, StaticMembership,
};

/// Config tightened for tests: fast heartbeats, fast restarts, no jitter.
fn test_config() -> Config {
    Config {
        heartbeat_interval: Duration::from_millis(50),
        backoff: BackoffPolicy {
            first: Duration::from_millis(30),
            max: Duration::from_millis(200),
            factor: 2.0,
            jitter: JitterPolicy::None,
        },
        ..Config::default()
    }
}

struct Harness {
    gateway: Arc<Gateway>,
    registry: Arc<ShardRegistry>,
    journal: Arc<MemoryJournal>,
    bus: Bus,
    oracle: Arc<StaticMembership>,
    token: CancellationToken,
}

fn harness_with_oracle(oracle: Arc<StaticMembership>) -> Harness {
    let cfg = test_config();
    let journal = Arc::new(MemoryJournal::new());
    let bus = Bus::new(256);
    let token = CancellationToken::new();
    let registry = ShardRegistry::new(
        &cfg,
        Arc::clone(&journal) as JournalRef,
        oracle.clone(),
        bus.clone(),
        token.clone(),
    );
    let gateway = Gateway::new(Arc::clone(&registry), &cfg);
    Harness {
        gateway,
        registry,
        journal,
        bus,
        oracle,
        token,
    }
}

fn harness() -> Harness {
    harness_with_oracle(Arc::new(StaticMembership::single_node("local")))
}

fn started(device: &str) -> devicehub::DeviceEvent {
    devicehub::DeviceEvent::Started {
        device: device.into(),
    }
}

fn stopped(device: &str) -> devicehub::DeviceEvent {
    devicehub::DeviceEvent::Stopped {
        device: device.into(),
    }
}

#[tokio::test]
async fn scenario_start_twice_then_stop() {
    let h = harness();

    assert_eq!(
        h.gateway.request("37", CommandKind::Start).await.unwrap(),
        Reply::Started
    );
    // Second start replies without persisting a second event.
    assert_eq!(
        h.gateway.request("37", CommandKind::Start).await.unwrap(),
        Reply::Started
    );
    assert_eq!(h.journal.event_count("37"), 1);

    assert_eq!(
        h.gateway.request("37", CommandKind::Stop).await.unwrap(),
        Reply::Stopped
    );
    assert_eq!(h.journal.events("37"), vec![started("37"), stopped("37")]);

    // Stop on an idle device is the idempotent no-op.
    assert_eq!(
        h.gateway.request("37", CommandKind::Stop).await.unwrap(),
        Reply::Stopped
    );
    assert_eq!(h.journal.event_count("37"), 2);
}

#[tokio::test]
async fn replay_equivalence_after_cold_recovery() {
    let h = harness();

    for kind in [
        CommandKind::Start,
        CommandKind::Stop,
        CommandKind::Start,
    ] {
        h.gateway.request("37", kind).await.unwrap();
    }

    // The live state must equal the fold of the persisted events.
    let folded = h
        .journal
        .events("37")
        .iter()
        .fold(State::default(), apply);
    assert_eq!(folded, State::Running);

    // Cold recovery: drop the live instance and resolve again. The
    // recovered entity must behave as Running, so Start is a pure reply
    // with no new event.
    assert!(h.registry.passivate("37").await);
    let count = h.journal.event_count("37");
    assert_eq!(
        h.gateway.request("37", CommandKind::Start).await.unwrap(),
        Reply::Started
    );
    assert_eq!(h.journal.event_count("37"), count);
}

#[tokio::test]
async fn concurrent_commands_serialize_per_key() {
    let h = harness();

    // Many concurrent Starts: exactly one event may be persisted.
    let mut handles = Vec::new();
    for _ in 0..16 {
        let gateway = Arc::clone(&h.gateway);
        handles.push(tokio::spawn(async move {
            gateway.request("37", CommandKind::Start).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Reply::Started);
    }
    assert_eq!(h.journal.event_count("37"), 1);

    // Independent keys proceed in parallel without interference.
    let mut handles = Vec::new();
    for i in 0..8 {
        let gateway = Arc::clone(&h.gateway);
        handles.push(tokio::spawn(async move {
            gateway.request(&format!("dev-{i}"), CommandKind::Start).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Reply::Started);
    }
    for i in 0..8 {
        assert_eq!(h.journal.event_count(&format!("dev-{i}")), 1);
    }
}

#[tokio::test]
async fn snapshot_every_fifth_event_with_retention_of_three() {
    let h = harness();

    // 20 alternating commands persist 20 events and snapshot at every 5th.
    for i in 0..20 {
        let kind = if i % 2 == 0 {
            CommandKind::Start
        } else {
            CommandKind::Stop
        };
        h.gateway.request("37", kind).await.unwrap();
    }

    assert_eq!(h.journal.event_count("37"), 20);
    // Snapshots were taken at 5, 10, 15, 20; only the newest three remain.
    assert_eq!(h.journal.snapshot_sequence_nrs("37"), vec![10, 15, 20]);
}

#[tokio::test]
async fn restart_recovers_identity_and_resumes_heartbeat() {
    let h = harness();
    let mut events = h.bus.subscribe();

    h.gateway.request("37", CommandKind::Start).await.unwrap();

    // Break the journal; the in-flight Stop gets no reply and the instance
    // is terminated without mutating state.
    h.journal.fail_writes(true);
    let err = h
        .gateway
        .request("37", CommandKind::Stop)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Timeout { .. }));
    assert_eq!(h.journal.event_count("37"), 1);

    // Heal the journal and wait for the supervised restart: the entity
    // recovers as Running and its synthetic tick emits a heartbeat without
    // any new external Start.
    h.journal.fail_writes(false);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    let mut saw_backoff = false;
    let mut recovered_after_backoff = false;
    loop {
        let ev = tokio::time::timeout_at(deadline, events.recv())
            .await
            .expect("restart events before deadline")
            .expect("bus open");
        match ev.kind {
            EventKind::BackoffScheduled => saw_backoff = true,
            EventKind::EntityRecovered if saw_backoff => recovered_after_backoff = true,
            EventKind::HeartbeatEmitted if recovered_after_backoff => break,
            _ => {}
        }
    }

    // The recovered entity still holds its pre-crash state.
    assert_eq!(
        h.gateway.request("37", CommandKind::Stop).await.unwrap(),
        Reply::Stopped
    );
    assert_eq!(h.journal.events("37"), vec![started("37"), stopped("37")]);
}

#[tokio::test]
async fn remote_owner_is_surfaced_as_unavailable() {
    let oracle = Arc::new(StaticMembership::new(
        "a",
        vec!["a".into(), "b".into()],
    ));
    let h = harness_with_oracle(oracle.clone());
    let shards = test_config().shard_count;

    let remote_key = (0..512)
        .map(|i| format!("dev-{i}"))
        .find(|key| oracle.owner_of(shard_of(key, shards)).unwrap() == "b")
        .expect("some key owned by b");

    let err = h
        .gateway
        .request(&remote_key, CommandKind::Start)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable { .. }));
    assert_eq!(h.journal.event_count(&remote_key), 0);
}

#[tokio::test]
async fn rebalance_evicts_moved_entities_and_recreates_lazily() {
    let h = harness();
    h.registry.spawn_rebalance_listener();
    let shards = test_config().shard_count;

    // A key whose shard moves to the new node once "remote" joins
    // (two-node assignment sends odd shards to the lexicographically
    // later member).
    let moving_key = (0..512)
        .map(|i| format!("dev-{i}"))
        .find(|key| shard_of(key, shards) % 2 == 1)
        .expect("some key on an odd shard");

    h.gateway
        .request(&moving_key, CommandKind::Start)
        .await
        .unwrap();
    assert_eq!(h.registry.live_keys().await, vec![moving_key.clone()]);

    // Membership change: the shard now belongs to the other node; the live
    // entity is torn down here.
    h.oracle.add_node("remote");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if h.registry.live_keys().await.is_empty() {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "eviction before deadline"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(
        h.registry.resolve(&moving_key).await,
        Err(RegistryError::NotOwner { .. })
    ));

    // The node departs again: the key is ours once more, recreated through
    // recovery with its state intact.
    h.oracle.remove_node("remote");
    assert_eq!(
        h.gateway
            .request(&moving_key, CommandKind::Start)
            .await
            .unwrap(),
        Reply::Started
    );
    assert_eq!(h.journal.event_count(&moving_key), 1);

    h.token.cancel();
}
