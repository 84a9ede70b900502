//! Integration tests for the hub actor: registration, command execution
//! and fan-out, driven through `HubHandle`.

use std::time::Duration;

use watchparty_hub::{
    HubConfig, HubError, HubHandle, Registration, spawn_hub_with_clock,
};
use watchparty_protocol::{Command, RoomId, ServerMessage, SessionId};

const NOW: f64 = 1_700_000_000.0;

// =========================================================================
// Helpers
// =========================================================================

fn hub() -> HubHandle {
    spawn_hub_with_clock(HubConfig::default(), || NOW)
}

fn cmd(line: &str) -> Command {
    Command::parse(line).expect("test command should parse")
}

fn room(key: &str) -> RoomId {
    RoomId::new(key)
}

/// Receives the next outbound frame or fails after a second.
async fn next(reg: &mut Registration) -> String {
    tokio::time::timeout(Duration::from_secs(1), reg.outbound.recv())
        .await
        .expect("timed out waiting for outbound frame")
        .expect("outbound queue closed")
        .to_string()
}

/// Asserts that nothing is queued once the hub has caught up.
async fn assert_quiet(hub: &HubHandle, reg: &mut Registration) {
    // A round-trip through the actor orders us after earlier requests.
    hub.session_count().await.unwrap();
    assert!(
        reg.outbound.try_recv().is_err(),
        "unexpected frame for {}",
        reg.session_id
    );
}

async fn join(hub: &HubHandle, reg: &mut Registration, key: &str) {
    hub.execute(reg.session_id, cmd(&format!("join:{key}")))
        .await
        .unwrap();
    assert_eq!(
        next(reg).await,
        format!("accept:{}:{key}", reg.session_id)
    );
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_register_assigns_distinct_ids() {
    let hub = hub();
    let a = hub.register().await.unwrap();
    let b = hub.register().await.unwrap();

    assert_ne!(a.session_id, b.session_id);
    assert_eq!(hub.session_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_unregister_closes_queue_once() {
    let hub = hub();
    let mut a = hub.register().await.unwrap();
    join(&hub, &mut a, "r1").await;

    hub.unregister(a.session_id).await.unwrap();
    hub.unregister(a.session_id).await.unwrap();

    assert!(a.outbound.recv().await.is_none());
    assert!(!hub.is_registered(a.session_id).await.unwrap());
    assert_eq!(hub.room_members(room("r1")).await.unwrap(), Some(vec![]));
    assert_eq!(hub.session_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_watch_party_scenario() {
    let hub = hub();
    let mut a = hub.register().await.unwrap();
    let mut b = hub.register().await.unwrap();

    join(&hub, &mut a, "room1").await;
    join(&hub, &mut b, "room1").await;

    hub.execute(a.session_id, cmd("ready:true")).await.unwrap();
    assert_eq!(next(&mut a).await, "OK");

    hub.execute(b.session_id, cmd("ready:true")).await.unwrap();
    assert_eq!(next(&mut b).await, "ready");
    assert_quiet(&hub, &mut a).await;

    hub.execute(a.session_id, cmd("play!:12.5")).await.unwrap();
    let expected = format!("play:12.5:{}", NOW + 2.0);
    assert_eq!(next(&mut a).await, expected);
    assert_eq!(next(&mut b).await, expected);
}

#[tokio::test]
async fn test_broadcast_reaches_exactly_room_members() {
    let hub = hub();
    let mut a = hub.register().await.unwrap();
    let mut b = hub.register().await.unwrap();
    let mut c = hub.register().await.unwrap();
    let mut lobby = hub.register().await.unwrap();
    join(&hub, &mut a, "r1").await;
    join(&hub, &mut b, "r1").await;
    join(&hub, &mut c, "r2").await;

    hub.execute(b.session_id, cmd("seek!:30")).await.unwrap();

    assert_eq!(next(&mut a).await, "seek:30");
    assert_eq!(next(&mut b).await, "seek:30", "sender receives too");
    assert_quiet(&hub, &mut c).await;
    assert_quiet(&hub, &mut lobby).await;
}

#[tokio::test]
async fn test_external_broadcast_fans_out() {
    let hub = hub();
    let mut a = hub.register().await.unwrap();
    join(&hub, &mut a, "r1").await;

    hub.broadcast(room("r1"), ServerMessage::Resume).await.unwrap();

    assert_eq!(next(&mut a).await, "resume");
}

#[tokio::test]
async fn test_pause_resets_room_readiness() {
    let hub = hub();
    let mut a = hub.register().await.unwrap();
    let mut b = hub.register().await.unwrap();
    join(&hub, &mut a, "r1").await;
    join(&hub, &mut b, "r1").await;
    hub.execute(a.session_id, cmd("ready:true")).await.unwrap();
    next(&mut a).await;
    hub.execute(b.session_id, cmd("ready:true")).await.unwrap();
    assert_eq!(next(&mut b).await, "ready");

    hub.execute(b.session_id, cmd("pause!")).await.unwrap();
    assert_eq!(next(&mut a).await, "pause");
    assert_eq!(next(&mut b).await, "pause");

    hub.execute(a.session_id, cmd("play!:0")).await.unwrap();
    assert_eq!(next(&mut a).await, "reject:non-ready client exists");
    assert_quiet(&hub, &mut b).await;
}

#[tokio::test]
async fn test_sync_reports_offset() {
    let hub = hub();
    let mut a = hub.register().await.unwrap();

    hub.execute(a.session_id, cmd("sync:1699999998")).await.unwrap();

    assert_eq!(next(&mut a).await, "sync:2");
}

#[tokio::test]
async fn test_empty_room_persists_after_last_leave() {
    let hub = hub();
    let mut a = hub.register().await.unwrap();
    join(&hub, &mut a, "r1").await;

    hub.execute(a.session_id, Command::Leave).await.unwrap();
    assert_eq!(next(&mut a).await, "OK");

    assert_eq!(hub.room_members(room("r1")).await.unwrap(), Some(vec![]));
    assert_eq!(hub.room_members(room("never")).await.unwrap(), None);
    assert!(hub.room_exists(room("r1")).await.unwrap());
    assert!(!hub.room_exists(room("never")).await.unwrap());
}

#[tokio::test]
async fn test_slow_member_is_evicted_on_broadcast() {
    let hub = spawn_hub_with_clock(
        HubConfig {
            outbound_capacity: 2,
            ..HubConfig::default()
        },
        || NOW,
    );
    let mut slow = hub.register().await.unwrap();
    let mut fast = hub.register().await.unwrap();
    join(&hub, &mut slow, "r1").await;
    join(&hub, &mut fast, "r1").await;

    // `slow` never drains; its queue fills after two frames.
    for i in 0..3 {
        hub.execute(fast.session_id, cmd(&format!("seek!:{i}")))
            .await
            .unwrap();
        assert_eq!(next(&mut fast).await, format!("seek:{i}"));
    }

    assert!(!hub.is_registered(slow.session_id).await.unwrap());
    assert_eq!(
        hub.room_members(room("r1")).await.unwrap(),
        Some(vec![fast.session_id])
    );
    // Queue drains what it held, then reports closed.
    assert_eq!(next(&mut slow).await, "seek:0");
    assert_eq!(next(&mut slow).await, "seek:1");
    assert!(slow.outbound.recv().await.is_none());
}

#[tokio::test]
async fn test_command_from_unregistered_session_is_dropped() {
    let hub = hub();
    hub.execute(SessionId::from_u128(99), cmd("join:r1")).await.unwrap();
    assert_eq!(hub.room_members(room("r1")).await.unwrap(), None);
}

#[tokio::test]
async fn test_shutdown_closes_queues_and_handle() {
    let hub = hub();
    let mut a = hub.register().await.unwrap();

    hub.shutdown().await.unwrap();

    assert!(a.outbound.recv().await.is_none());
    assert!(matches!(
        hub.register().await,
        Err(HubError::Unavailable)
    ));
    assert!(hub.is_closed());
}
