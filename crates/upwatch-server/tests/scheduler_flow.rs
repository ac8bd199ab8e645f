//! End-to-end scheduler passes against the in-memory store: heartbeat
//! misses, health-check failures, maintenance resume, dispatch health
//! pushes and rollup tiering.

use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use upwatch_common::events::NoopBroadcaster;
use upwatch_common::types::{
    Alert, AlertType, EventKind, Granularity, HealthCheckSettings, Monitor, MonitorEvent,
    MonitorKind, Service, ServiceState, Severity,
};
use upwatch_engine::state::StateMachine;
use upwatch_notify::dispatcher::AlertDispatcher;
use upwatch_notify::plugin::ChannelRegistry;
use upwatch_server::config::RetentionConfig;
use upwatch_server::peer::PeerNotifier;
use upwatch_server::scheduler::dispatch::AlertDispatchScheduler;
use upwatch_server::scheduler::health::HealthCheckScheduler;
use upwatch_server::scheduler::heartbeat::HeartbeatWatchScheduler;
use upwatch_server::scheduler::maintenance::MaintenanceResumeScheduler;
use upwatch_server::scheduler::retention::EventRetentionScheduler;
use upwatch_server::scheduler::rollup::RollupScheduler;
use upwatch_store::memory::MemoryStore;
use upwatch_store::{AlertStore, EventStore, MonitorStore, RollupStore, ServiceStore};

fn state_machine(store: &Arc<MemoryStore>) -> Arc<StateMachine> {
    Arc::new(StateMachine::new(store.clone(), Arc::new(NoopBroadcaster)))
}

async fn seed_service(store: &Arc<MemoryStore>, state: ServiceState) -> Service {
    let mut service = Service::new("api", Severity::High);
    service.state = state;
    store.add_service(service.clone()).await.unwrap();
    service
}

fn monitor_base(service_id: &str, kind: MonitorKind) -> Monitor {
    let now = Utc::now();
    Monitor {
        id: upwatch_common::id::next_id(),
        service_id: service_id.to_string(),
        kind,
        token: format!("tok-{}", upwatch_common::id::next_id()),
        interval_secs: 60,
        grace_period_secs: 30,
        last_check_in: None,
        health_check: None,
        metric: None,
        created_at: now,
        updated_at: now,
    }
}

/// Minimal HTTP stub: answers every connection with the given status line
/// and body, counting hits.
async fn spawn_http_stub(
    status_line: &'static str,
    body: &'static str,
) -> (std::net::SocketAddr, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_handle = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            hits_handle.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });
    (addr, hits)
}

// ── Heartbeat watch ──

#[tokio::test]
async fn missed_heartbeat_takes_service_down_with_one_alert() {
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;

    // interval 60 + grace 30, silent for 100s: overdue.
    let mut monitor = monitor_base(&service.id, MonitorKind::Heartbeat);
    monitor.last_check_in = Some(Utc::now() - Duration::seconds(100));
    store.add_monitor(monitor.clone()).await.unwrap();

    let scheduler = HeartbeatWatchScheduler::new(store.clone(), state_machine(&store), 10);
    scheduler.pass().await.unwrap();

    let stored = store.get_service(&service.id).await.unwrap();
    assert_eq!(stored.state, ServiceState::Down);

    let alerts = store.alerts_for_service(&service.id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::MissedHeartbeat);

    // A second pass is a no-op: already Down.
    scheduler.pass().await.unwrap();
    assert_eq!(store.alerts_for_service(&service.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn heartbeat_within_grace_is_left_alone() {
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;

    let mut monitor = monitor_base(&service.id, MonitorKind::Heartbeat);
    monitor.last_check_in = Some(Utc::now() - Duration::seconds(80)); // < 60 + 30
    store.add_monitor(monitor).await.unwrap();

    HeartbeatWatchScheduler::new(store.clone(), state_machine(&store), 10)
        .pass()
        .await
        .unwrap();
    assert_eq!(
        store.get_service(&service.id).await.unwrap().state,
        ServiceState::Up
    );
}

#[tokio::test]
async fn paused_service_is_never_taken_down_by_heartbeat_watch() {
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Paused).await;

    let mut monitor = monitor_base(&service.id, MonitorKind::Heartbeat);
    monitor.last_check_in = Some(Utc::now() - Duration::seconds(1000));
    store.add_monitor(monitor).await.unwrap();

    HeartbeatWatchScheduler::new(store.clone(), state_machine(&store), 10)
        .pass()
        .await
        .unwrap();
    assert_eq!(
        store.get_service(&service.id).await.unwrap().state,
        ServiceState::Paused
    );
    assert!(store.alerts_for_service(&service.id).await.unwrap().is_empty());
}

// ── Health check ──

fn health_monitor(service_id: &str, url: String, expected: Vec<u16>) -> Monitor {
    let mut monitor = monitor_base(service_id, MonitorKind::HealthCheck);
    monitor.health_check = Some(HealthCheckSettings {
        url,
        method: "GET".to_string(),
        expected_status_codes: expected,
        body_pattern: None,
        timeout_secs: 5,
    });
    monitor
}

#[tokio::test]
async fn health_check_records_unexpected_status() {
    let (addr, _) = spawn_http_stub("503 Service Unavailable", "upstream down").await;
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;
    let monitor = health_monitor(&service.id, format!("http://{addr}/health"), vec![200]);
    store.add_monitor(monitor.clone()).await.unwrap();

    HealthCheckScheduler::new(
        store.clone(),
        state_machine(&store),
        reqwest::Client::new(),
        10,
    )
    .pass()
    .await
    .unwrap();

    let events = store
        .events_in_range(
            &monitor.id,
            Utc::now() - Duration::minutes(1),
            Utc::now() + Duration::minutes(1),
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Poll);
    assert!(!events[0].success);
    assert!(events[0]
        .message
        .as_deref()
        .unwrap()
        .contains("Unexpected status code: 503"));
    assert!(events[0].value.is_some(), "elapsed ms recorded");

    let stored = store.get_service(&service.id).await.unwrap();
    assert_eq!(stored.state, ServiceState::Down);
    let alerts = store.alerts_for_service(&service.id).await.unwrap();
    assert_eq!(alerts[0].alert_type, AlertType::FailedHealthCheck);

    assert!(
        store
            .get_monitor(&monitor.id)
            .await
            .unwrap()
            .last_check_in
            .is_some(),
        "last check-in stamped"
    );
}

#[tokio::test]
async fn health_check_success_brings_service_up() {
    let (addr, _) = spawn_http_stub("200 OK", "ok").await;
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Down).await;
    let monitor = health_monitor(&service.id, format!("http://{addr}/health"), vec![200]);
    store.add_monitor(monitor).await.unwrap();

    HealthCheckScheduler::new(
        store.clone(),
        state_machine(&store),
        reqwest::Client::new(),
        10,
    )
    .pass()
    .await
    .unwrap();

    let stored = store.get_service(&service.id).await.unwrap();
    assert_eq!(stored.state, ServiceState::Up);
    // Down -> Up produced a recovery alert.
    let alerts = store.alerts_for_service(&service.id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::Recovery);
}

#[tokio::test]
async fn health_check_body_pattern_mismatch_fails() {
    let (addr, _) = spawn_http_stub("200 OK", "status: degraded").await;
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;
    let mut monitor = health_monitor(&service.id, format!("http://{addr}/health"), vec![200]);
    monitor.health_check.as_mut().unwrap().body_pattern = Some("status: ok".to_string());
    store.add_monitor(monitor.clone()).await.unwrap();

    HealthCheckScheduler::new(
        store.clone(),
        state_machine(&store),
        reqwest::Client::new(),
        10,
    )
    .pass()
    .await
    .unwrap();

    let events = store
        .events_in_range(
            &monitor.id,
            Utc::now() - Duration::minutes(1),
            Utc::now() + Duration::minutes(1),
        )
        .await
        .unwrap();
    assert!(events[0]
        .message
        .as_deref()
        .unwrap()
        .contains("did not match"));
    assert_eq!(
        store.get_service(&service.id).await.unwrap().state,
        ServiceState::Down
    );
}

#[tokio::test]
async fn health_check_connection_error_fails() {
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;
    // Nothing listens here; connection is refused immediately.
    let monitor = health_monitor(&service.id, "http://127.0.0.1:1/health".to_string(), vec![200]);
    store.add_monitor(monitor.clone()).await.unwrap();

    HealthCheckScheduler::new(
        store.clone(),
        state_machine(&store),
        reqwest::Client::new(),
        10,
    )
    .pass()
    .await
    .unwrap();

    let events = store
        .events_in_range(
            &monitor.id,
            Utc::now() - Duration::minutes(1),
            Utc::now() + Duration::minutes(1),
        )
        .await
        .unwrap();
    assert!(events[0]
        .message
        .as_deref()
        .unwrap()
        .contains("Connection error"));
}

#[tokio::test]
async fn health_check_skips_monitors_not_due() {
    let (addr, hits) = spawn_http_stub("200 OK", "ok").await;
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;
    let mut monitor = health_monitor(&service.id, format!("http://{addr}/health"), vec![200]);
    monitor.last_check_in = Some(Utc::now()); // just polled
    store.add_monitor(monitor).await.unwrap();

    HealthCheckScheduler::new(
        store.clone(),
        state_machine(&store),
        reqwest::Client::new(),
        10,
    )
    .pass()
    .await
    .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

// ── Maintenance resume ──

#[tokio::test]
async fn elapsed_maintenance_window_resumes_to_unknown() {
    let store = Arc::new(MemoryStore::new());
    let mut service = Service::new("api", Severity::High);
    service.state = ServiceState::Paused;
    service.auto_resume = true;
    service.paused_until = Some(Utc::now() - Duration::minutes(1));
    store.add_service(service.clone()).await.unwrap();

    // A second paused service without auto-resume must stay paused.
    let mut manual = Service::new("batch", Severity::Low);
    manual.state = ServiceState::Paused;
    manual.paused_until = Some(Utc::now() - Duration::minutes(1));
    store.add_service(manual.clone()).await.unwrap();

    MaintenanceResumeScheduler::new(store.clone(), state_machine(&store), 60)
        .pass()
        .await
        .unwrap();

    assert_eq!(
        store.get_service(&service.id).await.unwrap().state,
        ServiceState::Unknown
    );
    assert_eq!(
        store.get_service(&manual.id).await.unwrap().state,
        ServiceState::Paused
    );
}

// ── Alert dispatch + peer health flag ──

fn dispatch_scheduler(
    store: &Arc<MemoryStore>,
    peer_client_timeout_secs: u64,
) -> AlertDispatchScheduler {
    let dispatcher = Arc::new(AlertDispatcher::new(
        store.clone(),
        ChannelRegistry::default(),
        Arc::new(NoopBroadcaster),
    ));
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(peer_client_timeout_secs))
        .build()
        .unwrap();
    let notifier = Arc::new(PeerNotifier::new(store.clone(), client.clone(), client));
    AlertDispatchScheduler::new(store.clone(), dispatcher, notifier, 5)
}

#[tokio::test]
async fn dispatch_pass_marks_alert_without_channels() {
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Down).await;
    let alert = Alert::new(&service, AlertType::Failure, "down");
    store.add_alert(alert.clone()).await.unwrap();

    dispatch_scheduler(&store, 5).pass().await.unwrap();

    // No contacts and no fallback channels: nothing to attempt, the alert
    // is considered fully dispatched rather than retried forever.
    assert!(store
        .get_alert(&alert.id)
        .await
        .unwrap()
        .dispatched_at
        .is_some());
    assert!(store.pending_alerts().await.unwrap().is_empty());
}

#[tokio::test]
async fn dispatch_failure_notifies_peers_once_per_transition() {
    let (addr, hits) = spawn_http_stub("200 OK", "").await;
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Down).await;

    // A peer to receive fail/recover pushes.
    let now = Utc::now();
    upwatch_store::PeerStore::add_peer(
        store.as_ref(),
        upwatch_common::types::Peer {
            id: upwatch_common::id::next_id(),
            service_id: service.id.clone(),
            name: "secondary".to_string(),
            url: format!("http://{addr}"),
            heartbeat_token: "hb".to_string(),
            webhook_token: "wh".to_string(),
            heartbeat_interval_secs: 60,
            paired_at: now,
            created_at: now,
        },
    )
    .await
    .unwrap();

    // A contact channel whose webhook target refuses connections makes the
    // dispatch fail.
    let contact = upwatch_common::types::Contact {
        id: upwatch_common::id::next_id(),
        name: "ops".to_string(),
        is_default: true,
        created_at: now,
    };
    upwatch_store::ContactStore::add_contact(store.as_ref(), contact.clone())
        .await
        .unwrap();
    upwatch_store::ContactStore::add_channel(
        store.as_ref(),
        upwatch_common::types::ContactChannel {
            id: upwatch_common::id::next_id(),
            contact_id: contact.id.clone(),
            channel_type: "webhook".to_string(),
            enabled: true,
            config: serde_json::json!({"url": "http://127.0.0.1:1/hook"}),
            created_at: now,
        },
    )
    .await
    .unwrap();

    let alert = Alert::new(&service, AlertType::Failure, "down");
    store.add_alert(alert.clone()).await.unwrap();

    let scheduler = dispatch_scheduler(&store, 5);

    // First failing pass flips healthy -> unhealthy: one `fail` push.
    scheduler.pass().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(store
        .get_alert(&alert.id)
        .await
        .unwrap()
        .dispatched_at
        .is_none());

    // Still failing: no duplicate push.
    scheduler.pass().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // The stuck alert goes away and the next pending alert belongs to a
    // service whose linked contact has a reachable channel: the pass
    // succeeds and exactly one `recover` push goes out.
    store.mark_dispatched(&alert.id, Utc::now()).await.unwrap();
    let (ok_addr, _) = spawn_http_stub("200 OK", "").await;
    let healthy_service = {
        let mut s = Service::new("worker", Severity::Low);
        s.state = ServiceState::Down;
        store.add_service(s.clone()).await.unwrap();
        s
    };
    let ops = upwatch_common::types::Contact {
        id: upwatch_common::id::next_id(),
        name: "oncall".to_string(),
        is_default: false,
        created_at: now,
    };
    upwatch_store::ContactStore::add_contact(store.as_ref(), ops.clone())
        .await
        .unwrap();
    upwatch_store::ContactStore::link_contact(store.as_ref(), &healthy_service.id, &ops.id)
        .await
        .unwrap();
    upwatch_store::ContactStore::add_channel(
        store.as_ref(),
        upwatch_common::types::ContactChannel {
            id: upwatch_common::id::next_id(),
            contact_id: ops.id.clone(),
            channel_type: "webhook".to_string(),
            enabled: true,
            config: serde_json::json!({"url": format!("http://{ok_addr}/hook")}),
            created_at: now,
        },
    )
    .await
    .unwrap();
    let fresh = Alert::new(&healthy_service, AlertType::Failure, "down");
    store.add_alert(fresh.clone()).await.unwrap();

    scheduler.pass().await.unwrap();
    assert!(store
        .get_alert(&fresh.id)
        .await
        .unwrap()
        .dispatched_at
        .is_some());
    assert_eq!(hits.load(Ordering::SeqCst), 2, "one recover push");

    // Healthy again: further clean passes push nothing.
    let another = Alert::new(&healthy_service, AlertType::Recovery, "back");
    store.add_alert(another).await.unwrap();
    scheduler.pass().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

// ── Rollup + retention ──

fn past_event(monitor: &Monitor, value: f64, at: chrono::DateTime<Utc>) -> MonitorEvent {
    MonitorEvent {
        id: upwatch_common::id::next_id(),
        monitor_id: monitor.id.clone(),
        service_id: monitor.service_id.clone(),
        kind: EventKind::Metric,
        success: true,
        value: Some(value),
        out_of_range: false,
        message: None,
        timestamp: at,
        created_at: at,
    }
}

#[tokio::test]
async fn rollup_pass_covers_completed_hour() {
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;
    let monitor = monitor_base(&service.id, MonitorKind::Metric);
    store.add_monitor(monitor.clone()).await.unwrap();

    let now = Utc::now();
    let hour_start = Granularity::Hourly.period_start(now - Duration::hours(1));
    store
        .add_event(past_event(&monitor, 10.0, hour_start + Duration::minutes(5)))
        .await
        .unwrap();
    store
        .add_event(past_event(&monitor, 20.0, hour_start + Duration::minutes(25)))
        .await
        .unwrap();
    // An event in the current hour must not leak into the rollup.
    store
        .add_event(past_event(&monitor, 999.0, now))
        .await
        .unwrap();

    RollupScheduler::new(store.clone(), 3600)
        .pass(now)
        .await
        .unwrap();

    let rollups = store
        .rollups_in_range(
            &monitor.id,
            Granularity::Hourly,
            hour_start,
            hour_start + Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(rollups.len(), 1);
    assert_eq!(rollups[0].count, 2);
    assert_eq!(rollups[0].mean, Some(15.0));

    // Running the pass again replaces rather than duplicates.
    RollupScheduler::new(store.clone(), 3600)
        .pass(now)
        .await
        .unwrap();
    let rollups = store
        .rollups_in_range(
            &monitor.id,
            Granularity::Hourly,
            hour_start,
            hour_start + Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(rollups.len(), 1);
}

#[tokio::test]
async fn daily_rollup_waits_for_hourly_tier() {
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;
    let monitor = monitor_base(&service.id, MonitorKind::Metric);
    store.add_monitor(monitor.clone()).await.unwrap();

    let now = Utc::now();
    let yesterday = Granularity::Daily.period_start(now - Duration::days(1));
    store
        .add_event(past_event(&monitor, 5.0, yesterday + Duration::hours(3)))
        .await
        .unwrap();

    // No hourly rollups for yesterday yet: the daily tier is gated off.
    RollupScheduler::new(store.clone(), 3600)
        .pass(now)
        .await
        .unwrap();
    let dailies = store
        .rollups_in_range(
            &monitor.id,
            Granularity::Daily,
            yesterday,
            yesterday + Duration::days(1),
        )
        .await
        .unwrap();
    // The gate opens only if an hourly rollup exists for some hour of
    // yesterday, which the hourly step of this pass does not produce
    // (it only covers the just-completed hour).
    assert!(dailies.is_empty());

    // Simulate the hourly tier having been built during yesterday.
    let hourly = upwatch_engine::rollup::compute(
        &[past_event(&monitor, 5.0, yesterday + Duration::hours(3))],
        &monitor.id,
        &service.id,
        Granularity::Hourly,
        yesterday + Duration::hours(3),
    );
    store.upsert_rollup(hourly).await.unwrap();

    RollupScheduler::new(store.clone(), 3600)
        .pass(now)
        .await
        .unwrap();
    let dailies = store
        .rollups_in_range(
            &monitor.id,
            Granularity::Daily,
            yesterday,
            yesterday + Duration::days(1),
        )
        .await
        .unwrap();
    assert_eq!(dailies.len(), 1);
    assert_eq!(dailies[0].count, 1);

    // With dailies in place the weekly tier follows on the next pass.
    RollupScheduler::new(store.clone(), 3600)
        .pass(now)
        .await
        .unwrap();
    let week_start = Granularity::Weekly.period_start(yesterday);
    let weeklies = store
        .rollups_in_range(
            &monitor.id,
            Granularity::Weekly,
            week_start,
            week_start + Duration::days(7),
        )
        .await
        .unwrap();
    assert_eq!(weeklies.len(), 1);
}

#[tokio::test]
async fn retention_sweep_respects_tier_windows() {
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Up).await;
    let monitor = monitor_base(&service.id, MonitorKind::Metric);
    store.add_monitor(monitor.clone()).await.unwrap();

    let now = Utc::now();
    store
        .add_event(past_event(&monitor, 1.0, now - Duration::days(8)))
        .await
        .unwrap();
    store
        .add_event(past_event(&monitor, 2.0, now - Duration::days(1)))
        .await
        .unwrap();

    // One expired hourly rollup, one monthly far past every window.
    let old_hour = Granularity::Hourly.period_start(now - Duration::days(40));
    store
        .upsert_rollup(upwatch_engine::rollup::compute(
            &[],
            &monitor.id,
            &service.id,
            Granularity::Hourly,
            old_hour,
        ))
        .await
        .unwrap();
    let old_month = Granularity::Monthly.period_start(now - Duration::days(900));
    store
        .upsert_rollup(upwatch_engine::rollup::compute(
            &[],
            &monitor.id,
            &service.id,
            Granularity::Monthly,
            old_month,
        ))
        .await
        .unwrap();

    EventRetentionScheduler::new(store.clone(), RetentionConfig::default(), 3600)
        .pass()
        .await
        .unwrap();

    let events = store
        .events_in_range(&monitor.id, now - Duration::days(30), now + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(events.len(), 1, "only the 8-day-old event was swept");

    let hourly = store
        .rollups_in_range(
            &monitor.id,
            Granularity::Hourly,
            old_hour - Duration::days(1),
            old_hour + Duration::days(1),
        )
        .await
        .unwrap();
    assert!(hourly.is_empty(), "expired hourly rollup removed");

    let monthly = store
        .rollups_in_range(
            &monitor.id,
            Granularity::Monthly,
            old_month - Duration::days(1),
            old_month + Duration::days(1),
        )
        .await
        .unwrap();
    assert_eq!(monthly.len(), 1, "monthly rollups are retained forever");
}

// ── Peer heartbeat cadence ──

#[tokio::test]
async fn peer_heartbeat_respects_per_peer_interval() {
    let (addr, hits) = spawn_http_stub("200 OK", "").await;
    let store = Arc::new(MemoryStore::new());
    let service = seed_service(&store, ServiceState::Unknown).await;

    let now = Utc::now();
    upwatch_store::PeerStore::add_peer(
        store.as_ref(),
        upwatch_common::types::Peer {
            id: upwatch_common::id::next_id(),
            service_id: service.id.clone(),
            name: "secondary".to_string(),
            url: format!("http://{addr}"),
            heartbeat_token: "hb-token".to_string(),
            webhook_token: "wh-token".to_string(),
            heartbeat_interval_secs: 3600,
            paired_at: now,
            created_at: now,
        },
    )
    .await
    .unwrap();

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap();
    let notifier = Arc::new(PeerNotifier::new(store.clone(), client.clone(), client));
    let scheduler = upwatch_server::scheduler::peer_heartbeat::PeerHeartbeatScheduler::new(
        store.clone(),
        notifier,
        10,
    );

    // Never sent before: due immediately.
    scheduler.pass().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // The peer's own hour-long interval has not elapsed; the task tick
    // alone does not make it due again.
    scheduler.pass().await.unwrap();
    scheduler.pass().await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ── Cancellation ──

#[tokio::test]
async fn scheduler_loops_stop_promptly_on_cancel() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        HeartbeatWatchScheduler::new(store.clone(), state_machine(&store), 3600)
            .run(cancel.clone()),
    );

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("loop must observe cancellation promptly")
        .unwrap();
}
