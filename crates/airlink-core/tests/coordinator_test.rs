#![allow(clippy::unwrap_used)]
// Integration tests for the coordinator: gate serialization, the
// staged-vs-direct write race, debounced refresh requests, timeouts,
// and the periodic polling loop. All timing uses tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use airlink_core::{Coordinator, CoordinatorConfig, CoreError};
use airlink_device::{Access, DeviceHandle, PropertyKind, PropertyTable, SimulatedDevice};

// ── Helpers ─────────────────────────────────────────────────────────

fn device() -> Arc<SimulatedDevice> {
    let table = PropertyTable::new()
        .with("target_temperature", PropertyKind::Decimal, Access::ReadWrite)
        .with("fan_speed", PropertyKind::Integer, Access::ReadWrite)
        .with("indoor_temperature", PropertyKind::Decimal, Access::ReadOnly);
    let device = SimulatedDevice::new("sim-1", table);
    device.seed("target_temperature", 25.0);
    device.seed("indoor_temperature", 21.0);
    Arc::new(device)
}

fn on_demand_only() -> CoordinatorConfig {
    CoordinatorConfig {
        refresh_interval: Duration::ZERO,
        debounce_cooldown: Duration::from_secs(1),
        network_timeout: Duration::from_secs(30),
    }
}

// ── The designed race ───────────────────────────────────────────────
//
// A refresh takes one second. Halfway through, a caller writes
// target_temperature = 10 and applies. The refresh concludes by
// reporting target_temperature = 20.

#[tokio::test(start_paused = true)]
async fn direct_write_is_clobbered_by_concurrent_refresh() {
    let device = device();
    device.set_refresh_latency(Duration::from_secs(1));
    device.push_refresh_state(vec![("target_temperature".into(), 20.0.into())]);

    let coordinator = Coordinator::new(Arc::clone(&device), on_demand_only());

    let refresh = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.refresh().await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;

    // Bypass staging: the write lands on the live state immediately.
    coordinator
        .proxy()
        .set_direct("target_temperature", 10.0)
        .unwrap();
    coordinator.apply().await.unwrap();
    refresh.await.unwrap().unwrap();

    // Last network response wins -- the user's 10.0 is gone. This is
    // the documented failure mode of unstaged writes.
    assert_eq!(
        coordinator.proxy().get("target_temperature").unwrap(),
        Some(20.0.into())
    );
}

#[tokio::test(start_paused = true)]
async fn staged_write_survives_concurrent_refresh() {
    let device = device();
    device.set_refresh_latency(Duration::from_secs(1));
    device.push_refresh_state(vec![("target_temperature".into(), 20.0.into())]);

    let coordinator = Coordinator::new(Arc::clone(&device), on_demand_only());

    let refresh = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.refresh().await })
    };

    tokio::time::sleep(Duration::from_millis(500)).await;

    // Staged: the write waits in the proxy, immune to the refresh.
    coordinator.proxy().set("target_temperature", 10.0).unwrap();
    coordinator.apply().await.unwrap();
    refresh.await.unwrap().unwrap();

    // apply() flattened the staged value over the refreshed live state
    // before committing: user intent wins.
    assert_eq!(
        coordinator.proxy().get("target_temperature").unwrap(),
        Some(10.0.into())
    );
    assert_eq!(
        device.get_property("target_temperature"),
        Some(10.0.into())
    );
}

// ── Gate serialization ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_callers_never_overlap_network_operations() {
    let device = device();
    device.set_refresh_latency(Duration::from_millis(100));
    device.set_commit_latency(Duration::from_millis(100));

    let coordinator = Coordinator::new(Arc::clone(&device), on_demand_only());

    let mut tasks = Vec::new();
    for i in 0..10 {
        let coordinator = coordinator.clone();
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                coordinator.refresh().await
            } else {
                coordinator.apply().await
            }
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(device.max_in_flight(), 1, "gate must serialize all I/O");
    assert_eq!(device.refresh_count(), 5);
    assert_eq!(device.commit_count(), 5);
}

// ── Timeouts ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn timeout_surfaces_and_releases_the_gate() {
    let device = device();
    device.set_refresh_latency(Duration::from_secs(120));

    let config = CoordinatorConfig {
        network_timeout: Duration::from_secs(5),
        ..on_demand_only()
    };
    let coordinator = Coordinator::new(Arc::clone(&device), config);

    let err = coordinator.refresh().await.unwrap_err();
    assert!(matches!(err, CoreError::Timeout { timeout_secs: 5 }));
    assert!(err.is_recoverable());
    assert!(!coordinator.is_available());

    // The gate is free again: a fast operation goes straight through.
    device.set_refresh_latency(Duration::ZERO);
    coordinator.refresh().await.unwrap();
    assert!(coordinator.is_available());
}

// ── Debounced on-demand refresh ─────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn rapid_refresh_requests_coalesce() {
    let device = device();
    let coordinator = Coordinator::new(Arc::clone(&device), on_demand_only());
    coordinator.start().await;

    // Five requests inside one cooldown window.
    for _ in 0..5 {
        coordinator.request_refresh();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Exactly one refresh ran inside the window.
    assert_eq!(device.refresh_count(), 1);

    // The merged duplicates produce at most one follow-up at the end
    // of the cooldown, not four.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(device.refresh_count(), 2);

    // A request after the window elapses triggers a fresh refresh.
    coordinator.request_refresh();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(device.refresh_count(), 3);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn apply_schedules_a_follow_up_refresh() {
    let device = device();
    let coordinator = Coordinator::new(Arc::clone(&device), on_demand_only());
    coordinator.start().await;

    coordinator.proxy().set("fan_speed", 3_i64).unwrap();
    coordinator.apply().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(device.commit_count(), 1);
    assert_eq!(device.refresh_count(), 1, "apply re-synchronizes observers");

    coordinator.shutdown().await;
}

// ── Periodic polling ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn polling_loop_refreshes_on_interval_and_survives_failures() {
    let device = device();
    let config = CoordinatorConfig {
        refresh_interval: Duration::from_secs(15),
        ..on_demand_only()
    };
    let coordinator = Coordinator::new(Arc::clone(&device), config);
    coordinator.start().await;

    // No immediate refresh on start.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(device.refresh_count(), 0);

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(device.refresh_count(), 1);
    assert!(coordinator.is_available());

    // A transient failure marks the device unavailable for the cycle...
    device.fail_next_refresh(airlink_device::DeviceError::Network {
        reason: "connection reset".into(),
    });
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(device.refresh_count(), 1);
    assert!(!coordinator.is_available());

    // ...but the loop keeps going and recovers on the next tick.
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(device.refresh_count(), 2);
    assert!(coordinator.is_available());

    coordinator.shutdown().await;

    // No further refreshes after shutdown.
    let settled = device.refresh_count();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(device.refresh_count(), settled);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_disables_periodic_polling() {
    let device = device();
    let coordinator = Coordinator::new(Arc::clone(&device), on_demand_only());
    coordinator.start().await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(device.refresh_count(), 0);

    // On-demand requests still work.
    coordinator.request_refresh();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(device.refresh_count(), 1);

    coordinator.shutdown().await;
}
