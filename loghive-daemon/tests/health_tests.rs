//! Health aggregation tests.
//!
//! Tests the health status aggregation logic and component health reporting.

use loghive_core::pipeline::HealthStatus;
use loghive_daemon::health::{ComponentHealth, DaemonHealth, aggregate_status};

#[test]
fn test_aggregate_status_all_healthy() {
    // Given: All components are healthy
    let components = vec![
        ComponentHealth::enabled("log-pipeline", HealthStatus::Healthy),
        ComponentHealth::enabled("syslog-udp", HealthStatus::Healthy),
    ];

    // When: Aggregating status
    let status = aggregate_status(&components);

    // Then: Overall status should be Healthy
    assert!(
        status.is_healthy(),
        "all healthy components should result in healthy status"
    );
}

#[test]
fn test_aggregate_status_degraded_pipeline() {
    // Given: Workers are backing off
    let components = vec![
        ComponentHealth::enabled(
            "log-pipeline",
            HealthStatus::Degraded("workers backing off: 1".to_owned()),
        ),
        ComponentHealth::enabled("syslog-udp", HealthStatus::Healthy),
    ];

    // When: Aggregating status
    let status = aggregate_status(&components);

    // Then: Degraded with the component name in the reason
    assert_eq!(
        status,
        HealthStatus::Degraded("log-pipeline: workers backing off: 1".to_owned())
    );
}

#[test]
fn test_aggregate_status_unhealthy_wins_over_degraded() {
    // Given: One degraded and one unhealthy component
    let components = vec![
        ComponentHealth::enabled("log-pipeline", HealthStatus::Degraded("slow".to_owned())),
        ComponentHealth::enabled(
            "syslog-udp",
            HealthStatus::Unhealthy("collector task exited".to_owned()),
        ),
    ];

    // When: Aggregating status
    let status = aggregate_status(&components);

    // Then: Unhealthy, reporting only the unhealthy component
    assert_eq!(
        status,
        HealthStatus::Unhealthy("syslog-udp: collector task exited".to_owned())
    );
}

#[test]
fn test_aggregate_status_multiple_unhealthy_reasons_joined() {
    let components = vec![
        ComponentHealth::enabled("log-pipeline", HealthStatus::Unhealthy("stopped".to_owned())),
        ComponentHealth::enabled("syslog-udp", HealthStatus::Unhealthy("not running".to_owned())),
    ];

    let status = aggregate_status(&components);

    assert_eq!(
        status,
        HealthStatus::Unhealthy("log-pipeline: stopped; syslog-udp: not running".to_owned())
    );
}

#[test]
fn test_aggregate_status_ignores_disabled_components() {
    // Given: A disabled component carrying a stale unhealthy status
    let mut disabled = ComponentHealth::disabled("syslog-udp");
    disabled.status = HealthStatus::Unhealthy("not running".to_owned());
    let components = vec![
        ComponentHealth::enabled("log-pipeline", HealthStatus::Healthy),
        disabled,
    ];

    // Then: Disabled components do not affect the result
    assert!(aggregate_status(&components).is_healthy());
}

#[test]
fn test_aggregate_status_empty_is_healthy() {
    assert!(aggregate_status(&[]).is_healthy());
}

#[test]
fn test_daemon_health_serializes_to_json() {
    let components = vec![ComponentHealth::enabled("log-pipeline", HealthStatus::Healthy)];
    let health = DaemonHealth {
        status: aggregate_status(&components),
        uptime_secs: 42,
        components,
    };

    let json = serde_json::to_value(&health).expect("health should serialize");

    assert_eq!(json["status"], "Healthy");
    assert_eq!(json["uptime_secs"], 42);
    assert_eq!(json["components"][0]["name"], "log-pipeline");
    assert_eq!(json["components"][0]["enabled"], true);
}
