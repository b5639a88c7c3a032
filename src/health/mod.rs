/*!
 * # Health Check Module
 *
 * Probes for the load balancer and the till's connectivity indicator:
 *
 * - `/health` - cached up/down status
 * - `/health/ready` - re-checks the database before answering
 * - `/health/live` - process liveness and uptime
 * - `/health/details` - per-component status
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
    Degraded,
}

impl HealthStatus {
    fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Up | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthDetail {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub details: BTreeMap<String, HealthDetail>,
}

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Arc<DatabaseConnection>,
    pub events_enabled: bool,
    pub health_cache: Arc<RwLock<HealthInfo>>,
    pub start_time: SystemTime,
}

impl HealthState {
    pub fn new(db_pool: Arc<DatabaseConnection>, events_enabled: bool) -> Self {
        Self {
            db_pool,
            events_enabled,
            health_cache: Arc::new(RwLock::new(HealthInfo {
                status: HealthStatus::Up,
                version: env!("CARGO_PKG_VERSION").to_string(),
                timestamp: Utc::now(),
                uptime_seconds: 0,
                details: BTreeMap::new(),
            })),
            start_time: SystemTime::now(),
        }
    }

    pub fn uptime(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }

    /// Re-runs every component check and refreshes the cache
    pub async fn update_health(&self) {
        let database = match self.db_pool.ping().await {
            Ok(_) => HealthDetail {
                status: HealthStatus::Up,
                message: None,
                timestamp: Utc::now(),
            },
            Err(e) => {
                error!(error = %e, "Database health check failed");
                HealthDetail {
                    status: HealthStatus::Down,
                    message: Some(e.to_string()),
                    timestamp: Utc::now(),
                }
            }
        };

        // Without the event channel orders still work; only listeners miss out.
        let events = HealthDetail {
            status: if self.events_enabled {
                HealthStatus::Up
            } else {
                HealthStatus::Degraded
            },
            message: (!self.events_enabled).then(|| "event channel disabled".to_string()),
            timestamp: Utc::now(),
        };

        let mut health = self.health_cache.write().await;
        health.timestamp = Utc::now();
        health.uptime_seconds = self.uptime();
        health.details.insert("database".to_string(), database);
        health.details.insert("events".to_string(), events);
        health.status = overall_status(health.details.values().map(|d| d.status));
    }
}

fn overall_status(statuses: impl Iterator<Item = HealthStatus>) -> HealthStatus {
    statuses.fold(HealthStatus::Up, |acc, status| match (acc, status) {
        (HealthStatus::Down, _) | (_, HealthStatus::Down) => HealthStatus::Down,
        (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Up,
    })
}

pub async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    debug!("Health check endpoint called");
    let health = state.health_cache.read().await;

    (
        health.status.status_code(),
        Json(json!({
            "status": health.status,
            "version": health.version,
            "timestamp": health.timestamp,
        })),
    )
}

pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    state.update_health().await;
    let health = state.health_cache.read().await;

    (
        health.status.status_code(),
        Json(json!({
            "ready": health.status != HealthStatus::Down,
            "timestamp": health.timestamp,
        })),
    )
}

pub async fn liveness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "alive": true,
            "uptime_seconds": state.uptime(),
            "timestamp": Utc::now(),
        })),
    )
}

pub async fn detailed_health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    state.update_health().await;
    let health = state.health_cache.read().await;
    (health.status.status_code(), Json(health.clone()))
}

/// Refreshes the cached status on a fixed interval
pub async fn run_health_checker(state: Arc<HealthState>) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);

    loop {
        interval.tick().await;
        state.update_health().await;

        let health = state.health_cache.read().await;
        if health.status != HealthStatus::Up {
            for (name, detail) in &health.details {
                if detail.status != HealthStatus::Up {
                    warn!(component = %name, status = ?detail.status, "Component is not healthy");
                }
            }
        }
    }
}

/// Health router; spawns the background checker.
pub fn health_routes_with_state(db_pool: Arc<DatabaseConnection>, events_enabled: bool) -> Router {
    let health_state = Arc::new(HealthState::new(db_pool, events_enabled));

    tokio::spawn(run_health_checker(health_state.clone()));

    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/details", get(detailed_health))
        .with_state(health_state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_down_component_takes_the_service_down() {
        let statuses = [HealthStatus::Up, HealthStatus::Degraded, HealthStatus::Down];
        assert_eq!(overall_status(statuses.into_iter()), HealthStatus::Down);
        assert_eq!(
            overall_status([HealthStatus::Up, HealthStatus::Degraded].into_iter()),
            HealthStatus::Degraded
        );
        assert_eq!(overall_status(std::iter::empty()), HealthStatus::Up);
    }

    #[tokio::test]
    async fn disconnected_database_reports_down() {
        let state = HealthState::new(Arc::new(DatabaseConnection::Disconnected), true);
        state.update_health().await;
        let health = state.health_cache.read().await;
        assert_eq!(health.status, HealthStatus::Down);
        assert_eq!(health.details["events"].status, HealthStatus::Up);
        assert_eq!(health.status.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
