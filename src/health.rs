//! HTTP health endpoint consumed by the container platform.
//!
//! Serves `GET /` and `GET /healthz` on `0.0.0.0:PORT`. The process is
//! healthy once the Discord gateway has reported ready and a live
//! database ping succeeds.

use crate::db::{Database, DbError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use warp::http::StatusCode;
use warp::Filter;

/// Live connectivity probe behind the health verdict
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Ping the backing store
    async fn ping(&self) -> Result<(), DbError>;
}

#[async_trait]
impl Pinger for Database {
    async fn ping(&self) -> Result<(), DbError> {
        self.test_connection().await.map(|_| ())
    }
}

/// Process-wide readiness shared between the Discord client and the
/// health endpoint.
pub struct AppStatus {
    discord_ready: AtomicBool,
    started_at: DateTime<Utc>,
}

impl AppStatus {
    /// New status with the start time pinned to now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            discord_ready: AtomicBool::new(false),
            started_at: Utc::now(),
        }
    }

    /// Flip the readiness flag once the gateway reports Ready.
    pub fn mark_discord_ready(&self) {
        self.discord_ready.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn discord_ready(&self) -> bool {
        self.discord_ready.load(Ordering::SeqCst)
    }

    /// Whole seconds since process start.
    #[must_use]
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl Default for AppStatus {
    fn default() -> Self {
        Self::new()
    }
}

async fn health_handler(
    status: Arc<AppStatus>,
    db: Arc<dyn Pinger>,
) -> Result<impl warp::Reply, Infallible> {
    let discord = status.discord_ready();
    let database = db.ping().await.is_ok();
    if discord && database {
        Ok(warp::reply::with_status(
            format!(
                "Healthy - Discord: {discord}, DB: {database}, Uptime: {}s",
                status.uptime_secs()
            ),
            StatusCode::OK,
        ))
    } else {
        Ok(warp::reply::with_status(
            format!("Unhealthy - Discord: {discord}, DB: {database}"),
            StatusCode::SERVICE_UNAVAILABLE,
        ))
    }
}

fn routes(
    status: Arc<AppStatus>,
    db: Arc<dyn Pinger>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let status = warp::any().map(move || status.clone());
    let db = warp::any().map(move || db.clone());
    let state = status.and(db);

    // GET /
    let root = warp::path::end()
        .and(warp::get())
        .and(state.clone())
        .and_then(health_handler);

    // GET /healthz
    let healthz = warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .and(state)
        .and_then(health_handler);

    root.or(healthz)
}

/// Serve the health routes until the process exits.
pub async fn serve(status: Arc<AppStatus>, db: Database, port: u16) {
    info!("Web server started on port {port}");
    warp::serve(routes(status, Arc::new(db)))
        .run(([0, 0, 0, 0], port))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answering_pinger() -> MockPinger {
        let mut pinger = MockPinger::new();
        pinger.expect_ping().returning(|| Ok(()));
        pinger
    }

    fn failing_pinger() -> MockPinger {
        let mut pinger = MockPinger::new();
        pinger
            .expect_ping()
            .returning(|| Err(DbError::Mongo(mongodb::error::Error::custom("down"))));
        pinger
    }

    #[test]
    fn fresh_status_is_not_ready() {
        let status = AppStatus::new();
        assert!(!status.discord_ready());
    }

    #[test]
    fn readiness_flag_sticks() {
        let status = AppStatus::new();
        status.mark_discord_ready();
        assert!(status.discord_ready());
        status.mark_discord_ready();
        assert!(status.discord_ready());
    }

    #[test]
    fn uptime_starts_near_zero() {
        let status = AppStatus::new();
        let uptime = status.uptime_secs();
        assert!((0..5).contains(&uptime));
    }

    #[tokio::test]
    async fn healthy_when_ready_and_database_answers() {
        let status = Arc::new(AppStatus::new());
        status.mark_discord_ready();
        let filter = routes(status, Arc::new(answering_pinger()));

        let response = warp::test::request().path("/").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8_lossy(response.body());
        assert!(body.starts_with("Healthy - Discord: true, DB: true, Uptime: "));
        assert!(body.ends_with('s'));
    }

    #[tokio::test]
    async fn healthz_route_reports_the_same_verdict() {
        let status = Arc::new(AppStatus::new());
        status.mark_discord_ready();
        let filter = routes(status, Arc::new(answering_pinger()));

        let response = warp::test::request().path("/healthz").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unhealthy_before_discord_is_ready() {
        let status = Arc::new(AppStatus::new());
        let filter = routes(status, Arc::new(answering_pinger()));

        let response = warp::test::request().path("/").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = String::from_utf8_lossy(response.body());
        assert_eq!(body, "Unhealthy - Discord: false, DB: true");
    }

    #[tokio::test]
    async fn unhealthy_when_database_ping_fails() {
        let status = Arc::new(AppStatus::new());
        status.mark_discord_ready();
        let filter = routes(status, Arc::new(failing_pinger()));

        let response = warp::test::request().path("/").reply(&filter).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = String::from_utf8_lossy(response.body());
        assert_eq!(body, "Unhealthy - Discord: true, DB: false");
    }
}
