//! Health, readiness, liveness and metrics endpoints
//!
//! `/health` runs the component checks and answers 503 when any of them is
//! unhealthy. `/ready` only needs the database. `/live` always answers.

use crate::db::Database;
use crate::observability::metrics::metrics;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::Filter;

/// Runs the component checks behind `/health` and `/ready`
#[derive(Clone)]
pub struct HealthChecker {
    db: Database,
    knowledge_base_path: PathBuf,
}

impl HealthChecker {
    pub fn new(db: Database, knowledge_base_path: PathBuf) -> Self {
        Self {
            db,
            knowledge_base_path,
        }
    }

    fn check_database(&self) -> HealthCheck {
        let start = Instant::now();
        let result = self.db.ping().and_then(|_| self.db.schema_version());
        let elapsed = start.elapsed().as_millis() as u64;
        match result {
            Ok(version) => HealthCheck {
                status: "healthy".to_string(),
                message: Some(format!("schema version {version}")),
                response_time_ms: Some(elapsed),
                last_check: current_timestamp(),
            },
            Err(e) => HealthCheck {
                status: "unhealthy".to_string(),
                message: Some(e.to_string()),
                response_time_ms: Some(elapsed),
                last_check: current_timestamp(),
            },
        }
    }

    // The knowledge base only matters to the weekly job, so a missing file
    // is reported without failing the probe.
    fn check_knowledge_base(&self) -> HealthCheck {
        let present = self.knowledge_base_path.is_file();
        HealthCheck {
            status: if present { "healthy" } else { "missing" }.to_string(),
            message: Some(self.knowledge_base_path.display().to_string()),
            response_time_ms: None,
            last_check: current_timestamp(),
        }
    }

    pub fn health_status(&self) -> HealthStatus {
        let mut checks = HashMap::new();
        let database = self.check_database();
        let healthy = database.status == "healthy";
        checks.insert("database".to_string(), database);
        checks.insert("knowledge_base".to_string(), self.check_knowledge_base());

        metrics().update_health_status(healthy);

        HealthStatus {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: current_timestamp(),
            uptime_seconds: metrics().get_metrics().lifecycle.uptime_seconds,
            checks,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.db.ping().is_ok()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
    pub last_check: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub checks: HashMap<String, HealthCheck>,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

/// `GET /health`, `/ready`, `/live` and `/metrics`
pub fn routes(checker: HealthChecker) -> BoxedFilter<(Response,)> {
    let health_checker = checker.clone();
    let health = warp::path!("health")
        .and(warp::get())
        .map(move || {
            let status = health_checker.health_status();
            let code = if status.status == "healthy" {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            warp::reply::with_status(warp::reply::json(&status), code).into_response()
        });

    let ready = warp::path!("ready").and(warp::get()).map(move || {
        let ready = checker.is_ready();
        let code = if ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        let body = ReadinessResponse {
            ready,
            timestamp: current_timestamp(),
        };
        warp::reply::with_status(warp::reply::json(&body), code).into_response()
    });

    let live = warp::path!("live").and(warp::get()).map(|| {
        warp::reply::json(&LivenessResponse {
            alive: true,
            timestamp: current_timestamp(),
        })
        .into_response()
    });

    let metrics_route = warp::path!("metrics")
        .and(warp::get())
        .map(|| warp::reply::json(&metrics().get_metrics()).into_response());

    health
        .or(ready)
        .unify()
        .or(live)
        .unify()
        .or(metrics_route)
        .unify()
        .boxed()
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
