//! Observability: structured logging, process metrics and health probes

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::HealthChecker;
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot};

pub use logging::{job_span, request_span};
