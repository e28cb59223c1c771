//! Sales KPI snapshots and the reports built on them

pub mod aggregate;
pub mod model;
pub mod periods;
pub mod routes;
pub mod store;

pub use aggregate::generate_reports;
pub use model::{AnalyticsReport, KpiSnapshot, RecommendationStatus, ReportType};
pub use periods::{period_for, Period};
