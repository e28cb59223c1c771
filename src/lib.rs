//! Restaurant ordering and point-of-sale service
//!
//! Backend for an online ordering kiosk and the counter POS of a single
//! restaurant. It covers:
//! - Customer and staff accounts with JWT authentication and face login
//! - Menu catalogue with per-size variations and stock levels
//! - Online orders, walk-in POS orders and the kitchen queue
//! - Customer feedback with sentiment labels
//! - Nightly KPI rollups, a sales performance report and an LLM-written
//!   weekly recommendation grounded in a local knowledge base
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use restaurant_pos::http::{serve, shutdown_signal, AppState};
//! use restaurant_pos::observability::HealthChecker;
//! # async fn run(state: AppState) -> restaurant_pos::AppResult<()> {
//! let checker = HealthChecker::new(
//!     state.db.clone(),
//!     state.config.recommendation.knowledge_base_path.clone(),
//! );
//! serve(state, checker, shutdown_signal()).await
//! # }
//! ```

pub mod analytics;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod face;
pub mod feedback;
pub mod http;
pub mod llm;
pub mod menu;
pub mod observability;
pub mod orders;
pub mod recommendation;
pub mod testing;
pub mod users;

pub use config::{AppConfig, ConfigError};
pub use db::Database;
pub use error::{AppError, AppResult};
