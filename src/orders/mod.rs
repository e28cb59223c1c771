//! Online orders, POS sales and the kitchen lifecycle

pub mod maintenance;
pub mod model;
pub mod routes;
pub mod store;

pub use maintenance::{cancel_stale_pending_orders, seed_order_history, SeedSummary};
pub use model::{DiningMethod, Order, OrderItem, OrderStatus, OrderType};
