//! Menu catalogue: categories, items and their sized variations

pub mod model;
pub mod routes;
pub mod store;

pub use model::{Category, MenuItem, StockFilter, Variation};
