//! Customer comments scored for sentiment

pub mod routes;
pub mod sentiment;
pub mod store;

pub use sentiment::{analyze, polarity, SentimentLabel};
