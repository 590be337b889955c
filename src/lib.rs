pub mod app;
pub mod categories;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod server;
pub mod storage;
pub mod types;
