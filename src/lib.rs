pub mod analytics;
pub mod catalog;
pub mod config;
pub mod db;
pub mod embed;
pub mod error;
pub mod kv;
pub mod models;
pub mod progress;
pub mod reorder;
pub mod routes;
pub mod seed;
pub mod store;
pub mod util;
