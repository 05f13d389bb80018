pub mod charts;
pub mod db;
pub mod models;
pub mod service;
pub mod snapshot;
pub mod stats;
pub mod store;
