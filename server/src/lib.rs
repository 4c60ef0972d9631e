pub mod aggregator;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod notifier;
pub mod ws_server;
