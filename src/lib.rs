//! Prometheus metrics exporter for Lixee Zigbee energy meters.
//!
//! This crate bridges meter readings published by a zigbee2mqtt bridge
//! into a Prometheus scrape endpoint. One background task subscribes to
//! the readings and keeps the single most recent record in a shared
//! store; HTTP handlers turn snapshots of that record into the fixed
//! metric set on demand.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  Zenoh Network  │────>│   StateStore    │<────│   HTTP Server   │
//! │ (meter bridge)  │     │ (latest record) │     │ (/metrics, API) │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! The listener is the store's only writer; scrape and API handlers only
//! take snapshots. The store's lock covers nothing beyond the copy, so
//! neither side can stall the other.
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! lixee-exporter-prometheus --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod record;
pub mod session;
pub mod store;
pub mod subscriber;

pub use collector::MetricCollector;
pub use config::ExporterConfig;
pub use error::{Error, Result};
pub use http::HttpServer;
pub use record::{TelemetryRecord, UpdateStatus};
pub use store::{SharedStore, StateStore};
pub use subscriber::TelemetryListener;
