//! Core functionality for the telemetry backend.
//!
//! This crate provides the fundamental types and utilities shared by the
//! ingest adapter, the fan-out hub and the gateway service:
//! - [`Reading`], the sensor measurement that flows producer to subscriber
//! - layered [`Config`] loading
//! - `tracing` initialization

pub mod config;
pub mod logging;
pub mod reading;

pub use config::{Config, ConfigError, HubConfig, IngestConfig, WebSocketConfig};
pub use logging::LogFormat;
pub use reading::{Reading, ReadingError, RECORD_DELIMITER};
