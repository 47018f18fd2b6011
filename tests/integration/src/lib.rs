//! Integration tests for the telemetry pipeline
//!
//! This test suite validates:
//! - producer TCP ingestion through the line-delimited JSON adapter
//! - fan-out to WebSocket subscribers via the hub
//! - isolation of malformed records, departed subscribers and closed producers

pub mod test_utils;

#[cfg(test)]
mod pipeline_tests;
