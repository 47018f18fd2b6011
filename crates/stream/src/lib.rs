//! Telemetry Stream
//!
//! Producer ingestion: line-delimited JSON readings decoded from upstream
//! byte streams and handed, in order, to a caller-supplied callback.

#![warn(missing_docs)]

pub mod adapter;
pub mod codec;
pub mod error;
pub mod listener;

pub use adapter::{CloseReason, IngestAdapter, IngestSummary};
pub use codec::decode_record;
pub use error::{RecordError, StreamError, StreamResult};
pub use listener::IngestListener;
