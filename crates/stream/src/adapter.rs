//! Ingestion adapter: one producer connection in, decoded readings out.
//!
//! The loop buffers bytes until a record boundary, decodes the record and
//! awaits the reading callback before reading further, so readings from one
//! connection reach the callback in wire order. Malformed records are logged
//! and skipped. The loop ends only when the connection does.

use std::future::Future;

use telemetry_core::{IngestConfig, Reading, RECORD_DELIMITER};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, warn};

use crate::codec::{decode_record, is_blank};
use crate::error::{RecordError, StreamError, StreamResult};

/// Why an adapter loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CloseReason {
    /// Producer closed its end
    #[default]
    Eof,
    /// Read failed; the connection is treated as lost
    Error(String),
}

/// Per-connection counters returned when the loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Bytes consumed from the connection
    pub bytes_read: u64,
    /// Readings handed to the callback
    pub decoded: u64,
    /// Records discarded as malformed
    pub malformed: u64,
    /// Whether an unterminated fragment was dropped at close
    pub dropped_partial: bool,
    /// How the connection ended
    pub close_reason: CloseReason,
}

/// Decodes the ingest wire format from a byte stream.
#[derive(Debug, Clone)]
pub struct IngestAdapter {
    max_record_bytes: usize,
}

impl IngestAdapter {
    /// Create an adapter with the given per-record limit (delimiter excluded).
    pub fn new(max_record_bytes: usize) -> StreamResult<Self> {
        if max_record_bytes == 0 {
            return Err(StreamError::InvalidConfig(
                "max_record_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_record_bytes })
    }

    /// Create an adapter from the ingest config section.
    pub fn from_config(config: &IngestConfig) -> StreamResult<Self> {
        Self::new(config.max_record_bytes)
    }

    /// Record size limit
    pub fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    /// Run until the upstream connection closes or errors.
    ///
    /// `on_reading` is awaited for every decoded reading before the next
    /// record is read.
    pub async fn run<R, F, Fut>(&self, upstream: R, mut on_reading: F) -> IngestSummary
    where
        R: AsyncRead + Unpin,
        F: FnMut(Reading) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut reader = BufReader::new(upstream);
        let mut record = Vec::with_capacity(256);
        let mut summary = IngestSummary::default();
        // One extra byte leaves room for the delimiter itself.
        let limit = self.max_record_bytes as u64 + 1;

        loop {
            record.clear();

            // AWAITING_BOUNDARY
            let read = {
                let mut bounded = (&mut reader).take(limit);
                bounded.read_until(RECORD_DELIMITER, &mut record).await
            };

            let n = match read {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!(error = %e, "Upstream read failed");
                    summary.close_reason = CloseReason::Error(e.to_string());
                    break;
                }
            };
            summary.bytes_read += n as u64;

            if record.last() != Some(&RECORD_DELIMITER) {
                if (record.len() as u64) < limit {
                    // EOF in the middle of a record
                    debug!(bytes = record.len(), "Discarding unterminated trailing record");
                    summary.dropped_partial = true;
                    break;
                }

                self.discard(
                    &mut summary,
                    RecordError::Oversized {
                        limit: self.max_record_bytes,
                    },
                );
                match skip_to_boundary(&mut reader).await {
                    Ok((skipped, true)) => {
                        summary.bytes_read += skipped;
                        continue;
                    }
                    Ok((skipped, false)) => {
                        summary.bytes_read += skipped;
                        break;
                    }
                    Err(e) => {
                        summary.close_reason = CloseReason::Error(e.to_string());
                        break;
                    }
                }
            }

            // HAVE_RECORD
            let body = &record[..record.len() - 1];
            if is_blank(body) {
                continue;
            }

            match decode_record(body) {
                Ok(reading) => {
                    summary.decoded += 1;
                    debug!(sensor_id = %reading.sensor_id, "Decoded reading");
                    on_reading(reading).await;
                }
                Err(e) => self.discard(&mut summary, e),
            }
        }

        summary
    }

    fn discard(&self, summary: &mut IngestSummary, error: RecordError) {
        summary.malformed += 1;
        warn!(error = %error, malformed = summary.malformed, "Discarding malformed record");
    }
}

/// Consume bytes through the next delimiter.
///
/// Returns the number of bytes consumed and whether a delimiter was found
/// before EOF.
async fn skip_to_boundary<R>(reader: &mut BufReader<R>) -> std::io::Result<(u64, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut skipped = 0u64;
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok((skipped, false));
        }

        match buf.iter().position(|b| *b == RECORD_DELIMITER) {
            Some(pos) => {
                reader.consume(pos + 1);
                skipped += pos as u64 + 1;
                return Ok((skipped, true));
            }
            None => {
                let len = buf.len();
                reader.consume(len);
                skipped += len as u64;
            }
        }
    }
}
