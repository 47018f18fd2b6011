//! Line-delimited JSON record decoding.

use telemetry_core::Reading;

use crate::error::RecordError;

/// Decode one record (delimiter already removed) into a validated reading.
///
/// A trailing carriage return is tolerated so CRLF producers work.
pub fn decode_record(record: &[u8]) -> Result<Reading, RecordError> {
    let text = std::str::from_utf8(record)?;
    let text = text.strip_suffix('\r').unwrap_or(text);

    let reading: Reading = serde_json::from_str(text)?;
    reading.validate()?;
    Ok(reading)
}

/// True when the record carries nothing but whitespace.
pub fn is_blank(record: &[u8]) -> bool {
    record.iter().all(u8::is_ascii_whitespace)
}
