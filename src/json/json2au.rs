//! JSON-to-au conversion.
//!
//! Reads a stream of whitespace-separated JSON values (one per log
//! record, typically one per line) and encodes each as a value record.
//! Object keys are always intern-eligible; other strings follow the
//! default frequency policy. Strings whose length and shape match the
//! textual timestamp form are converted to wire timestamps, so they decode
//! back to the identical text.

use std::io::{Read, Write};

use serde_json::Value;

use crate::displaylevel;
use crate::encoder::{AuEncoder, AuWriter, EncoderConfig};
use crate::error::{AuError, Result};
use crate::timestamp::{parse_nanos, plausible_timestamp_len};

/// Encode JSON values from `input` onto `out`. Stops after `max_records`
/// values when given. Returns the number of records encoded.
pub fn encode_json_stream(
    input: impl Read,
    out: impl Write,
    max_records: Option<u64>,
    config: EncoderConfig,
) -> Result<u64> {
    let mut enc = AuEncoder::new(out, config)?;
    let mut count = 0u64;
    let stream = serde_json::Deserializer::from_reader(input).into_iter::<Value>();
    for item in stream {
        if let Some(max) = max_records {
            if count >= max {
                break;
            }
        }
        let value = item.map_err(|e| {
            AuError::parse(0, format!("json input at line {}: {e}", e.line()))
        })?;
        enc.encode(|w| write_json_value(w, &value))?;
        count += 1;
        if count % 100_000 == 0 {
            displaylevel!(3, "{count} records encoded...\n");
        }
    }
    enc.flush()?;
    Ok(count)
}

/// Write one JSON value through the formatter.
pub fn write_json_value(w: &mut AuWriter, value: &Value) {
    match value {
        Value::Null => {
            w.null();
        }
        Value::Bool(b) => {
            w.boolean(*b);
        }
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                w.uint(u);
            } else if let Some(i) = n.as_i64() {
                w.int(i);
            } else {
                w.double(n.as_f64().unwrap_or(f64::NAN));
            }
        }
        Value::String(s) => {
            if let Some(nanos) = sniff_timestamp(s) {
                w.time(nanos);
            } else {
                w.string(s.as_bytes());
            }
        }
        Value::Array(items) => {
            w.start_array();
            for item in items {
                write_json_value(w, item);
            }
            w.end_array();
        }
        Value::Object(entries) => {
            w.start_map();
            for (key, val) in entries {
                w.key(key.as_bytes());
                write_json_value(w, val);
            }
            w.end_map();
        }
    }
}

fn sniff_timestamp(s: &str) -> Option<i64> {
    if !plausible_timestamp_len(s.len()) {
        return None;
    }
    parse_nanos(s)
}
