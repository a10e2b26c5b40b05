//! Request body decoders, one per protocol family.
//!
//! Decoders turn a body into a [`Batch`]. A slot that cannot be decoded is
//! left as `None` so that the rest of the batch still flows.

use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use std::net::IpAddr;
use std::time::SystemTime;
use thiserror::Error;

use crate::pipeline::{Batch, Record};
use crate::routing::Protocol;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed firehose request: {0}")]
    Firehose(#[source] serde_json::Error),
}

/// Decoded request body.
#[derive(Debug, Default)]
pub struct Decoded {
    pub batch: Batch,
    /// Firehose request id, echoed in the response.
    pub request_id: Option<String>,
}

/// Metadata stamped on every record of one request.
#[derive(Debug, Clone, Copy)]
pub struct Origin<'a> {
    pub tag: &'a str,
    pub src: IpAddr,
    pub ts: SystemTime,
}

impl Origin<'_> {
    fn record(&self, data: impl Into<Bytes>) -> Record {
        Record::new(self.tag, self.src, self.ts, data)
    }
}

pub fn decode(protocol: Protocol, body: Bytes, origin: Origin<'_>) -> Result<Decoded, DecodeError> {
    match protocol {
        Protocol::Std => Ok(Decoded {
            batch: decode_lines(body, origin),
            request_id: None,
        }),
        Protocol::Hec => Ok(Decoded {
            batch: decode_hec(&body, origin),
            request_id: None,
        }),
        Protocol::Firehose => decode_firehose(&body, origin),
    }
}

/// One record per line. `\r\n` endings are accepted; blank lines skipped.
pub fn decode_lines(body: Bytes, origin: Origin<'_>) -> Batch {
    let mut batch = Vec::new();
    let mut start = 0;

    while start < body.len() {
        let end = body[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| start + i);

        let mut line_end = end;
        if line_end > start && body[line_end - 1] == b'\r' {
            line_end -= 1;
        }
        if line_end > start {
            batch.push(Some(origin.record(body.slice(start..line_end))));
        }
        start = end + 1;
    }
    batch
}

/// Concatenated HEC event objects.
///
/// Each object's `event` becomes a payload: strings verbatim, anything else
/// as compact JSON. Objects without `event` become placeholders, as does
/// the first malformed object, after which decoding stops.
pub fn decode_hec(body: &[u8], origin: Origin<'_>) -> Batch {
    let mut batch = Vec::new();

    for value in serde_json::Deserializer::from_slice(body).into_iter::<Value>() {
        let Ok(value) = value else {
            batch.push(None);
            break;
        };
        let record = match value.get("event") {
            Some(Value::String(event)) => Some(origin.record(event.clone())),
            Some(Value::Null) | None => None,
            Some(other) => serde_json::to_vec(other).ok().map(|data| origin.record(data)),
        };
        batch.push(record);
    }
    batch
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirehoseRequest {
    request_id: String,
    #[serde(default)]
    records: Vec<FirehoseRecord>,
}

#[derive(Debug, Deserialize)]
struct FirehoseRecord {
    #[serde(default)]
    data: String,
}

/// Firehose delivery request with base64 record data.
pub fn decode_firehose(body: &[u8], origin: Origin<'_>) -> Result<Decoded, DecodeError> {
    let request: FirehoseRequest = serde_json::from_slice(body).map_err(DecodeError::Firehose)?;

    let batch = request
        .records
        .iter()
        .map(|r| {
            base64::engine::general_purpose::STANDARD
                .decode(&r.data)
                .ok()
                .map(|data| origin.record(data))
        })
        .collect();

    Ok(Decoded {
        batch,
        request_id: Some(request.request_id),
    })
}
