//! Ingested record type.

use bytes::Bytes;
use std::net::IpAddr;
use std::time::SystemTime;

use crate::pipeline::error::RecordError;

/// Largest payload a record may carry.
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// A batch as handed to a stage.
///
/// Decoders leave `None` in slots whose record could not be decoded; stages
/// skip those slots.
pub type Batch = Vec<Option<Record>>;

/// One unit of ingested data.
///
/// Records are never mutated in place. Transformations build a new value
/// with [`Record::with_data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    tag: String,
    src: IpAddr,
    ts: SystemTime,
    data: Bytes,
}

impl Record {
    /// Create a new record.
    pub fn new(tag: impl Into<String>, src: IpAddr, ts: SystemTime, data: impl Into<Bytes>) -> Self {
        Self {
            tag: tag.into(),
            src,
            ts,
            data: data.into(),
        }
    }

    /// Classification tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Origin address.
    pub fn src(&self) -> IpAddr {
        self.src
    }

    /// Timestamp assigned at ingest.
    pub fn ts(&self) -> SystemTime {
        self.ts
    }

    /// Raw payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload as shared bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Copy of this record carrying a different payload.
    pub fn with_data(&self, data: impl Into<Bytes>) -> Result<Self, RecordError> {
        let data = data.into();
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(RecordError::Oversized {
                size: data.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self {
            tag: self.tag.clone(),
            src: self.src,
            ts: self.ts,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn with_data_keeps_metadata() {
        let ts = SystemTime::now();
        let rec = Record::new("web", IpAddr::V4(Ipv4Addr::LOCALHOST), ts, "old");
        let next = rec.with_data("new").unwrap();

        assert_eq!(next.tag(), "web");
        assert_eq!(next.ts(), ts);
        assert_eq!(next.data(), b"new");
        assert_eq!(rec.data(), b"old");
    }

    #[test]
    fn with_data_rejects_oversized_payload() {
        let rec = Record::new("web", IpAddr::V4(Ipv4Addr::LOCALHOST), SystemTime::now(), "x");
        let err = rec.with_data(vec![0u8; MAX_PAYLOAD_SIZE + 1]).unwrap_err();
        assert!(matches!(err, RecordError::Oversized { .. }));
    }
}
