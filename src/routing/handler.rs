//! Per-route request handling: authorize, run the chain, forward.

use axum::http::{header, HeaderMap};
use base64::Engine;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::pipeline::{Batch, Chain, StageError};
use crate::routing::table::Protocol;
use crate::sink::{Sink, SinkError};

/// Header carrying the firehose access key.
pub const FIREHOSE_KEY_HEADER: &str = "x-amz-firehose-access-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,

    #[error("invalid credentials")]
    Invalid,
}

/// Credentials a route demands.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthRequirement {
    None,
    /// `Authorization: Basic base64(user:pass)`.
    Basic { username: String, password: String },
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `Authorization: Splunk <token>`.
    HecToken(String),
    /// Firehose access key header.
    FirehoseKey(String),
}

impl AuthRequirement {
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        match self {
            AuthRequirement::None => Ok(()),
            AuthRequirement::Basic { username, password } => {
                let encoded = authorization(headers, "Basic")?;
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|_| AuthError::Invalid)?;
                let expected = format!("{username}:{password}");
                matches(&decoded, expected.as_bytes())
            }
            AuthRequirement::Bearer(token) => {
                matches(authorization(headers, "Bearer")?.as_bytes(), token.as_bytes())
            }
            AuthRequirement::HecToken(token) => {
                matches(authorization(headers, "Splunk")?.as_bytes(), token.as_bytes())
            }
            AuthRequirement::FirehoseKey(key) => {
                let value = headers
                    .get(FIREHOSE_KEY_HEADER)
                    .ok_or(AuthError::Missing)?;
                matches(value.as_bytes(), key.as_bytes())
            }
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            AuthRequirement::None => "none",
            AuthRequirement::Basic { .. } => "basic",
            AuthRequirement::Bearer(_) => "bearer",
            AuthRequirement::HecToken(_) => "hec-token",
            AuthRequirement::FirehoseKey(_) => "firehose-key",
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for AuthRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Credentials after `<scheme> ` in the Authorization header.
fn authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing)?
        .to_str()
        .map_err(|_| AuthError::Invalid)?;
    let (given, credentials) = value.split_once(' ').ok_or(AuthError::Invalid)?;
    if !given.eq_ignore_ascii_case(scheme) {
        return Err(AuthError::Invalid);
    }
    Ok(credentials.trim())
}

fn matches(given: &[u8], expected: &[u8]) -> Result<(), AuthError> {
    if given == expected {
        Ok(())
    } else {
        Err(AuthError::Invalid)
    }
}

#[derive(Debug, Error)]
pub enum HandleError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Auth requirement, chain, and destination for one route.
pub struct Handler {
    name: String,
    protocol: Protocol,
    tag: String,
    auth: AuthRequirement,
    chain: Chain,
    sink: Arc<dyn Sink>,
}

impl Handler {
    pub fn new(
        name: impl Into<String>,
        protocol: Protocol,
        tag: impl Into<String>,
        auth: AuthRequirement,
        chain: Chain,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            name: name.into(),
            protocol,
            tag: tag.into(),
            auth,
            chain,
            sink,
        }
    }

    /// Listener name from configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Destination tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn auth(&self) -> &AuthRequirement {
        &self.auth
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        self.auth.check(headers)
    }

    /// Run a decoded batch through the chain and forward what survives.
    ///
    /// Returns the number of records forwarded.
    pub fn handle(&self, batch: Batch) -> Result<usize, HandleError> {
        let offered = batch.len();
        let records = self.chain.process(batch)?;
        let forwarded = records.len();
        if forwarded > 0 {
            self.sink.forward(&self.tag, records)?;
        }
        debug!(listener = %self.name, offered, forwarded, "Batch handled");
        Ok(forwarded)
    }

    pub fn close(&self) -> Vec<StageError> {
        self.chain.close()
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("protocol", &self.protocol)
            .field("tag", &self.tag)
            .field("auth", &self.auth)
            .field("chain", &self.chain.names().collect::<Vec<_>>())
            .finish()
    }
}
