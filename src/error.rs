use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Could not acquire the discovery or responder socket at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed announcement: {0:?}")]
    MalformedAnnouncement(String),

    #[error("malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    /// The record was evicted (or never existed) when the write arrived.
    #[error("unknown peer {0}")]
    UnknownPeer(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DiscoveryError {
    /// Protocol errors concern a single inbound message and are dropped silently.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            DiscoveryError::MalformedAnnouncement(_) | DiscoveryError::MalformedTimestamp(_)
        )
    }
}
