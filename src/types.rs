use serde::{Deserialize, Serialize};

use futures_util::Stream;
use std::fmt;
use std::net::IpAddr;
use std::pin::Pin;

/// Opaque per-process token, generated once at startup.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// First 8 hex characters of a random v4 uuid.
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness and delay state for one discovered peer
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NeighborRecord {
    pub identity: PeerIdentity,
    pub estimated_delay_secs: Option<f64>,
    pub liveness: u32,
    pub address: IpAddr,
    pub probe_port: u16,
    /// Distinguishes this record from earlier ones for the same identity.
    #[serde(skip)]
    pub generation: u64,
    /// Set while the record's single probe is outstanding; a result is only
    /// accepted while it is set.
    #[serde(skip)]
    pub probe_in_flight: bool,
}

impl NeighborRecord {
    pub fn discovered(identity: PeerIdentity, generation: u64, address: IpAddr, probe_port: u16) -> Self {
        Self {
            identity,
            estimated_delay_secs: None,
            liveness: 0,
            address,
            probe_port,
            generation,
            probe_in_flight: true,
        }
    }
}

pub type GenericBoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;
