use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{info, warn};

use crate::clock::ClockMode;
use crate::error::{DiscoveryError, Result};
use crate::neighbors::SharedNeighbors;
use crate::types::PeerIdentity;
use crate::wire::{decode_timestamp, estimate_delay_secs};

/// Replies are a decimal integer; anything longer is not a timestamp.
const MAX_REPLY_LEN: u64 = 64;

#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub clock: ClockMode,
}

/// Connect to the peer's responder and return `(remote, local)` timestamps.
pub async fn exchange_timestamps(addr: SocketAddr, settings: ProbeSettings) -> Result<(i64, i64)> {
    let mut stream = time::timeout(settings.timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| DiscoveryError::Timeout(settings.timeout))??;

    let mut reply = Vec::new();
    time::timeout(
        settings.timeout,
        (&mut stream).take(MAX_REPLY_LEN).read_to_end(&mut reply),
    )
    .await
    .map_err(|_| DiscoveryError::Timeout(settings.timeout))??;
    let local = settings.clock.now();

    let remote = decode_timestamp(&reply)?;
    Ok((remote, local))
}

/// Measure one newly discovered peer and record the result against the
/// record generation the probe was started for.
///
/// Failures leave the delay unset; nothing is retried.
pub async fn probe_peer(
    neighbors: SharedNeighbors,
    identity: PeerIdentity,
    generation: u64,
    addr: SocketAddr,
    settings: ProbeSettings,
) -> Result<f64> {
    let outcome = exchange_timestamps(addr, settings).await;

    let (remote, local) = match outcome {
        Ok(pair) => pair,
        Err(e) => {
            neighbors.finish_probe(&identity, generation);
            warn!(peer = %identity, %addr, "Probe failed: {}", e);
            return Err(e);
        }
    };

    let delay = estimate_delay_secs(remote, local);
    match neighbors.set_delay(&identity, generation, delay) {
        Ok(()) => {
            info!(peer = %identity, %addr, delay_secs = delay, "Measured delay");
            Ok(delay)
        }
        Err(e) => {
            warn!(peer = %identity, "Discarding delay: {}", e);
            Err(e)
        }
    }
}
