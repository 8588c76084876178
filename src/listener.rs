use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use tokio::net::UdpSocket;
use tokio::task::{self, JoinHandle};
use tokio::time;
use tracing::{trace, warn};

use crate::error::Result;
use crate::neighbors::{Observation, SharedNeighbors};
use crate::prober::{probe_peer, ProbeSettings};
use crate::select_stream_or_shutdown::Shutdown;
use crate::server_loop::serve_stream;
use crate::types::{GenericBoxedStream, PeerIdentity};
use crate::wire::Announcement;

const MAX_DATAGRAM: usize = 4096;
const RECV_ERROR_PAUSE: Duration = Duration::from_millis(100);

pub fn datagram_stream(socket: Arc<UdpSocket>) -> impl Stream<Item = (Vec<u8>, SocketAddr)> {
    stream! {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => yield (buf[..len].to_vec(), from),
                Err(e) => {
                    warn!("Discovery receive error: {}", e);
                    time::sleep(RECV_ERROR_PAUSE).await;
                }
            }
        }
    }
}

/// Turns announcements into neighbor table updates and probe launches.
#[derive(Clone)]
pub struct DiscoveryListener {
    identity: PeerIdentity,
    neighbors: SharedNeighbors,
    probe: ProbeSettings,
}

impl DiscoveryListener {
    pub fn new(identity: PeerIdentity, neighbors: SharedNeighbors, probe: ProbeSettings) -> Self {
        Self {
            identity,
            neighbors,
            probe,
        }
    }

    /// Handle one datagram. Returns the probe task when the sender is new.
    pub fn handle_datagram(&self, datagram: &[u8], from: SocketAddr) -> Option<JoinHandle<Result<f64>>> {
        let announcement = match Announcement::decode(datagram) {
            Ok(announcement) => announcement,
            Err(e) => {
                trace!(%from, "Dropping datagram: {}", e);
                return None;
            }
        };

        if announcement.identity == self.identity {
            return None;
        }

        trace!(%from, "Received {}", announcement);
        match self
            .neighbors
            .observe(&announcement.identity, from.ip(), announcement.probe_port)
        {
            Observation::Discovered { generation } => {
                let target = SocketAddr::new(from.ip(), announcement.probe_port);
                Some(task::spawn(probe_peer(
                    self.neighbors.clone(),
                    announcement.identity,
                    generation,
                    target,
                    self.probe,
                )))
            }
            Observation::Sighted { .. } | Observation::Evicted { .. } => None,
        }
    }

    pub async fn run(self, socket: Arc<UdpSocket>, shutdown: Shutdown) {
        let datagrams: GenericBoxedStream<(Vec<u8>, SocketAddr)> =
            Box::pin(datagram_stream(socket));

        serve_stream("listener", datagrams, shutdown, move |(datagram, from)| {
            self.handle_datagram(&datagram, from);
        })
        .await;
    }
}
