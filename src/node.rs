use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::{self, JoinHandle};
use tracing::{info, warn};

use crate::announcer::run_announcer;
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::listener::DiscoveryListener;
use crate::neighbors::{NeighborTable, SharedNeighbors};
use crate::prober::ProbeSettings;
use crate::responder::run_responder;
use crate::select_stream_or_shutdown::Shutdown;
use crate::types::{NeighborRecord, PeerIdentity};
use crate::wire::Announcement;

/// A node whose sockets are bound but whose components are not yet running.
pub struct Node {
    config: DiscoveryConfig,
    identity: PeerIdentity,
    neighbors: SharedNeighbors,
    discovery_socket: Arc<UdpSocket>,
    probe_listener: TcpListener,
}

impl Node {
    /// Validate `config`, generate an identity and acquire both sockets.
    pub async fn bind(config: DiscoveryConfig) -> Result<Self> {
        Self::bind_with_identity(config, PeerIdentity::generate()).await
    }

    pub async fn bind_with_identity(config: DiscoveryConfig, identity: PeerIdentity) -> Result<Self> {
        config.validate()?;

        let discovery_addr = SocketAddr::V4(SocketAddrV4::new(config.bind_addr, config.broadcast_port));
        let discovery_socket = bind_discovery_socket(discovery_addr)?;

        let probe_addr = SocketAddr::V4(SocketAddrV4::new(config.bind_addr, 0));
        let probe_listener = TcpListener::bind(probe_addr)
            .await
            .map_err(|source| DiscoveryError::Bind { addr: probe_addr, source })?;

        Ok(Self {
            neighbors: NeighborTable::shared(config.eviction_threshold),
            config,
            identity,
            discovery_socket: Arc::new(discovery_socket),
            probe_listener,
        })
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn probe_port(&self) -> Result<u16> {
        Ok(self.probe_listener.local_addr()?.port())
    }

    /// Spawn the announcer, listener and responder.
    pub fn start(self) -> Result<NodeHandle> {
        let probe_port = self.probe_port()?;
        let shutdown = Shutdown::new();
        let destination = SocketAddr::V4(SocketAddrV4::new(
            self.config.broadcast_addr,
            self.config.broadcast_port,
        ));
        let probe = ProbeSettings {
            timeout: self.config.probe_timeout(),
            clock: self.config.clock,
        };

        let announcer = task::spawn(run_announcer(
            self.discovery_socket.clone(),
            destination,
            Announcement::new(self.identity.clone(), probe_port),
            self.config.announce_interval(),
            shutdown.clone(),
        ));

        let listener = task::spawn(
            DiscoveryListener::new(self.identity.clone(), self.neighbors.clone(), probe)
                .run(self.discovery_socket.clone(), shutdown.clone()),
        );

        let responder = task::spawn(run_responder(
            self.probe_listener,
            self.config.clock,
            self.config.probe_timeout(),
            shutdown.clone(),
        ));

        info!(
            identity = %self.identity,
            probe_port,
            broadcast_port = self.config.broadcast_port,
            "Node started"
        );

        Ok(NodeHandle {
            identity: self.identity,
            probe_port,
            neighbors: self.neighbors,
            shutdown,
            tasks: vec![announcer, listener, responder],
        })
    }
}

/// Running node: read access to the neighbor table and a stop hook.
pub struct NodeHandle {
    identity: PeerIdentity,
    probe_port: u16,
    neighbors: SharedNeighbors,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn probe_port(&self) -> u16 {
        self.probe_port
    }

    pub fn neighbors(&self) -> SharedNeighbors {
        self.neighbors.clone()
    }

    pub fn snapshot(&self) -> Vec<NeighborRecord> {
        self.neighbors.snapshot()
    }

    /// Signal every component to stop and wait for them to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        for result in futures_util::future::join_all(self.tasks).await {
            if let Err(e) = result {
                warn!("Component task failed: {}", e);
            }
        }
        info!(identity = %self.identity, "Node stopped");
    }
}

/// Discovery socket: reusable so several nodes can share a host, broadcast-capable.
fn bind_discovery_socket(addr: SocketAddr) -> Result<UdpSocket> {
    let bind_error = |source| DiscoveryError::Bind { addr, source };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_error)?;
    socket.set_reuse_address(true).map_err(bind_error)?;
    socket.set_broadcast(true).map_err(bind_error)?;
    socket.set_nonblocking(true).map_err(bind_error)?;
    socket.bind(&addr.into()).map_err(bind_error)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(bind_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn loopback_config() -> DiscoveryConfig {
        DiscoveryConfig {
            broadcast_port: 0,
            broadcast_addr: Ipv4Addr::LOCALHOST,
            bind_addr: Ipv4Addr::LOCALHOST,
            announce_interval_secs: 0.05,
            ..DiscoveryConfig::default()
        }
    }

    #[tokio::test]
    async fn rejects_invalid_config_before_binding() {
        let config = DiscoveryConfig {
            eviction_threshold: 0,
            ..loopback_config()
        };
        let err = Node::bind(config).await.err().unwrap();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }

    #[tokio::test]
    async fn unassignable_address_is_bind_error() {
        // TEST-NET-3: never configured on a local interface.
        let config = DiscoveryConfig {
            bind_addr: Ipv4Addr::new(203, 0, 113, 7),
            ..loopback_config()
        };
        let err = Node::bind(config).await.err().unwrap();
        match err {
            DiscoveryError::Bind { addr, .. } => {
                assert_eq!(addr.ip(), std::net::IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)));
            }
            other => panic!("expected bind error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn starts_and_stops() {
        let node = Node::bind(loopback_config()).await.unwrap();
        let identity = node.identity().clone();
        let probe_port = node.probe_port().unwrap();
        assert_ne!(probe_port, 0);

        let handle = node.start().unwrap();
        assert_eq!(handle.identity(), &identity);
        assert_eq!(handle.probe_port(), probe_port);
        assert!(handle.snapshot().is_empty());

        tokio::time::timeout(Duration::from_secs(2), handle.stop())
            .await
            .expect("node should stop promptly");
    }
}
