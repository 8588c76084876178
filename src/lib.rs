//! Broadcast peer discovery with one-shot delay probes.
//!
//! Every node announces `"<identity> ON <probe-port>"` over UDP broadcast,
//! tracks the peers it hears in a [`NeighborTable`], and probes each newly
//! seen peer once over TCP to estimate the delay between the two clocks.

pub mod announcer;
pub mod clock;
pub mod config;
pub mod error;
pub mod listener;
pub mod neighbors;
pub mod node;
pub mod prober;
pub mod responder;
pub mod select_stream_or_shutdown;
pub mod server_loop;
pub mod types;
pub mod wire;

pub use clock::ClockMode;
pub use config::DiscoveryConfig;
pub use error::{DiscoveryError, Result};
pub use neighbors::{NeighborTable, Observation, SharedNeighbors};
pub use node::{Node, NodeHandle};
pub use types::{NeighborRecord, PeerIdentity};
