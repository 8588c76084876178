use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::{DiscoveryError, Result};
use crate::types::{NeighborRecord, PeerIdentity};

pub type SharedNeighbors = Arc<NeighborTable>;

/// Outcome of a single broadcast sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting; the caller owns the probe for this generation of the record.
    Discovered { generation: u64 },
    Sighted { liveness: u32 },
    Evicted { liveness: u32 },
}

/// Concurrent map of discovered peers.
///
/// Every method is one critical section on the identity's shard, so a
/// listener increment and a prober write to the same record never interleave.
/// Each created record gets a fresh generation; probe results carry the
/// generation they were started for and are rejected by any later record.
#[derive(Debug)]
pub struct NeighborTable {
    peers: DashMap<PeerIdentity, NeighborRecord>,
    eviction_threshold: u32,
    next_generation: AtomicU64,
}

impl NeighborTable {
    pub fn new(eviction_threshold: u32) -> Self {
        Self {
            peers: DashMap::new(),
            eviction_threshold,
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn shared(eviction_threshold: u32) -> SharedNeighbors {
        Arc::new(Self::new(eviction_threshold))
    }

    pub fn eviction_threshold(&self) -> u32 {
        self.eviction_threshold
    }

    /// Apply one sighting: create, or increment and evict at the threshold.
    pub fn observe(&self, identity: &PeerIdentity, address: IpAddr, probe_port: u16) -> Observation {
        match self.peers.entry(identity.clone()) {
            Entry::Vacant(vacant) => {
                let generation = self.allocate_generation();
                vacant.insert(NeighborRecord::discovered(
                    identity.clone(),
                    generation,
                    address,
                    probe_port,
                ));
                info!(peer = %identity, %address, probe_port, generation, "Discovered neighbor");
                Observation::Discovered { generation }
            }
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.liveness = record.liveness.saturating_add(1);
                let liveness = record.liveness;
                if liveness >= self.eviction_threshold {
                    occupied.remove();
                    info!(peer = %identity, liveness, "Evicted neighbor");
                    Observation::Evicted { liveness }
                } else {
                    debug!(peer = %identity, liveness, "Sighted neighbor");
                    Observation::Sighted { liveness }
                }
            }
        }
    }

    /// Insert a fresh record unless one exists. Returns its generation when created.
    pub fn get_or_create(&self, identity: &PeerIdentity, address: IpAddr, probe_port: u16) -> Option<u64> {
        match self.peers.entry(identity.clone()) {
            Entry::Vacant(vacant) => {
                let generation = self.allocate_generation();
                vacant.insert(NeighborRecord::discovered(
                    identity.clone(),
                    generation,
                    address,
                    probe_port,
                ));
                Some(generation)
            }
            Entry::Occupied(_) => None,
        }
    }

    pub fn increment(&self, identity: &PeerIdentity) -> Option<u32> {
        self.peers.get_mut(identity).map(|mut record| {
            record.liveness = record.liveness.saturating_add(1);
            record.liveness
        })
    }

    pub fn remove_if_threshold_reached(&self, identity: &PeerIdentity) -> bool {
        self.peers
            .remove_if(identity, |_, record| record.liveness >= self.eviction_threshold)
            .is_some()
    }

    /// Record a completed probe. The liveness counter is left untouched.
    ///
    /// Fails with `UnknownPeer` unless the record is the one the probe was
    /// started for and that probe is still outstanding.
    pub fn set_delay(&self, identity: &PeerIdentity, generation: u64, delay_secs: f64) -> Result<()> {
        let mut record = self
            .peers
            .get_mut(identity)
            .filter(|record| record.generation == generation && record.probe_in_flight)
            .ok_or_else(|| DiscoveryError::UnknownPeer(identity.to_string()))?;
        record.estimated_delay_secs = Some(delay_secs);
        record.probe_in_flight = false;
        Ok(())
    }

    /// Close out a failed probe, leaving the delay unset. Returns false when
    /// the record is gone or belongs to a later generation.
    pub fn finish_probe(&self, identity: &PeerIdentity, generation: u64) -> bool {
        match self.peers.get_mut(identity) {
            Some(mut record) if record.generation == generation && record.probe_in_flight => {
                record.probe_in_flight = false;
                true
            }
            _ => false,
        }
    }

    fn allocate_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, identity: &PeerIdentity) -> Option<NeighborRecord> {
        self.peers.get(identity).map(|record| record.clone())
    }

    pub fn contains(&self, identity: &PeerIdentity) -> bool {
        self.peers.contains_key(identity)
    }

    /// Point-in-time copy of every record, ordered by identity.
    pub fn snapshot(&self) -> Vec<NeighborRecord> {
        let mut records: Vec<NeighborRecord> =
            self.peers.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        records
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
