//! Text formats exchanged between nodes.
//!
//! Announcements travel by UDP broadcast as `"<identity> ON <probe-port>"`.
//! Probe replies are a bare decimal timestamp in microseconds.

use std::fmt;
use std::str::FromStr;

use crate::error::DiscoveryError;
use crate::types::PeerIdentity;

const KEYWORD: &str = "ON";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub identity: PeerIdentity,
    pub probe_port: u16,
}

impl Announcement {
    pub fn new(identity: PeerIdentity, probe_port: u16) -> Self {
        Self { identity, probe_port }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn decode(datagram: &[u8]) -> Result<Self, DiscoveryError> {
        let text = std::str::from_utf8(datagram).map_err(|_| {
            DiscoveryError::MalformedAnnouncement(String::from_utf8_lossy(datagram).into_owned())
        })?;
        text.parse()
    }
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.identity, KEYWORD, self.probe_port)
    }
}

impl FromStr for Announcement {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || DiscoveryError::MalformedAnnouncement(s.to_string());
        let mut parts = s.trim_end_matches(['\r', '\n']).split(' ');

        let identity = parts.next().filter(|id| !id.is_empty()).ok_or_else(malformed)?;
        if parts.next() != Some(KEYWORD) {
            return Err(malformed());
        }
        let probe_port = parts
            .next()
            .and_then(|port| port.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(Self::new(PeerIdentity::new(identity), probe_port))
    }
}

pub fn encode_timestamp(micros: i64) -> Vec<u8> {
    micros.to_string().into_bytes()
}

pub fn decode_timestamp(reply: &[u8]) -> Result<i64, DiscoveryError> {
    let text = String::from_utf8_lossy(reply);
    text.trim()
        .parse::<i64>()
        .map_err(|_| DiscoveryError::MalformedTimestamp(text.into_owned()))
}

/// `|remote - local|` microseconds, as seconds.
pub fn estimate_delay_secs(remote_micros: i64, local_micros: i64) -> f64 {
    remote_micros.abs_diff(local_micros) as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_announcement() {
        let announcement = Announcement::new(PeerIdentity::new("A"), 9001);
        assert_eq!(announcement.encode(), b"A ON 9001".to_vec());
    }

    #[test]
    fn decodes_announcement() {
        let announcement = Announcement::decode(b"3f2a9c1e ON 40123").unwrap();
        assert_eq!(announcement.identity.as_str(), "3f2a9c1e");
        assert_eq!(announcement.probe_port, 40123);

        let announcement = Announcement::decode(b"3f2a9c1e ON 40123\n").unwrap();
        assert_eq!(announcement.probe_port, 40123);
    }

    #[test]
    fn rejects_malformed_announcements() {
        for datagram in [
            &b""[..],
            b"A",
            b"A ON",
            b"A ON ",
            b"A OFF 9001",
            b"A ON port",
            b"A ON 70000",
            b"A ON 9001 extra",
            b" ON 9001",
            b"A  ON 9001",
            b"\xff\xfe ON 9001",
        ] {
            let err = Announcement::decode(datagram).unwrap_err();
            assert!(err.is_protocol(), "{:?} should be malformed", datagram);
        }
    }

    #[test]
    fn decodes_timestamp_reply() {
        assert_eq!(decode_timestamp(b"500000").unwrap(), 500_000);
        assert_eq!(decode_timestamp(b" 42\r\n").unwrap(), 42);
        assert!(matches!(
            decode_timestamp(b"soon"),
            Err(DiscoveryError::MalformedTimestamp(_))
        ));
        assert!(decode_timestamp(b"").is_err());
    }

    #[test]
    fn delay_is_absolute_difference_in_seconds() {
        assert_eq!(estimate_delay_secs(500_000, 200_000), 0.3);
        assert_eq!(estimate_delay_secs(200_000, 500_000), 0.3);
        assert_eq!(estimate_delay_secs(7, 7), 0.0);
    }
}
