use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, trace, warn};

use crate::select_stream_or_shutdown::Shutdown;
use crate::wire::Announcement;

/// Broadcast `announcement` every `interval` until shutdown. Send failures
/// are logged and the next tick tries again.
pub async fn run_announcer(
    socket: Arc<UdpSocket>,
    destination: SocketAddr,
    announcement: Announcement,
    interval: Duration,
    shutdown: Shutdown,
) {
    let payload = announcement.encode();
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match socket.send_to(&payload, destination).await {
                    Ok(_) => trace!(%destination, "Announced {}", announcement),
                    Err(e) => warn!(%destination, "Announcement failed: {}", e),
                }
            }
            _ = shutdown.wait() => {
                info!("announcer: shutdown requested");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeerIdentity;

    #[tokio::test]
    async fn announces_repeatedly_until_shutdown() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let shutdown = Shutdown::new();

        let task = tokio::spawn(run_announcer(
            sender,
            receiver.local_addr().unwrap(),
            Announcement::new(PeerIdentity::new("abcd1234"), 40123),
            Duration::from_millis(20),
            shutdown.clone(),
        ));

        let mut buf = [0u8; 64];
        for _ in 0..2 {
            let (len, _) = time::timeout(Duration::from_secs(1), receiver.recv_from(&mut buf))
                .await
                .expect("announcement should arrive")
                .unwrap();
            assert_eq!(&buf[..len], b"abcd1234 ON 40123");
        }

        shutdown.trigger();
        time::timeout(Duration::from_secs(1), task)
            .await
            .expect("announcer should stop")
            .unwrap();
    }
}
