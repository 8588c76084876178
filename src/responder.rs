use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::{task, time};
use tracing::{debug, warn};

use crate::clock::ClockMode;
use crate::select_stream_or_shutdown::Shutdown;
use crate::server_loop::serve_stream;
use crate::types::GenericBoxedStream;
use crate::wire::encode_timestamp;

const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

pub fn accept_stream(listener: TcpListener) -> impl Stream<Item = (TcpStream, SocketAddr)> {
    stream! {
        loop {
            match listener.accept().await {
                Ok(pair) => yield pair,
                Err(e) => {
                    warn!("Probe accept error: {}", e);
                    time::sleep(ACCEPT_ERROR_PAUSE).await;
                }
            }
        }
    }
}

/// Answer every probe connection with the local timestamp, then close it.
pub async fn run_responder(
    listener: TcpListener,
    clock: ClockMode,
    write_timeout: Duration,
    shutdown: Shutdown,
) {
    let connections: GenericBoxedStream<(TcpStream, SocketAddr)> =
        Box::pin(accept_stream(listener));

    serve_stream("responder", connections, shutdown, move |(stream, addr)| {
        task::spawn(async move {
            match time::timeout(write_timeout, reply_with_timestamp(stream, clock)).await {
                Ok(Ok(timestamp)) => debug!(%addr, timestamp, "Answered probe"),
                Ok(Err(e)) => warn!(%addr, "Probe reply failed: {}", e),
                Err(_) => warn!(%addr, "Probe reply timed out"),
            }
        });
    })
    .await;
}

pub async fn reply_with_timestamp(mut stream: TcpStream, clock: ClockMode) -> io::Result<i64> {
    let timestamp = clock.now();
    stream.write_all(&encode_timestamp(timestamp)).await?;
    stream.shutdown().await?;
    Ok(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::decode_timestamp;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn replies_with_subsecond_timestamp_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server = tokio::spawn(run_responder(
            listener,
            ClockMode::Subsec,
            Duration::from_secs(1),
            shutdown.clone(),
        ));

        for _ in 0..2 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let mut reply = Vec::new();
            client.read_to_end(&mut reply).await.unwrap();
            let timestamp = decode_timestamp(&reply).unwrap();
            assert!((0..1_000_000).contains(&timestamp));
        }

        shutdown.trigger();
        time::timeout(Duration::from_secs(1), server)
            .await
            .expect("responder should stop on shutdown")
            .unwrap();
    }
}
