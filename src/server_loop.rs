use crate::select_stream_or_shutdown::{select_stream_or_shutdown, Next, Shutdown};
use crate::types::GenericBoxedStream;

use tracing::info;

/// Drain a stream into `handler` until it ends or shutdown is requested
pub async fn serve_stream<T>(
    name: &'static str,
    mut stream: GenericBoxedStream<T>,
    shutdown: Shutdown,
    mut handler: impl FnMut(T) + Send,
) {
    loop {
        match select_stream_or_shutdown(stream.as_mut(), &shutdown).await {
            Next::Item(item) => handler(item),
            Next::Ended => {
                info!("{}: stream ended", name);
                break;
            }
            Next::Shutdown => {
                info!("{}: shutdown requested", name);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn hands_every_item_to_handler() {
        let mut seen = Vec::new();
        let items: GenericBoxedStream<u32> = Box::pin(stream::iter(vec![3, 1, 2]));
        serve_stream("test", items, Shutdown::new(), |item| seen.push(item)).await;
        assert_eq!(seen, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn stops_on_prior_shutdown() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut count = 0;
        let items: GenericBoxedStream<u32> = Box::pin(stream::iter(vec![1, 2, 3]));
        serve_stream("test", items, shutdown, |_| count += 1).await;
        assert_eq!(count, 0);
    }
}
