use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use futures_util::Stream;
use futures_util::StreamExt;

/// Latched shutdown signal shared by every long-lived component.
///
/// A trigger that lands while a component is busy (not parked in `wait`)
/// is still observed on its next wait.
#[derive(Debug, Default, Clone)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    triggered: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        // Register before checking the flag so a concurrent trigger is not lost.
        let notified = self.inner.notify.notified();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}

pub enum Next<T> {
    Item(T),
    Ended,
    Shutdown,
}

/// Await the next item from a stream or a shutdown signal.
pub async fn select_stream_or_shutdown<T>(
    mut stream: Pin<&mut (dyn Stream<Item = T> + Send)>,
    shutdown: &Shutdown,
) -> Next<T> {
    if shutdown.is_triggered() {
        return Next::Shutdown;
    }
    tokio::select! {
        item = stream.next() => match item {
            Some(item) => Next::Item(item),
            None => Next::Ended,
        },
        _ = shutdown.wait() => Next::Shutdown,
    }
}
