use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctrl_loop::ListWatch;
use ctrl_loop::ObjectList;
use ctrl_loop::ObjectMeta;
use ctrl_loop::Resource;
use ctrl_loop::WatchError;
use ctrl_loop::WatchEvent;
use ctrl_loop::WatchStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing_subscriber::EnvFilter;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

#[derive(Debug, Clone)]
pub struct Pod {
    pub meta: ObjectMeta,
}

impl Resource for Pod {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn kind() -> &'static str {
        "Pod"
    }
}

pub fn pod(
    name: &str,
    resource_version: &str,
) -> Pod {
    Pod {
        meta: ObjectMeta::new(Some("default"), name).with_resource_version(resource_version),
    }
}

type EventSender = mpsc::UnboundedSender<Result<WatchEvent<Pod>, WatchError>>;

/// In-memory pod source; events pushed with `send` reach the open watch.
pub struct PodSource {
    listing: Mutex<(Vec<Pod>, String)>,
    watcher: Mutex<Option<EventSender>>,
    watching: Notify,
}

impl PodSource {
    pub fn new(pods: Vec<Pod>) -> Arc<Self> {
        Arc::new(Self {
            listing: Mutex::new((pods, "1".to_string())),
            watcher: Mutex::new(None),
            watching: Notify::new(),
        })
    }

    /// Waits until the reflector has opened a watch.
    pub async fn watching(&self) {
        loop {
            let notified = self.watching.notified();
            if self.watcher.lock().is_some() {
                return;
            }
            notified.await;
        }
    }

    pub fn send(
        &self,
        event: WatchEvent<Pod>,
    ) {
        if let Some(tx) = self.watcher.lock().as_ref() {
            let _ = tx.send(Ok(event));
        }
    }
}

#[async_trait]
impl ListWatch<Pod> for PodSource {
    async fn list(&self) -> Result<ObjectList<Pod>, WatchError> {
        let (items, resource_version) = self.listing.lock().clone();
        Ok(ObjectList {
            items,
            resource_version,
        })
    }

    async fn watch(
        &self,
        _resource_version: &str,
    ) -> Result<WatchStream<Pod>, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.watcher.lock() = Some(tx);
        self.watching.notify_waiters();
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Writer shared between a reconciler and the test.
#[derive(Clone, Default)]
pub struct Output(Arc<Mutex<Vec<u8>>>);

impl Output {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub async fn wait_for_lines(
        &self,
        n: usize,
    ) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            let lines = self.lines();
            if lines.len() >= n {
                return lines;
            }
            assert!(tokio::time::Instant::now() < deadline, "expected {n} lines, got {lines:?}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl io::Write for Output {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
