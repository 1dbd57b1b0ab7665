use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::ListWatch;
use crate::ObjectList;
use crate::WatchError;
use crate::WatchEvent;
use crate::WatchStream;

type EventSender<T> = mpsc::UnboundedSender<Result<WatchEvent<T>, WatchError>>;

struct FakeState<T> {
    items: Vec<T>,
    resource_version: String,
    failing_lists: usize,
    expire_next_watch: bool,
    watch_versions: Vec<String>,
    current: Option<EventSender<T>>,
}

/// Scriptable list/watch source.
///
/// Every `watch` call opens a fresh channel; events pushed with
/// [`FakeListWatch::send`] go to the most recent one.
pub struct FakeListWatch<T> {
    state: Mutex<FakeState<T>>,
    lists: watch::Sender<usize>,
    watches: watch::Sender<usize>,
    lists_open: watch::Sender<bool>,
}

impl<T: Clone + Send + Sync + 'static> FakeListWatch<T> {
    pub fn new(
        items: Vec<T>,
        resource_version: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                items,
                resource_version: resource_version.to_string(),
                failing_lists: 0,
                expire_next_watch: false,
                watch_versions: Vec::new(),
                current: None,
            }),
            lists: watch::channel(0).0,
            watches: watch::channel(0).0,
            lists_open: watch::channel(true).0,
        })
    }

    /// Content served by the next `list`.
    pub fn set_items(
        &self,
        items: Vec<T>,
        resource_version: &str,
    ) {
        let mut state = self.state.lock();
        state.items = items;
        state.resource_version = resource_version.to_string();
    }

    pub fn fail_next_lists(
        &self,
        n: usize,
    ) {
        self.state.lock().failing_lists = n;
    }

    /// Makes `list` block until [`FakeListWatch::release_lists`].
    pub fn hold_lists(&self) {
        self.lists_open.send_replace(false);
    }

    pub fn release_lists(&self) {
        self.lists_open.send_replace(true);
    }

    /// Next `watch` call fails with [`WatchError::Expired`].
    pub fn expire_next_watch(&self) {
        self.state.lock().expire_next_watch = true;
    }

    pub fn send(
        &self,
        event: WatchEvent<T>,
    ) {
        self.push(Ok(event));
    }

    /// Ends the current watch stream with an error item.
    pub fn fail_watch(
        &self,
        error: WatchError,
    ) {
        self.push(Err(error));
        self.close_watch();
    }

    /// Ends the current watch stream cleanly.
    pub fn close_watch(&self) {
        self.state.lock().current = None;
    }

    pub fn list_calls(&self) -> usize {
        *self.lists.borrow()
    }

    pub fn watch_calls(&self) -> usize {
        *self.watches.borrow()
    }

    /// Resource versions passed to `watch`, in call order.
    pub fn watch_versions(&self) -> Vec<String> {
        self.state.lock().watch_versions.clone()
    }

    /// Waits until `watch` has been called at least `n` times.
    pub async fn wait_for_watches(
        &self,
        n: usize,
    ) {
        let mut rx = self.watches.subscribe();
        let _ = rx.wait_for(|calls| *calls >= n).await;
    }

    pub async fn wait_for_lists(
        &self,
        n: usize,
    ) {
        let mut rx = self.lists.subscribe();
        let _ = rx.wait_for(|calls| *calls >= n).await;
    }

    fn push(
        &self,
        item: Result<WatchEvent<T>, WatchError>,
    ) {
        if let Some(tx) = self.state.lock().current.as_ref() {
            let _ = tx.send(item);
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> ListWatch<T> for FakeListWatch<T> {
    async fn list(&self) -> Result<ObjectList<T>, WatchError> {
        let mut open = self.lists_open.subscribe();
        let _ = open.wait_for(|open| *open).await;

        self.lists.send_modify(|calls| *calls += 1);
        let mut state = self.state.lock();
        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            return Err(WatchError::ListFailed("injected list failure".to_string()));
        }
        Ok(ObjectList {
            items: state.items.clone(),
            resource_version: state.resource_version.clone(),
        })
    }

    async fn watch(
        &self,
        resource_version: &str,
    ) -> Result<WatchStream<T>, WatchError> {
        let result = {
            let mut state = self.state.lock();
            state.watch_versions.push(resource_version.to_string());
            if std::mem::take(&mut state.expire_next_watch) {
                Err(WatchError::Expired(resource_version.to_string()))
            } else {
                let (tx, rx) = mpsc::unbounded_channel();
                state.current = Some(tx);
                Ok(UnboundedReceiverStream::new(rx).boxed())
            }
        };
        self.watches.send_modify(|calls| *calls += 1);
        result
    }
}
