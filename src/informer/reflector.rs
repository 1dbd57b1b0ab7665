//! Keeps an [`Indexer`] in step with a [`ListWatch`] source.
//!
//! One cycle lists the whole collection, replaces the cache content with it,
//! then follows the watch stream from the listed resource version. Each
//! event mutates the cache first and only then reaches the event handler, so
//! a worker that dequeues a key always sees a cache at least as fresh as the
//! event that produced it.
//!
//! - A watch stream that ends cleanly is re-opened from the last seen version.
//! - [`WatchError::Expired`] starts a new cycle at once.
//! - Any other failure starts a new cycle after a jittered pause.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::interval_at;
use tokio::time::sleep;
use tokio::time::Instant;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use super::dispatch;
use super::ListWatch;
use super::ObjectList;
use super::ResourceEventHandler;
use super::WatchEvent;
use crate::metrics::REFLECTOR_EVENTS;
use crate::metrics::REFLECTOR_RELISTS;
use crate::utils::async_task::jittered;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::DeletedObject;
use crate::Delta;
use crate::Error;
use crate::Indexer;
use crate::ReflectorConfig;
use crate::Resource;
use crate::Result;
use crate::WatchError;

/// How a list-and-watch cycle ended without failing.
#[derive(Debug, PartialEq, Eq)]
enum CycleEnd {
    /// The stop signal fired
    Stopped,
    /// The watch version expired; list again
    Relist,
}

/// Read side of the reflector's synced signal.
#[derive(Clone)]
pub struct SyncHandle {
    synced_rx: watch::Receiver<bool>,
}

impl SyncHandle {
    /// Whether the first listing has been fully applied to the cache.
    pub fn has_synced(&self) -> bool {
        *self.synced_rx.borrow()
    }

    /// Waits for the first listing to be applied.
    ///
    /// Returns `false` if the stop signal fires first, or if the reflector
    /// went away without ever syncing.
    pub async fn wait_for_sync(
        &mut self,
        shutdown: &mut watch::Receiver<()>,
    ) -> bool {
        tokio::select! {
            biased;
            synced = self.synced_rx.wait_for(|synced| *synced) => synced.is_ok(),
            _ = shutdown.changed() => false,
        }
    }
}

pub struct Reflector<T: Resource> {
    name: String,
    list_watch: Arc<dyn ListWatch<T>>,
    store: Arc<Indexer<T>>,
    handler: Arc<dyn ResourceEventHandler<T>>,
    config: ReflectorConfig,
    synced_tx: watch::Sender<bool>,
    last_sync_resource_version: String,
}

impl<T: Resource> Reflector<T> {
    pub fn new(
        name: impl Into<String>,
        list_watch: Arc<dyn ListWatch<T>>,
        store: Arc<Indexer<T>>,
        handler: Arc<dyn ResourceEventHandler<T>>,
        config: ReflectorConfig,
    ) -> Self {
        let (synced_tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            list_watch,
            store,
            handler,
            config,
            synced_tx,
            last_sync_resource_version: String::new(),
        }
    }

    pub fn sync_handle(&self) -> SyncHandle {
        SyncHandle {
            synced_rx: self.synced_tx.subscribe(),
        }
    }

    /// Lists and watches until `shutdown` fires.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        info!(reflector = %self.name, "starting reflector");
        loop {
            match self.list_and_watch(&mut shutdown).await {
                Ok(CycleEnd::Stopped) => break,
                Ok(CycleEnd::Relist) => continue,
                Err(e) => {
                    let pause = jittered(self.config.relist_period(), self.config.jitter);
                    warn!(reflector = %self.name, error = %e, ?pause, "list and watch failed, relisting");
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        _ = sleep(pause) => {}
                    }
                }
            }
        }
        info!(reflector = %self.name, "stopping reflector");
        Ok(())
    }

    #[instrument(skip_all, fields(reflector = %self.name))]
    async fn list_and_watch(
        &mut self,
        shutdown: &mut watch::Receiver<()>,
    ) -> Result<CycleEnd> {
        let list_watch = self.list_watch.clone();
        let listing = tokio::select! {
            biased;
            _ = shutdown.changed() => return Ok(CycleEnd::Stopped),
            listing = task_with_timeout_and_exponential_backoff(
                || {
                    let list_watch = list_watch.clone();
                    async move { list_watch.list().await.map_err(Error::from) }
                },
                self.config.list_retry,
            ) => listing?,
        };
        self.apply_listing(listing);

        let mut resync = self.config.resync_period().map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            debug!(resource_version = %self.last_sync_resource_version, "starting watch");
            let mut stream = tokio::select! {
                biased;
                _ = shutdown.changed() => return Ok(CycleEnd::Stopped),
                stream = self.list_watch.watch(&self.last_sync_resource_version) => match stream {
                    Ok(stream) => stream,
                    Err(WatchError::Expired(version)) => {
                        info!(%version, "watch version expired, relisting");
                        return Ok(CycleEnd::Relist);
                    }
                    Err(e) => return Err(e.into()),
                },
            };

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => return Ok(CycleEnd::Stopped),
                    _ = next_resync(&mut resync) => self.resync(),
                    event = stream.next() => match event {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(WatchError::Expired(version))) => {
                            info!(%version, "watch version expired, relisting");
                            return Ok(CycleEnd::Relist);
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            debug!("watch stream closed, re-watching");
                            break;
                        }
                    },
                }
            }
        }
    }

    fn apply_listing(
        &mut self,
        listing: ObjectList<T>,
    ) {
        let ObjectList {
            items,
            resource_version,
        } = listing;
        let deltas = self.store.replace(items.into_iter().map(Arc::new).collect());
        REFLECTOR_RELISTS.with_label_values(&[self.name.as_str()]).inc();
        for delta in &deltas {
            self.deliver(delta);
        }
        self.last_sync_resource_version = resource_version;

        let first = !self.synced_tx.send_replace(true);
        info!(
            items = self.store.len(),
            resource_version = %self.last_sync_resource_version,
            first,
            "listing applied"
        );
    }

    fn handle_event(
        &mut self,
        event: WatchEvent<T>,
    ) {
        let (resource_version, applied) = match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                (obj.meta().resource_version.clone(), self.store.upsert(Arc::new(obj)))
            }
            WatchEvent::Deleted(obj) => (
                obj.meta().resource_version.clone(),
                self.store.delete(DeletedObject::Object(Arc::new(obj))),
            ),
            WatchEvent::Bookmark { resource_version } => {
                trace!(%resource_version, "bookmark");
                self.last_sync_resource_version = resource_version;
                return;
            }
        };

        match applied {
            Ok(delta) => self.deliver(&delta),
            Err(error) => warn!(%error, "skipping watch event"),
        }
        if !resource_version.is_empty() {
            self.last_sync_resource_version = resource_version;
        }
    }

    fn resync(&self) {
        let deltas = self.store.sync_deltas();
        debug!(items = deltas.len(), "resync");
        for delta in &deltas {
            self.deliver(delta);
        }
    }

    fn deliver(
        &self,
        delta: &Delta<T>,
    ) {
        REFLECTOR_EVENTS
            .with_label_values(&[self.name.as_str(), delta.delta_type().as_str()])
            .inc();
        dispatch(self.handler.as_ref(), delta);
    }
}

async fn next_resync(resync: &mut Option<Interval>) {
    match resync {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
