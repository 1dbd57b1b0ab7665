//! Assembles a [`Controller`] and the context its components share.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let controller = ControllerBuilder::new(shutdown_rx)?
//!     .start_metrics_server()
//!     .build(list_watch, |ctx| StdoutReconciler::new(ctx.indexer.clone()))?;
//! controller.run().await?;
//! ```
//!
//! `build` must be called inside a Tokio runtime: the work queue spawns its
//! delay timer on creation.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::Controller;
use super::ControllerContext;
use super::ErrorReporter;
use super::Reconciler;
use super::TracingErrorReporter;
use crate::metrics;
use crate::utils::async_task::spawn_task;
use crate::ControllerSettings;
use crate::Indexer;
use crate::Indexers;
use crate::ListWatch;
use crate::QueueingEventHandler;
use crate::RateLimitingQueue;
use crate::Reflector;
use crate::Resource;
use crate::Result;

pub struct ControllerBuilder<T: Resource> {
    settings: ControllerSettings,
    shutdown_signal: watch::Receiver<()>,
    indexers: Indexers<T>,
    error_reporter: Option<Arc<dyn ErrorReporter>>,
}

impl<T: Resource> ControllerBuilder<T> {
    /// Loads settings from `CONFIG_PATH` and `CTRL__*` variables.
    pub fn new(shutdown_signal: watch::Receiver<()>) -> Result<Self> {
        let settings = ControllerSettings::new()?.validate()?;
        Ok(Self::init(settings, shutdown_signal))
    }

    /// Uses in-memory settings; they are validated by [`build`](Self::build).
    pub fn init(
        settings: ControllerSettings,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            settings,
            shutdown_signal,
            indexers: Indexers::new(),
            error_reporter: None,
        }
    }

    /// Secondary indexes registered on the cache.
    pub fn indexers(
        mut self,
        indexers: Indexers<T>,
    ) -> Self {
        self.indexers = indexers;
        self
    }

    /// Replaces the default [`TracingErrorReporter`].
    pub fn error_reporter(
        mut self,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        self.error_reporter = Some(reporter);
        self
    }

    /// Serves `/metrics` when `monitoring.prometheus_enabled` is set.
    pub fn start_metrics_server(self) -> Self {
        let monitoring = &self.settings.monitoring;
        if monitoring.prometheus_enabled {
            let port = monitoring.prometheus_port;
            let shutdown = self.shutdown_signal.clone();
            info!("start metric server on port {}", port);
            spawn_task(
                "metrics-server",
                move || metrics::start_metrics_server(port, shutdown),
                None,
            );
        }
        self
    }

    /// Wires cache, queue, event handler, reflector and reconciler together.
    ///
    /// `make_reconciler` receives the shared context so the reconciler can
    /// read from the same cache the reflector writes.
    pub fn build<R, F>(
        self,
        list_watch: Arc<dyn ListWatch<T>>,
        make_reconciler: F,
    ) -> Result<Controller<T>>
    where
        R: Reconciler,
        F: FnOnce(&ControllerContext<T>) -> R,
    {
        let settings = Arc::new(self.settings.validate()?);
        let name = settings.controller.name.clone();

        let indexer = Arc::new(Indexer::with_indexers(self.indexers));
        let queue = RateLimitingQueue::with_policy(name.clone(), &settings.rate_limit);
        let ctx = ControllerContext {
            indexer: indexer.clone(),
            queue: queue.clone(),
            shutdown: self.shutdown_signal,
            reporter: self
                .error_reporter
                .unwrap_or_else(|| Arc::new(TracingErrorReporter) as Arc<dyn ErrorReporter>),
            settings: settings.clone(),
        };

        let reflector = Reflector::new(
            name,
            list_watch,
            indexer,
            Arc::new(QueueingEventHandler::<T>::new(queue)),
            settings.reflector.clone(),
        );
        let reconciler: Arc<dyn Reconciler> = Arc::new(make_reconciler(&ctx));
        Ok(Controller::new(ctx, reflector, reconciler))
    }
}
