//! Startup and shutdown of one controller.
//!
//! [`Controller::run`] starts the reflector, waits for its first listing to
//! land in the cache, then starts the workers. Workers never see a partially
//! populated cache. A stop signal before that point aborts startup with
//! [`ControllerError::CacheSyncTimeout`].

use std::sync::Arc;

use futures::future::join_all;
use tracing::error;
use tracing::info;

use super::ControllerContext;
use super::Reconciler;
use super::Worker;
use crate::utils::async_task::spawn_task;
use crate::ControllerError;
use crate::Error;
use crate::Reflector;
use crate::Resource;
use crate::Result;
use crate::SyncHandle;

pub struct Controller<T: Resource> {
    ctx: ControllerContext<T>,
    reflector: Reflector<T>,
    reconciler: Arc<dyn Reconciler>,
}

impl<T: Resource> Controller<T> {
    pub(super) fn new(
        ctx: ControllerContext<T>,
        reflector: Reflector<T>,
        reconciler: Arc<dyn Reconciler>,
    ) -> Self {
        Self {
            ctx,
            reflector,
            reconciler,
        }
    }

    pub fn context(&self) -> &ControllerContext<T> {
        &self.ctx
    }

    /// Observes whether the cache has finished its first listing.
    pub fn sync_handle(&self) -> SyncHandle {
        self.reflector.sync_handle()
    }

    /// Runs until the stop signal fires and every worker has exited.
    ///
    /// # Errors
    /// - [`ControllerError::CacheSyncTimeout`] when the stop signal fires
    ///   before the cache synced; no worker is started in that case
    /// - [`crate::SystemError::TaskFailed`] when the reflector task panicked
    pub async fn run(self) -> Result<()> {
        let Controller {
            ctx,
            reflector,
            reconciler,
        } = self;
        let name = ctx.name().to_string();
        info!("Starting {} controller", name);

        let mut shutdown = ctx.shutdown.clone();
        let mut sync = reflector.sync_handle();
        let reflector_handle = tokio::spawn(reflector.run(shutdown.clone()));

        if !sync.wait_for_sync(&mut shutdown).await {
            let error: Error = ControllerError::CacheSyncTimeout.into();
            ctx.reporter.handle_error(&error);
            ctx.queue.shut_down();
            reflector_handle.await??;
            return Err(error);
        }

        let workers = ctx.settings.controller.workers;
        info!("Caches synced for {} controller, starting {} workers", name, workers);
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker::new(id, ctx.clone(), reconciler.clone());
            spawn_task(&format!("{name}-worker-{id}"), move || worker.run(), Some(&mut handles));
        }

        let _ = shutdown.changed().await;
        info!("Stopping {} controller", name);
        ctx.queue.shut_down();

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("{} worker exited abnormally: {:?}", name, e);
            }
        }
        reflector_handle.await??;
        info!("{} controller stopped", name);
        Ok(())
    }
}
