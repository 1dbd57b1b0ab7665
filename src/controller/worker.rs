use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::debug;
use tracing::info;

use super::ControllerContext;
use super::Reconciler;
use crate::metrics::DROPPED_KEYS;
use crate::metrics::RECONCILE_DURATION;
use crate::metrics::RECONCILE_TOTAL;
use crate::ControllerError;
use crate::Error;
use crate::ObjectKey;
use crate::RateLimitingQueue;
use crate::ReconcileError;
use crate::Resource;
use crate::Result;

/// Marks the key done when dropped, whatever path left the handler.
struct DoneGuard<'a> {
    queue: &'a RateLimitingQueue<ObjectKey>,
    key: &'a ObjectKey,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.done(self.key);
    }
}

pub(crate) struct Worker<T: Resource> {
    id: usize,
    ctx: ControllerContext<T>,
    reconciler: Arc<dyn Reconciler>,
}

impl<T: Resource> Worker<T> {
    pub(crate) fn new(
        id: usize,
        ctx: ControllerContext<T>,
        reconciler: Arc<dyn Reconciler>,
    ) -> Self {
        Self { id, ctx, reconciler }
    }

    /// Processes keys until the queue shuts down.
    pub(crate) async fn run(self) -> Result<()> {
        debug!(controller = %self.ctx.name(), worker = self.id, "worker started");
        while self.process_next_item().await {}
        debug!(controller = %self.ctx.name(), worker = self.id, "worker stopped");
        Ok(())
    }

    /// Handles one key. Returns `false` once the queue is shut down and empty.
    pub(crate) async fn process_next_item(&self) -> bool {
        let Some(key) = self.ctx.queue.get().await else {
            return false;
        };
        let _done = DoneGuard {
            queue: &self.ctx.queue,
            key: &key,
        };

        let result = self.reconcile(&key).await;
        self.handle_err(result, &key);
        true
    }

    async fn reconcile(
        &self,
        key: &ObjectKey,
    ) -> std::result::Result<(), ReconcileError> {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(async { self.reconciler.reconcile(key).await })
            .catch_unwind()
            .await;
        RECONCILE_DURATION
            .with_label_values(&[self.ctx.name()])
            .observe(started.elapsed().as_secs_f64() * 1000.0);

        outcome.unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            self.ctx.reporter.handle_crash(&message);
            Err(ReconcileError::Panicked(message))
        })
    }

    fn handle_err(
        &self,
        result: std::result::Result<(), ReconcileError>,
        key: &ObjectKey,
    ) {
        let name = self.ctx.name();
        let error = match result {
            Ok(()) => {
                RECONCILE_TOTAL.with_label_values(&[name, "success"]).inc();
                self.ctx.queue.forget(key);
                return;
            }
            Err(error) => error,
        };
        RECONCILE_TOTAL.with_label_values(&[name, "error"]).inc();

        let requeues = self.ctx.queue.num_requeues(key);
        if requeues < self.ctx.settings.controller.retry_ceiling {
            info!("Error syncing {} {}: {}", T::kind(), key, error);
            self.ctx.queue.add_rate_limited(key.clone());
            return;
        }

        self.ctx.queue.forget(key);
        DROPPED_KEYS.with_label_values(&[name]).inc();
        let error: Error = ControllerError::RetryExhausted {
            key: key.clone(),
            attempts: requeues + 1,
            source: error,
        }
        .into();
        self.ctx.reporter.handle_error(&error);
        info!("Dropping {} {:?} out of the queue: {}", T::kind(), key.as_str(), error);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
