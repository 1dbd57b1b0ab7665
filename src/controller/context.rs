use std::sync::Arc;

use tokio::sync::watch;

use super::ErrorReporter;
use crate::ControllerSettings;
use crate::Indexer;
use crate::ObjectKey;
use crate::RateLimitingQueue;
use crate::Resource;

/// Handles shared by every component of one controller.
pub struct ControllerContext<T: Resource> {
    pub indexer: Arc<Indexer<T>>,
    pub queue: RateLimitingQueue<ObjectKey>,
    pub shutdown: watch::Receiver<()>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub settings: Arc<ControllerSettings>,
}

impl<T: Resource> Clone for ControllerContext<T> {
    fn clone(&self) -> Self {
        Self {
            indexer: self.indexer.clone(),
            queue: self.queue.clone(),
            shutdown: self.shutdown.clone(),
            reporter: self.reporter.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<T: Resource> ControllerContext<T> {
    pub fn name(&self) -> &str {
        &self.settings.controller.name
    }
}
