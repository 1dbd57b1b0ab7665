//! A key whose reconcile keeps failing is retried with backoff and then
//! dropped.
//!
//! Scenario:
//!
//! 1. The source lists pod `z`; every reconcile of `default/z` fails.
//! 2. Later the pod is modified.
//!
//! Expected Result:
//!
//! - `default/z` is attempted six times, then reported once as dropped.
//! - Nothing requeues it on its own afterwards.
//! - A fresh event makes it eligible again.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ctrl_loop::ControllerBuilder;
use ctrl_loop::ControllerError;
use ctrl_loop::ControllerSettings;
use ctrl_loop::Error;
use ctrl_loop::ErrorReporter;
use ctrl_loop::ObjectKey;
use ctrl_loop::ReconcileError;
use ctrl_loop::Reconciler;
use ctrl_loop::WatchEvent;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::common::enable_logger;
use crate::common::pod;
use crate::common::Pod;
use crate::common::PodSource;
use crate::common::WAIT_TIMEOUT;

#[derive(Clone, Default)]
struct AlwaysFailing {
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl Reconciler for AlwaysFailing {
    async fn reconcile(
        &self,
        key: &ObjectKey,
    ) -> Result<(), ReconcileError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ReconcileError::Failed(format!("cannot sync {key}")))
    }
}

#[derive(Default)]
struct DropRecorder {
    dropped: Mutex<Vec<(String, usize)>>,
}

impl ErrorReporter for DropRecorder {
    fn handle_error(
        &self,
        error: &Error,
    ) {
        if let Error::Controller(ControllerError::RetryExhausted { key, attempts, .. }) = error {
            self.dropped.lock().push((key.to_string(), *attempts));
        }
    }

    fn handle_crash(
        &self,
        message: &str,
    ) {
        panic!("unexpected crash: {message}");
    }
}

async fn wait_for(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_failing_key_is_dropped_after_six_attempts() {
    enable_logger();
    let source = PodSource::new(vec![pod("z", "1")]);
    let reconciler = AlwaysFailing::default();
    let reporter = Arc::new(DropRecorder::default());
    let (stop_tx, stop_rx) = watch::channel(());

    let mut settings = ControllerSettings::default();
    settings.controller.name = "failing-pod".to_string();
    let controller = ControllerBuilder::<Pod>::init(settings, stop_rx)
        .error_reporter(reporter.clone())
        .build(source.clone(), |_| reconciler.clone())
        .unwrap();
    let handle = tokio::spawn(controller.run());

    wait_for(|| !reporter.dropped.lock().is_empty()).await;
    assert_eq!(*reporter.dropped.lock(), vec![("default/z".to_string(), 6)]);
    assert_eq!(reconciler.attempts.load(Ordering::SeqCst), 6);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(reconciler.attempts.load(Ordering::SeqCst), 6);

    source.watching().await;
    source.send(WatchEvent::Modified(pod("z", "2")));
    wait_for(|| reconciler.attempts.load(Ordering::SeqCst) > 6).await;

    stop_tx.send(()).unwrap();
    tokio::time::timeout(WAIT_TIMEOUT, handle)
        .await
        .expect("controller did not stop")
        .unwrap()
        .unwrap();
}
