//! The canonical pod controller: print what the cache holds for each key.
//!
//! Scenario:
//!
//! 1. The source lists pods `x` and `y`.
//! 2. After the first reconciles, `y` is deleted and `x` is modified.
//! 3. The stop signal fires.
//!
//! Expected Result:
//!
//! - Listed pods are reported as synced.
//! - The deleted pod is reported as gone, not as an error.
//! - The controller stops cleanly.

use std::time::Duration;

use ctrl_loop::ControllerBuilder;
use ctrl_loop::ControllerSettings;
use ctrl_loop::StdoutReconciler;
use ctrl_loop::WatchEvent;
use tokio::sync::watch;

use crate::common::enable_logger;
use crate::common::pod;
use crate::common::Output;
use crate::common::Pod;
use crate::common::PodSource;
use crate::common::WAIT_TIMEOUT;

#[tokio::test]
async fn test_pod_controller_prints_cache_state() {
    enable_logger();
    let source = PodSource::new(vec![pod("x", "1"), pod("y", "1")]);
    let out = Output::default();
    let (stop_tx, stop_rx) = watch::channel(());

    let mut settings = ControllerSettings::default();
    settings.controller.name = "pod".to_string();
    let controller = ControllerBuilder::<Pod>::init(settings, stop_rx)
        .build(source.clone(), |ctx| {
            StdoutReconciler::with_writer(ctx.indexer.clone(), out.clone())
        })
        .unwrap();
    let handle = tokio::spawn(controller.run());

    let mut listed = out.wait_for_lines(2).await;
    listed.sort();
    assert_eq!(listed, vec!["Sync/Add/Update for Pod x", "Sync/Add/Update for Pod y"]);

    source.watching().await;
    source.send(WatchEvent::Deleted(pod("y", "2")));
    let lines = out.wait_for_lines(3).await;
    assert_eq!(lines[2], "Pod default/y does not exist anymore");

    source.send(WatchEvent::Modified(pod("x", "3")));
    let lines = out.wait_for_lines(4).await;
    assert_eq!(lines[3], "Sync/Add/Update for Pod x");

    stop_tx.send(()).unwrap();
    tokio::time::timeout(WAIT_TIMEOUT, handle)
        .await
        .expect("controller did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_idle_controller_stops_without_reconciling() {
    enable_logger();
    let source = PodSource::new(vec![]);
    let out = Output::default();
    let (stop_tx, stop_rx) = watch::channel(());

    let mut settings = ControllerSettings::default();
    settings.controller.name = "idle-pod".to_string();
    settings.controller.workers = 4;
    let controller = ControllerBuilder::<Pod>::init(settings, stop_rx)
        .build(source.clone(), |ctx| {
            StdoutReconciler::with_writer(ctx.indexer.clone(), out.clone())
        })
        .unwrap();
    let mut sync = controller.sync_handle();
    let handle = tokio::spawn(controller.run());

    let mut probe = stop_tx.subscribe();
    assert!(sync.wait_for_sync(&mut probe).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    stop_tx.send(()).unwrap();
    tokio::time::timeout(WAIT_TIMEOUT, handle)
        .await
        .expect("controller did not stop")
        .unwrap()
        .unwrap();
    assert!(out.lines().is_empty());
}
