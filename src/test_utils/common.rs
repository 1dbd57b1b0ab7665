use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use crate::ObjectMeta;
use crate::Resource;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPod {
    pub meta: ObjectMeta,
    pub phase: String,
}

impl TestPod {
    pub fn new(meta: ObjectMeta) -> Self {
        Self {
            meta,
            phase: "Running".to_string(),
        }
    }
}

impl Resource for TestPod {
    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn kind() -> &'static str {
        "Pod"
    }
}

/// Namespaced pod with a resource version.
pub fn pod(
    namespace: &str,
    name: &str,
    resource_version: &str,
) -> TestPod {
    TestPod::new(ObjectMeta::new(Some(namespace), name).with_resource_version(resource_version))
}

/// In-memory writer whose content can be read back after the fact.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl io::Write for SharedBuffer {
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

/// Polls `condition` every few milliseconds; panics after five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
}
