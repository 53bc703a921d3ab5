use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    Arc, Mutex as StdMutex,
};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use shared::domain::AccessUrl;

use crate::{
    ConversionEngine, EditorConfig, EditorInstance, EditorRuntime, InMemoryLocalization,
    LifecycleOrchestrator, Localization, ObjectUrlProvider,
};


struct TestConversionEngine {
    fail_with: Option<String>,
    init_calls: Arc<AtomicU32>,
}

impl TestConversionEngine {
    fn ok() -> Self {
        Self {
            fail_with: None,
            init_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    fn failing(err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            init_calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

#[async_trait]
impl ConversionEngine for TestConversionEngine {
    async fn initialize(&self) -> Result<()> {
        if let Some(err) = &self.fail_with {
            return Err(anyhow!(err.clone()));
        }
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct TestEditorInstance {
    destroyed: Arc<AtomicBool>,
}

impl EditorInstance for TestEditorInstance {
    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

struct TestEditorRuntime {
    fail_with: Option<String>,
    /// First construction attempt (zero-based) that `fail_with` applies to.
    fail_from: u32,
    attempts: Arc<AtomicU32>,
    /// Configs of every successful construction, in order.
    constructed: Arc<StdMutex<Vec<EditorConfig>>>,
    /// Destroy flags of instances handed out, in construction order.
    instances: Arc<StdMutex<Vec<Arc<AtomicBool>>>>,
    in_flight: Arc<AtomicU32>,
    max_in_flight: Arc<AtomicU32>,
    /// When present, `construct` consumes one permit before returning, so a
    /// test can hold a construction open.
    gate: Option<Arc<Semaphore>>,
}

impl TestEditorRuntime {
    fn ok() -> Self {
        Self {
            fail_with: None,
            fail_from: 0,
            attempts: Arc::new(AtomicU32::new(0)),
            constructed: Arc::new(StdMutex::new(Vec::new())),
            instances: Arc::new(StdMutex::new(Vec::new())),
            in_flight: Arc::new(AtomicU32::new(0)),
            max_in_flight: Arc::new(AtomicU32::new(0)),
            gate: None,
        }
    }

    fn failing(err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            ..Self::ok()
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::ok()
        }
    }

    /// Gated runtime that succeeds until attempt `from`, then fails.
    fn gated_failing_from(gate: Arc<Semaphore>, from: u32, err: impl Into<String>) -> Self {
        Self {
            fail_with: Some(err.into()),
            fail_from: from,
            ..Self::gated(gate)
        }
    }

    fn constructed_configs(&self) -> Vec<EditorConfig> {
        self.constructed.lock().unwrap().clone()
    }

    fn instance_destroyed(&self, index: usize) -> bool {
        self.instances.lock().unwrap()[index].load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EditorRuntime for TestEditorRuntime {
    async fn construct(&self, config: EditorConfig) -> Result<Box<dyn EditorInstance>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        // Yield so overlapping triggers get a chance to race.
        tokio::time::sleep(Duration::from_millis(2)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = &self.fail_with {
            if attempt >= self.fail_from {
                return Err(anyhow!(err.clone()));
            }
        }

        self.constructed.lock().unwrap().push(config);
        let destroyed = Arc::new(AtomicBool::new(false));
        self.instances.lock().unwrap().push(Arc::clone(&destroyed));
        Ok(Box::new(TestEditorInstance { destroyed }))
    }
}

#[derive(Default)]
struct RecordingUrlProvider {
    counter: AtomicU64,
    issued: StdMutex<Vec<AccessUrl>>,
    revoked: StdMutex<Vec<AccessUrl>>,
}

impl RecordingUrlProvider {
    fn issued_urls(&self) -> Vec<AccessUrl> {
        self.issued.lock().unwrap().clone()
    }

    fn revoked_urls(&self) -> Vec<AccessUrl> {
        self.revoked.lock().unwrap().clone()
    }
}

impl ObjectUrlProvider for RecordingUrlProvider {
    fn issue(&self, name: &str, bytes: &[u8]) -> AccessUrl {
        let serial = self.counter.fetch_add(1, Ordering::SeqCst);
        let url = AccessUrl::new(format!("blob:{name}#{serial}/{len}", len = bytes.len()));
        self.issued.lock().unwrap().push(url.clone());
        url
    }

    fn revoke(&self, url: &AccessUrl) {
        self.revoked.lock().unwrap().push(url.clone());
    }
}

struct Harness {
    orchestrator: Arc<LifecycleOrchestrator>,
    conversion: Arc<TestConversionEngine>,
    editor: Arc<TestEditorRuntime>,
    urls: Arc<RecordingUrlProvider>,
    localization: Arc<InMemoryLocalization>,
}

fn harness() -> Harness {
    harness_with(TestConversionEngine::ok(), TestEditorRuntime::ok())
}

fn harness_with(conversion: TestConversionEngine, editor: TestEditorRuntime) -> Harness {
    let conversion = Arc::new(conversion);
    let editor = Arc::new(editor);
    let urls = Arc::new(RecordingUrlProvider::default());
    let localization = Arc::new(InMemoryLocalization::default());
    let orchestrator = LifecycleOrchestrator::new(
        Arc::clone(&conversion) as Arc<dyn ConversionEngine>,
        Arc::clone(&editor) as Arc<dyn EditorRuntime>,
        Arc::clone(&urls) as Arc<dyn ObjectUrlProvider>,
        Arc::clone(&localization) as Arc<dyn crate::Localization>,
    );
    Harness {
        orchestrator,
        conversion,
        editor,
        urls,
        localization,
    }
}

/// Spins until the editor runtime reports a construction in flight.
async fn wait_for_construction_start(editor: &TestEditorRuntime) {
    while editor.in_flight.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
