use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

use shared::domain::{
    has_supported_extension, new_document_name, DocumentContent, DocumentKind, DocumentRecord,
    Language, LifecycleState, ReconstructedArtifact,
};

use crate::{
    ConversionEngine, DocumentStore, EditorConfig, EditorInstance, EditorRuntime, LifecycleError,
    Localization, ObjectUrlProvider,
};

/// Settles the caller of a queued render with the deferred outcome. Dropped
/// when the render is displaced from the queue.
type RenderDone = oneshot::Sender<Result<(), LifecycleError>>;

/// A trigger that arrived while a conversion/construction was in flight.
/// The queue is depth one, latest wins, except that a pending close is
/// never displaced by a render.
enum QueuedTrigger {
    Render(DocumentRecord, Option<RenderDone>),
    Close,
}

struct OrchestratorState {
    state: LifecycleState,
    store: DocumentStore,
    editor_instance: Option<Box<dyn EditorInstance>>,
    render_in_flight: bool,
    queued: Option<QueuedTrigger>,
}

/// Drives a document from acquisition through conversion and editor
/// construction to a live instance, and back down on close.
///
/// At most one conversion/construction is in flight at a time; triggers
/// arriving mid-flight are queued and run after the current one settles.
pub struct LifecycleOrchestrator {
    conversion: Arc<dyn ConversionEngine>,
    editor: Arc<dyn EditorRuntime>,
    urls: Arc<dyn ObjectUrlProvider>,
    localization: Arc<dyn Localization>,
    inner: Mutex<OrchestratorState>,
}

impl LifecycleOrchestrator {
    pub fn new(
        conversion: Arc<dyn ConversionEngine>,
        editor: Arc<dyn EditorRuntime>,
        urls: Arc<dyn ObjectUrlProvider>,
        localization: Arc<dyn Localization>,
    ) -> Arc<Self> {
        Arc::new(Self {
            conversion,
            editor,
            urls,
            localization,
            inner: Mutex::new(OrchestratorState {
                state: LifecycleState::Idle,
                store: DocumentStore::new(),
                editor_instance: None,
                render_in_flight: false,
                queued: None,
            }),
        })
    }

    pub async fn open_existing_document(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<(), LifecycleError> {
        if !has_supported_extension(file_name) {
            warn!(file = %file_name, "lifecycle: rejected unsupported document type");
            return Err(LifecycleError::UnsupportedFile {
                file_name: file_name.to_string(),
            });
        }
        let access_url = self.urls.issue(file_name, &bytes);
        self.render(DocumentRecord {
            file_name: file_name.to_string(),
            content: DocumentContent::Loaded(bytes),
            access_url: Some(access_url),
        })
        .await
    }

    pub async fn create_new_document(&self, extension_hint: &str) -> Result<(), LifecycleError> {
        self.render(DocumentRecord {
            file_name: new_document_name(extension_hint),
            content: DocumentContent::Absent,
            access_url: None,
        })
        .await
    }

    /// Entry point for an artifact reassembled by the chunk assembler.
    pub async fn on_artifact_ready(
        &self,
        artifact: ReconstructedArtifact,
    ) -> Result<(), LifecycleError> {
        let access_url = self.urls.issue(&artifact.name, &artifact.bytes);
        self.render(DocumentRecord {
            file_name: artifact.name,
            content: DocumentContent::Loaded(artifact.bytes),
            access_url: Some(access_url),
        })
        .await
    }

    /// Tears down the editor and clears the document. Safe to call when no
    /// editor exists; during an in-flight render the teardown is deferred
    /// until the construction settles.
    pub async fn close_editor(&self) -> Result<(), LifecycleError> {
        {
            let mut guard = self.inner.lock().await;
            if guard.render_in_flight {
                info!("lifecycle: close requested mid-render, deferring teardown");
                self.enqueue_locked(&mut guard, QueuedTrigger::Close);
                return Ok(());
            }
        }
        self.close_now().await;
        Ok(())
    }

    /// Persists the language preference; when an editor is live it is
    /// reconstructed from the stored document so the new language applies.
    pub async fn switch_language(&self, language: Language) -> Result<(), LifecycleError> {
        self.localization.set_language(language);
        let record = {
            let mut guard = self.inner.lock().await;
            if guard.render_in_flight {
                // The in-flight construction may already have captured the
                // old language; queue a re-render from the stored record.
                if let Some(record) = guard.store.current().cloned() {
                    self.enqueue_locked(&mut guard, QueuedTrigger::Render(record, None));
                }
                return Ok(());
            }
            if guard.state != LifecycleState::Ready {
                info!(language = language.code(), "lifecycle: language updated, no editor to re-render");
                return Ok(());
            }
            guard
                .store
                .current()
                .cloned()
                .ok_or(LifecycleError::NoDocument)?
        };
        info!(language = language.code(), file = %record.file_name, "lifecycle: re-rendering for language switch");
        self.render(record).await
    }

    pub async fn state(&self) -> LifecycleState {
        self.inner.lock().await.state
    }

    /// Snapshot of the current document for the UI layer to read.
    pub async fn document(&self) -> Option<DocumentRecord> {
        self.inner.lock().await.store.current().cloned()
    }

    pub fn language(&self) -> Language {
        self.localization.language()
    }

    async fn render(&self, record: DocumentRecord) -> Result<(), LifecycleError> {
        let deferred = {
            let mut guard = self.inner.lock().await;
            if guard.render_in_flight {
                info!(file = %record.file_name, "lifecycle: render queued behind in-flight construction");
                let (done, outcome) = oneshot::channel();
                self.enqueue_locked(&mut guard, QueuedTrigger::Render(record.clone(), Some(done)));
                Some(outcome)
            } else {
                guard.render_in_flight = true;
                None
            }
        };
        if let Some(outcome) = deferred {
            // A dropped sender means a later trigger displaced this render;
            // the displaced call settles as a no-op.
            return outcome.await.unwrap_or(Ok(()));
        }

        let result = self.render_once(record).await;
        self.drain_queue().await;
        result
    }

    /// One full pass: commit the record, initialize conversion, rebuild the
    /// editor. Never holds the state lock across an await.
    async fn render_once(&self, record: DocumentRecord) -> Result<(), LifecycleError> {
        let file_name = record.file_name.clone();
        let document_kind = DocumentKind::from_file_name(&record.file_name);
        let content_url = record.access_url.clone();
        let is_new = record.content.is_absent();

        let superseded = {
            let mut guard = self.inner.lock().await;
            guard.state = LifecycleState::AwaitingArtifact;
            guard.store.replace(record)
        };
        if let Some(previous) = superseded {
            if let Some(url) = previous.access_url {
                // A language re-render commits the same record; its handle
                // stays live.
                if Some(&url) != content_url.as_ref() {
                    self.urls.revoke(&url);
                }
            }
        }

        {
            let mut guard = self.inner.lock().await;
            guard.state = LifecycleState::ConvertingAndRendering;
        }

        info!(file = %file_name, new = is_new, "lifecycle: initializing conversion subsystem");
        if let Err(source) = self.conversion.initialize().await {
            self.abort_render(&file_name).await;
            return Err(LifecycleError::Conversion { file_name, source });
        }

        // An already-mounted editor is torn down before its replacement.
        let previous_editor = { self.inner.lock().await.editor_instance.take() };
        if let Some(previous) = previous_editor {
            previous.destroy();
        }

        let config = EditorConfig {
            file_name: file_name.clone(),
            document_kind,
            content_url,
            language: self.localization.language(),
            is_new,
        };

        match self.editor.construct(config).await {
            Ok(instance) => {
                let mut guard = self.inner.lock().await;
                guard.editor_instance = Some(instance);
                guard.state = LifecycleState::Ready;
                info!(file = %file_name, "lifecycle: editor ready");
                Ok(())
            }
            Err(source) => {
                self.abort_render(&file_name).await;
                Err(LifecycleError::Render { file_name, source })
            }
        }
    }

    /// Runs triggers that accumulated during the in-flight render, then
    /// lowers the in-flight flag.
    async fn drain_queue(&self) {
        loop {
            let next = {
                let mut guard = self.inner.lock().await;
                match guard.queued.take() {
                    Some(trigger) => Some(trigger),
                    None => {
                        guard.render_in_flight = false;
                        None
                    }
                }
            };
            match next {
                None => break,
                Some(QueuedTrigger::Render(record, done)) => {
                    let result = self.render_once(record).await;
                    if let Err(err) = &result {
                        warn!(error = %err, "lifecycle: queued render failed");
                    }
                    if let Some(done) = done {
                        // The waiting caller may have been cancelled.
                        let _ = done.send(result);
                    }
                }
                Some(QueuedTrigger::Close) => self.close_now().await,
            }
        }
    }

    fn enqueue_locked(&self, guard: &mut OrchestratorState, trigger: QueuedTrigger) {
        if matches!(guard.queued, Some(QueuedTrigger::Close)) {
            // A pending teardown outranks any render.
            if let QueuedTrigger::Render(record, _) = trigger {
                self.discard_record_locked(guard, record);
            }
            return;
        }
        if let Some(QueuedTrigger::Render(displaced, _)) = guard.queued.take() {
            self.discard_record_locked(guard, displaced);
        }
        guard.queued = Some(trigger);
    }

    /// Revokes the handle of a record that will never be committed, unless
    /// the committed record shares it.
    fn discard_record_locked(&self, guard: &OrchestratorState, record: DocumentRecord) {
        if let Some(url) = record.access_url {
            let still_committed = guard
                .store
                .current()
                .and_then(|current| current.access_url.as_ref())
                == Some(&url);
            if !still_committed {
                self.urls.revoke(&url);
            }
        }
    }

    async fn close_now(&self) {
        let (instance, record) = {
            let mut guard = self.inner.lock().await;
            guard.state = LifecycleState::Closed;
            (guard.editor_instance.take(), guard.store.clear())
        };
        if let Some(instance) = instance {
            instance.destroy();
            info!("lifecycle: editor destroyed");
        }
        if let Some(record) = record {
            if let Some(url) = record.access_url {
                self.urls.revoke(&url);
            }
        }
    }

    async fn abort_render(&self, file_name: &str) {
        let revoked = {
            let mut guard = self.inner.lock().await;
            guard.state = LifecycleState::Idle;
            guard.store.invalidate_content()
        };
        if let Some(url) = revoked {
            self.urls.revoke(&url);
        }
        warn!(file = %file_name, "lifecycle: render aborted, back to idle");
    }
}
