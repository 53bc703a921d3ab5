use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use thiserror::Error;

use shared::domain::{AccessUrl, DocumentKind, Language};
use shared::error::ProtocolViolation;

mod assembler;
mod orchestrator;
mod router;
mod store;

pub use assembler::{ChunkAssembler, CompletionStatus};
pub use orchestrator::LifecycleOrchestrator;
pub use router::InboundEventRouter;
pub use store::DocumentStore;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("conversion subsystem failed to initialize for {file_name:?}: {source}")]
    Conversion {
        file_name: String,
        source: anyhow::Error,
    },
    #[error("editor construction failed for {file_name:?}: {source}")]
    Render {
        file_name: String,
        source: anyhow::Error,
    },
    #[error("no document is stored; nothing to re-render")]
    NoDocument,
    #[error("{file_name:?} is not a supported document type")]
    UnsupportedFile { file_name: String },
}

/// Top-level error surfaced by the router, covering both halves of the core.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Configuration handed to the editor runtime when constructing an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    pub file_name: String,
    pub document_kind: Option<DocumentKind>,
    /// Revocable handle to the document bytes; `None` for a blank document.
    pub content_url: Option<AccessUrl>,
    pub language: Language,
    pub is_new: bool,
}

/// Document-conversion engine. Must settle before editor construction.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    async fn initialize(&self) -> Result<()>;
}

pub struct MissingConversionEngine;

#[async_trait]
impl ConversionEngine for MissingConversionEngine {
    async fn initialize(&self) -> Result<()> {
        Err(anyhow!("document conversion engine is unavailable"))
    }
}

/// A live editor widget. `destroy` is only invoked on an existing instance;
/// the orchestrator treats "no instance" as a no-op teardown.
pub trait EditorInstance: Send + Sync {
    fn destroy(&self);
}

/// Third-party editor widget constructor.
#[async_trait]
pub trait EditorRuntime: Send + Sync {
    async fn construct(&self, config: EditorConfig) -> Result<Box<dyn EditorInstance>>;
}

pub struct MissingEditorRuntime;

#[async_trait]
impl EditorRuntime for MissingEditorRuntime {
    async fn construct(&self, config: EditorConfig) -> Result<Box<dyn EditorInstance>> {
        Err(anyhow!(
            "editor runtime is unavailable; cannot construct editor for {}",
            config.file_name
        ))
    }
}

/// Issues and revokes transient access handles for binary content.
pub trait ObjectUrlProvider: Send + Sync {
    fn issue(&self, name: &str, bytes: &[u8]) -> AccessUrl;
    fn revoke(&self, url: &AccessUrl);
}

/// In-memory provider handing out unique opaque handles. Revocation only
/// logs; there is no backing resource to free.
#[derive(Default)]
pub struct EphemeralUrlProvider {
    counter: AtomicU64,
}

impl ObjectUrlProvider for EphemeralUrlProvider {
    fn issue(&self, name: &str, bytes: &[u8]) -> AccessUrl {
        let serial = self.counter.fetch_add(1, Ordering::Relaxed);
        AccessUrl::new(format!("blob:{name}#{serial}/{len}", len = bytes.len()))
    }

    fn revoke(&self, url: &AccessUrl) {
        tracing::debug!(url = url.as_str(), "urls: revoked ephemeral handle");
    }
}

/// Localization facility: pure preference state, no side effects beyond
/// persistence.
pub trait Localization: Send + Sync {
    fn language(&self) -> Language;
    fn set_language(&self, language: Language);
}

pub struct InMemoryLocalization {
    current: Mutex<Language>,
}

impl InMemoryLocalization {
    pub fn new(language: Language) -> Self {
        Self {
            current: Mutex::new(language),
        }
    }
}

impl Default for InMemoryLocalization {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

impl Localization for InMemoryLocalization {
    fn language(&self) -> Language {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_language(&self, language: Language) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = language;
    }
}

#[cfg(test)]
mod tests;
