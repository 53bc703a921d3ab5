use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use shared::protocol::InboundEvent;

use crate::{BridgeError, ChunkAssembler, CompletionStatus, LifecycleOrchestrator};

/// Dispatches named inbound events from the cross-boundary transport to the
/// assembler and orchestrator. Unknown event names are ignored so newer
/// hosts can speak to older embeds.
pub struct InboundEventRouter {
    assembler: Mutex<ChunkAssembler>,
    orchestrator: Arc<LifecycleOrchestrator>,
}

impl InboundEventRouter {
    pub fn new(orchestrator: Arc<LifecycleOrchestrator>) -> Self {
        Self {
            assembler: Mutex::new(ChunkAssembler::new()),
            orchestrator,
        }
    }

    /// Decodes and dispatches a raw envelope as the transport delivers it.
    pub async fn dispatch(&self, envelope: &serde_json::Value) -> Result<(), BridgeError> {
        let Some(event) = InboundEvent::from_envelope(envelope)? else {
            debug!("router: ignoring unknown inbound event");
            return Ok(());
        };
        self.handle(event).await
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<(), BridgeError> {
        match event {
            InboundEvent::RenderOffice(fragment) => {
                let status = self.assembler.lock().await.receive_fragment(fragment)?;
                match status {
                    CompletionStatus::Incomplete { received, total } => {
                        debug!(received, total, "router: fragment buffered");
                        Ok(())
                    }
                    CompletionStatus::Complete(artifact) => {
                        self.orchestrator.on_artifact_ready(artifact).await?;
                        Ok(())
                    }
                }
            }
            InboundEvent::CloseEditor => {
                self.orchestrator.close_editor().await?;
                self.assembler.lock().await.reset();
                Ok(())
            }
            InboundEvent::LanguageChanged => {
                // The preference was already persisted by the host side;
                // re-render the live editor with whatever is current.
                let language = self.orchestrator.language();
                self.orchestrator.switch_language(language).await?;
                Ok(())
            }
        }
    }
}
