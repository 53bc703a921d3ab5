use shared::domain::{AccessUrl, DocumentContent, DocumentRecord};

/// Holder of the current document. The orchestrator is the only writer;
/// every replacement hands back the superseded record so its access handle
/// can be revoked within the same lifecycle step.
#[derive(Default)]
pub struct DocumentStore {
    current: Option<DocumentRecord>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current record wholesale, returning what it displaced.
    pub fn replace(&mut self, record: DocumentRecord) -> Option<DocumentRecord> {
        self.current.replace(record)
    }

    pub fn current(&self) -> Option<&DocumentRecord> {
        self.current.as_ref()
    }

    /// Removes the record entirely, e.g. on editor close.
    pub fn clear(&mut self) -> Option<DocumentRecord> {
        self.current.take()
    }

    /// Marks the current record's content invalid after a failed conversion
    /// or render attempt and takes its access handle for revocation.
    pub fn invalidate_content(&mut self) -> Option<AccessUrl> {
        let record = self.current.as_mut()?;
        record.content = DocumentContent::Invalid;
        record.access_url.take()
    }
}
