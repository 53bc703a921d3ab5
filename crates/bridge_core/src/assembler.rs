use std::collections::{BTreeMap, HashMap, HashSet};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use tracing::info;

use shared::domain::ReconstructedArtifact;
use shared::error::ProtocolViolation;
use shared::protocol::Fragment;

/// Outcome of feeding one fragment to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    Incomplete { received: u32, total: u32 },
    Complete(ReconstructedArtifact),
}

/// Identifies the logical transfer a fragment belongs to. The wire format
/// carries no explicit transfer id, so the invariant metadata stands in for
/// one; keying by it lets interleaved transfers accumulate independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TransferKey {
    name: String,
    size: u64,
    last_modified: DateTime<Utc>,
}

impl TransferKey {
    fn of(fragment: &Fragment) -> Self {
        Self {
            name: fragment.name.clone(),
            size: fragment.size,
            last_modified: fragment.last_modified,
        }
    }
}

struct PendingTransfer {
    total_chunks: u32,
    mime_type: String,
    /// Decoded payloads placed by chunk index; arrival order is irrelevant.
    chunks: BTreeMap<u32, Vec<u8>>,
}

/// Accumulates tagged fragments and reconstructs the original artifact.
///
/// Each transfer completes exactly once, on the fragment that brings the
/// received count to the declared total. A violating fragment is rejected
/// without disturbing previously buffered state.
#[derive(Default)]
pub struct ChunkAssembler {
    pending: HashMap<TransferKey, PendingTransfer>,
    completed: HashSet<TransferKey>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive_fragment(
        &mut self,
        fragment: Fragment,
    ) -> Result<CompletionStatus, ProtocolViolation> {
        if fragment.total_chunks == 0 {
            return Err(ProtocolViolation::EmptyTransfer {
                name: fragment.name,
            });
        }
        if fragment.chunk_index >= fragment.total_chunks {
            return Err(ProtocolViolation::IndexOutOfRange {
                index: fragment.chunk_index,
                total: fragment.total_chunks,
            });
        }

        let key = TransferKey::of(&fragment);
        if self.completed.contains(&key) {
            return Err(ProtocolViolation::UnexpectedFragment {
                name: fragment.name,
            });
        }

        if let Some(pending) = self.pending.get(&key) {
            if pending.total_chunks != fragment.total_chunks
                || pending.mime_type != fragment.mime_type
            {
                return Err(ProtocolViolation::MetadataMismatch {
                    name: fragment.name,
                    declared: fragment.total_chunks,
                    buffered: pending.total_chunks,
                });
            }
            if pending.chunks.contains_key(&fragment.chunk_index) {
                return Err(ProtocolViolation::DuplicateChunk {
                    index: fragment.chunk_index,
                });
            }
        }

        let payload = STANDARD.decode(fragment.data.as_bytes()).map_err(|err| {
            ProtocolViolation::PayloadDecode {
                index: fragment.chunk_index,
                reason: err.to_string(),
            }
        })?;

        let pending = self.pending.entry(key.clone()).or_insert_with(|| PendingTransfer {
            total_chunks: fragment.total_chunks,
            mime_type: fragment.mime_type.clone(),
            chunks: BTreeMap::new(),
        });
        pending.chunks.insert(fragment.chunk_index, payload);

        let received = pending.chunks.len() as u32;
        if received < pending.total_chunks {
            return Ok(CompletionStatus::Incomplete {
                received,
                total: pending.total_chunks,
            });
        }

        let mut bytes = Vec::with_capacity(fragment.size as usize);
        for chunk in pending.chunks.values() {
            bytes.extend_from_slice(chunk);
        }
        if bytes.len() as u64 != fragment.size {
            // The closing fragment is the offender; drop it and keep the
            // rest of the buffer so a corrected resend can still complete.
            let actual = bytes.len() as u64;
            pending.chunks.remove(&fragment.chunk_index);
            return Err(ProtocolViolation::SizeMismatch {
                expected: fragment.size,
                actual,
            });
        }

        let mime_type = pending.mime_type.clone();
        let total = pending.total_chunks;
        self.pending.remove(&key);
        self.completed.insert(key);

        info!(
            name = %fragment.name,
            chunks = total,
            bytes = bytes.len(),
            "assembler: transfer complete"
        );

        Ok(CompletionStatus::Complete(ReconstructedArtifact {
            name: fragment.name,
            mime_type,
            last_modified: fragment.last_modified,
            bytes,
        }))
    }

    /// Discards all in-progress transfers and completion history.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.completed.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}
