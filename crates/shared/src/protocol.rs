use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolViolation;

/// One unit of a chunked transfer, exactly as the host frames it on the
/// wire. All fragments of one transfer share identical `name`, `size`,
/// `mime_type`, `total_chunks` and `last_modified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub chunk_index: u32,
    /// Base64-encoded payload slice.
    pub data: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
    pub name: String,
    pub size: u64,
    pub total_chunks: u32,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Named inbound events delivered over the cross-boundary transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum InboundEvent {
    #[serde(rename = "RENDER_OFFICE")]
    RenderOffice(Fragment),
    #[serde(rename = "CLOSE_EDITOR")]
    CloseEditor,
    #[serde(rename = "LANGUAGE_CHANGED")]
    LanguageChanged,
}

impl InboundEvent {
    /// Decodes a raw envelope. Unknown event names yield `Ok(None)` so the
    /// router stays forward-compatible; a known event with a payload that
    /// does not decode is a protocol violation.
    pub fn from_envelope(value: &serde_json::Value) -> Result<Option<Self>, ProtocolViolation> {
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProtocolViolation::MalformedEnvelope {
                reason: "missing event type".to_string(),
            })?;

        match kind {
            "RENDER_OFFICE" | "CLOSE_EDITOR" | "LANGUAGE_CHANGED" => {
                serde_json::from_value(value.clone()).map(Some).map_err(|err| {
                    ProtocolViolation::MalformedEnvelope {
                        reason: err.to_string(),
                    }
                })
            }
            _ => Ok(None),
        }
    }
}
