use thiserror::Error;

/// Malformed or inconsistent fragment stream.
///
/// A violation rejects the offending fragment (or envelope) only; previously
/// buffered transfer state stays intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("fragment metadata disagrees with buffered transfer {name:?}: declared totalChunks {declared}, buffered {buffered}")]
    MetadataMismatch {
        name: String,
        declared: u32,
        buffered: u32,
    },
    #[error("fragment for {name:?} declares zero total chunks")]
    EmptyTransfer { name: String },
    #[error("chunk index {index} out of range for transfer of {total} chunks")]
    IndexOutOfRange { index: u32, total: u32 },
    #[error("duplicate fragment for chunk index {index}")]
    DuplicateChunk { index: u32 },
    #[error("fragment for already-completed transfer {name:?} with no intervening reset")]
    UnexpectedFragment { name: String },
    #[error("fragment payload at index {index} is not valid base64: {reason}")]
    PayloadDecode { index: u32, reason: String },
    #[error("reassembled artifact is {actual} bytes but transfer declared {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("malformed inbound envelope: {reason}")]
    MalformedEnvelope { reason: String },
}
