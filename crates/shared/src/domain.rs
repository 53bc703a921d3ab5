use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File extensions the host page is allowed to hand over.
pub const SUPPORTED_EXTENSIONS: [&str; 7] = [
    ".docx", ".xlsx", ".pptx", ".doc", ".xls", ".ppt", ".csv",
];

/// Base name used when the host requests a blank document.
pub const NEW_DOCUMENT_BASE_NAME: &str = "New_Document";

/// Whether the file name carries one of the extensions the host page is
/// allowed to hand over. Case-insensitive, like the file-picker filter it
/// mirrors.
pub fn has_supported_extension(file_name: &str) -> bool {
    let lowered = file_name.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

/// Synthesizes the file name for a create-new request, e.g. `".xlsx"` ->
/// `"New_Document.xlsx"`. A missing leading dot is tolerated.
pub fn new_document_name(extension: &str) -> String {
    if extension.starts_with('.') {
        format!("{NEW_DOCUMENT_BASE_NAME}{extension}")
    } else {
        format!("{NEW_DOCUMENT_BASE_NAME}.{extension}")
    }
}

/// Broad editor family a file name maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Word,
    Cell,
    Slide,
}

impl DocumentKind {
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext)?;
        match extension.to_ascii_lowercase().as_str() {
            "doc" | "docx" => Some(Self::Word),
            "xls" | "xlsx" | "csv" => Some(Self::Cell),
            "ppt" | "pptx" => Some(Self::Slide),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::En => Self::Zh,
            Self::Zh => Self::En,
        }
    }
}

/// Revocable handle granting transient access to binary content.
///
/// Issued by the `ObjectUrlProvider` collaborator; the holder is responsible
/// for revoking it when the record it belongs to is superseded or closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessUrl(String);

impl AccessUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Binary payload of the current document.
///
/// `Absent` is a meaningful state: the host asked for a blank document and
/// the conversion engine is expected to supply a template. `Invalid` marks a
/// record whose conversion or render attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    Absent,
    Loaded(Vec<u8>),
    Invalid,
}

impl DocumentContent {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Loaded(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// The authoritative description of the document currently of interest to
/// the editor. Exclusively owned by `DocumentStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub file_name: String,
    pub content: DocumentContent,
    pub access_url: Option<AccessUrl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    AwaitingArtifact,
    ConvertingAndRendering,
    Ready,
    Closed,
}

/// The binary file produced by reassembling a chunked transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedArtifact {
    pub name: String,
    pub mime_type: String,
    pub last_modified: DateTime<Utc>,
    pub bytes: Vec<u8>,
}
