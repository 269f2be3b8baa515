use serde::Serialize;

/// Failures that make a single document unusable. Nothing was recovered.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("document is not well-formed: {message}")]
    NotWellFormed { message: String },

    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems the parser recovered from. The document is still returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    #[error("malformed input at byte {position}: {message}")]
    MalformedInput { position: u64, message: String },

    #[error("document produced no nodes")]
    EmptyDocument,

    #[error("ambiguous {unit} id {raw:?}, labelled as {assigned:?}")]
    AmbiguousArticleId {
        unit: String,
        raw: Option<String>,
        assigned: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(
        "version {version_tag} of {doc_id} was already stored with checksum {stored}, \
         new ingestion has {incoming}"
    )]
    VersionChecksumConflict {
        doc_id: String,
        version_tag: String,
        stored: String,
        incoming: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tag {tag:?} is listed as both {first} and {second}")]
    OverlappingTag {
        tag: String,
        first: &'static str,
        second: &'static str,
    },
}
