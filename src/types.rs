use crate::error::ParseWarning;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    AkomaNtoso,
    Legacy,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::AkomaNtoso => "akoma_ntoso",
            Dialect::Legacy => "legacy",
        }
    }
}

/// A `<ref>` element seen inside a node's absorbed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefMention {
    pub href: String,
    pub text: String,
}

/// FRBR work/expression/manifestation identifiers and dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrbrMeta {
    pub urn: Option<String>,
    pub work_urn: Option<String>,
    pub expression_urn: Option<String>,
    pub manifestation_urn: Option<String>,
    pub publication_date: Option<String>,
    pub version_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub canonical_doc: String,
    pub doc_type: String,
    pub number: Option<i32>,
    pub year: Option<i32>,
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    pub version_tag: Option<String>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frbr: Option<FrbrMeta>,
}

/// One structural unit as produced by a parser, before identity is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNode {
    pub node_type: String,
    pub label: String,
    pub canonical_path: String,
    pub sort_key: String,
    pub hierarchy_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub text_raw: String,
    pub text_clean: String,
    pub text_hash: String,
    pub level: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<RefMention>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub dialect: Dialect,
    pub header: DocumentHeader,
    pub nodes: Vec<ParsedNode>,
}

/// Parser output plus every problem that was recovered from along the way.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub document: ParsedDocument,
    pub warnings: Vec<ParseWarning>,
}

impl ParseOutcome {
    /// True when the document was produced but something had to be recovered or flagged.
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub canonical_doc: String,
    pub doc_type: String,
    pub number: Option<i32>,
    pub year: Option<i32>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version_id: String,
    pub doc_id: String,
    pub version_tag: String,
    pub checksum_text: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
}

impl VersionRecord {
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub doc_id: String,
    pub version_id: String,
    pub node_type: String,
    pub label: String,
    pub canonical_path: String,
    pub sort_key: String,
    pub hierarchy_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub text_raw: String,
    pub text_clean: String,
    pub text_hash: String,
    pub is_current_law: bool,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub level: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<RefMention>,
}
