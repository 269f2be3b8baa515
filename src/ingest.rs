use crate::canonical::{doc_id, node_id, version_id, HierarchyFormatter};
use crate::error::IngestError;
use crate::text::sha256_hex;
use crate::types::{DocumentRecord, NodeRecord, ParsedDocument, ParsedNode, VersionRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ──────────────────────────────────────────────────────────────
// Version lookup
// ──────────────────────────────────────────────────────────────

/// What the persistence layer already holds for one `(doc_id, version_tag)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVersion {
    pub version_id: String,
    pub checksum_text: String,
}

pub trait VersionStore {
    fn find_version(&self, doc_id: &str, version_tag: &str) -> Option<StoredVersion>;
}

impl VersionStore for HashMap<(String, String), StoredVersion> {
    fn find_version(&self, doc_id: &str, version_tag: &str) -> Option<StoredVersion> {
        self.get(&(doc_id.to_string(), version_tag.to_string()))
            .cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    New,
    /// Same version tag and checksum as what is stored; nothing to write.
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub total_nodes: usize,
    pub empty_text_nodes: usize,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct IngestPlan {
    pub status: IngestStatus,
    pub document: DocumentRecord,
    pub version: VersionRecord,
    pub nodes: Vec<NodeRecord>,
    pub quality: QualityReport,
}

// ──────────────────────────────────────────────────────────────
// Assembly
// ──────────────────────────────────────────────────────────────

pub fn checksum_text(nodes: &[ParsedNode]) -> String {
    let joined = nodes
        .iter()
        .map(|n| n.text_raw.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    sha256_hex(&joined)
}

/// The source's own tag, else `v:{source_name}`, else `import:{checksum prefix}`.
pub fn resolve_version_tag(parsed: &ParsedDocument, checksum: &str) -> String {
    let header = &parsed.header;
    if let Some(tag) = header.version_tag.as_deref().filter(|t| !t.trim().is_empty()) {
        return tag.to_string();
    }
    match header.source_name.as_deref().filter(|s| !s.is_empty()) {
        Some(source) => format!("v:{source}"),
        None => format!("import:{}", &checksum[..12.min(checksum.len())]),
    }
}

pub fn quality_report(nodes: &[ParsedNode]) -> QualityReport {
    let mut report = QualityReport {
        total_nodes: nodes.len(),
        ..QualityReport::default()
    };
    for node in nodes {
        *report.by_type.entry(node.node_type.clone()).or_insert(0) += 1;
        if node.text_clean.is_empty() {
            report.empty_text_nodes += 1;
        }
    }
    report
}

pub fn node_records(parsed: &ParsedDocument, version: &VersionRecord) -> Vec<NodeRecord> {
    parsed
        .nodes
        .iter()
        .map(|node| NodeRecord {
            node_id: node_id(&version.doc_id, &version.version_id, &node.canonical_path),
            doc_id: version.doc_id.clone(),
            version_id: version.version_id.clone(),
            node_type: node.node_type.clone(),
            label: node.label.clone(),
            canonical_path: node.canonical_path.clone(),
            sort_key: node.sort_key.clone(),
            hierarchy_string: node.hierarchy_string.clone(),
            heading: node.heading.clone(),
            text_raw: node.text_raw.clone(),
            text_clean: node.text_clean.clone(),
            text_hash: node.text_hash.clone(),
            is_current_law: version.is_current(),
            valid_from: version.valid_from,
            valid_to: version.valid_to,
            level: node.level,
            mentions: node.mentions.clone(),
        })
        .collect()
}

/// Turn parser output into the records to persist.
///
/// A stored version with the same tag but a different checksum is never
/// overwritten; it comes back as [`IngestError::VersionChecksumConflict`].
pub fn plan_ingest(
    parsed: &ParsedDocument,
    store: &dyn VersionStore,
) -> Result<IngestPlan, IngestError> {
    let header = &parsed.header;
    let doc_id = doc_id(&header.canonical_doc);
    let checksum = checksum_text(&parsed.nodes);
    let version_tag = resolve_version_tag(parsed, &checksum);

    let (version_id, status) = match store.find_version(&doc_id, &version_tag) {
        Some(stored) if stored.checksum_text == checksum => {
            (stored.version_id, IngestStatus::Unchanged)
        }
        Some(stored) => {
            return Err(IngestError::VersionChecksumConflict {
                doc_id,
                version_tag,
                stored: stored.checksum_text,
                incoming: checksum,
            })
        }
        None => (version_id(&doc_id, &version_tag), IngestStatus::New),
    };

    let document = DocumentRecord {
        doc_id: doc_id.clone(),
        canonical_doc: header.canonical_doc.clone(),
        doc_type: header.doc_type.clone(),
        number: header.number,
        year: header.year,
        title: header.title.clone().or_else(|| header.source_name.clone()),
    };
    let version = VersionRecord {
        version_id,
        doc_id,
        version_tag,
        checksum_text: checksum,
        valid_from: header.valid_from,
        valid_to: header.valid_to,
    };
    let nodes = node_records(parsed, &version);
    let quality = quality_report(&parsed.nodes);

    tracing::info!(
        "[Ingest] {} version {}: {:?}, {} nodes ({} empty)",
        document.canonical_doc,
        version.version_tag,
        status,
        quality.total_nodes,
        quality.empty_text_nodes
    );

    Ok(IngestPlan {
        status,
        document,
        version,
        nodes,
        quality,
    })
}

/// Fill in missing breadcrumbs. Existing ones are left untouched.
pub fn backfill_hierarchy(
    nodes: &mut [NodeRecord],
    canonical_doc: &str,
    formatter: &HierarchyFormatter,
) -> usize {
    let mut filled = 0;
    for node in nodes.iter_mut() {
        let missing = node
            .hierarchy_string
            .as_deref()
            .map_or(true, |h| h.trim().is_empty());
        if !missing {
            continue;
        }
        if let Some(hierarchy) = formatter.hierarchy_string(canonical_doc, &node.canonical_path) {
            node.hierarchy_string = Some(hierarchy);
            filled += 1;
        }
    }
    if filled > 0 {
        tracing::info!("[Ingest] Backfilled {} hierarchy strings for {}", filled, canonical_doc);
    }
    filled
}
