use super::{ReferenceCandidate, RelationType, ResolutionMethod, UrnResolver};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Finds the stored node for a `(canonical_doc, canonical_path)` pair.
pub trait NodeLookup {
    fn find_node(&self, canonical_doc: &str, canonical_path: &str) -> Option<String>;
}

impl NodeLookup for HashMap<(String, String), String> {
    fn find_node(&self, canonical_doc: &str, canonical_path: &str) -> Option<String> {
        self.get(&(canonical_doc.to_string(), canonical_path.to_string()))
            .cloned()
    }
}

/// Natural key of a resolved reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResolvedKey {
    pub source_node_id: String,
    pub target: String,
    pub relation_type: RelationType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceResolved {
    pub source_node_id: String,
    /// Canonical node, else canonical document, else resolved URN.
    pub target: String,
    pub relation_type: RelationType,
    pub target_canonical_doc: Option<String>,
    pub target_node_id: Option<String>,
    pub resolved_urn: Option<String>,
    pub confidence: f64,
    pub method: ResolutionMethod,
}

impl ReferenceResolved {
    pub fn key(&self) -> ResolvedKey {
        ResolvedKey {
            source_node_id: self.source_node_id.clone(),
            target: self.target.clone(),
            relation_type: self.relation_type,
        }
    }
}

fn split_canonical_node(target: &str) -> Option<(&str, &str)> {
    target.split_once('#').filter(|(doc, path)| !doc.is_empty() && !path.is_empty())
}

/// Project the candidates of one source node into resolved references.
///
/// Candidates with neither a canonical target nor a resolvable URN are
/// dropped.
pub fn resolve_references(
    source_node_id: &str,
    candidates: &[ReferenceCandidate],
    resolver: &mut UrnResolver,
    lookup: &dyn NodeLookup,
) -> Vec<ReferenceResolved> {
    let mut resolved = Vec::new();
    for candidate in candidates {
        let resolution = resolver.resolve(&candidate.match_text, &candidate.raw_snippet);
        let canonical_target = candidate
            .target_canonical_node
            .clone()
            .or_else(|| candidate.target_canonical_doc.clone());

        let (target, confidence) = match (canonical_target, resolution.urn.clone()) {
            (Some(target), _) => (target, candidate.confidence.max(resolution.confidence)),
            (None, Some(urn)) => (urn, resolution.confidence),
            (None, None) => {
                tracing::debug!(
                    "[Resolver] No target for {:?} in node {}",
                    candidate.match_text,
                    source_node_id
                );
                continue;
            }
        };

        let target_node_id = candidate
            .target_canonical_node
            .as_deref()
            .and_then(split_canonical_node)
            .and_then(|(doc, path)| lookup.find_node(doc, path));

        resolved.push(ReferenceResolved {
            source_node_id: source_node_id.to_string(),
            target,
            relation_type: candidate.relation_type,
            target_canonical_doc: candidate.target_canonical_doc.clone(),
            target_node_id,
            resolved_urn: resolution.urn,
            confidence,
            method: resolution.method,
        });
    }
    resolved
}

/// Resolved references upserted by natural key.
#[derive(Debug, Default)]
pub struct ResolvedReferenceSet {
    entries: BTreeMap<ResolvedKey, ReferenceResolved>,
}

impl ResolvedReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replacement keeps the better of the two
    /// confidences and any node id already found.
    pub fn upsert(&mut self, reference: ReferenceResolved) {
        let key = reference.key();
        match self.entries.get_mut(&key) {
            Some(existing) => {
                let node_id = reference
                    .target_node_id
                    .clone()
                    .or_else(|| existing.target_node_id.take());
                let confidence = existing.confidence.max(reference.confidence);
                *existing = ReferenceResolved {
                    target_node_id: node_id,
                    confidence,
                    ..reference
                };
            }
            None => {
                self.entries.insert(key, reference);
            }
        }
    }

    pub fn extend(&mut self, references: impl IntoIterator<Item = ReferenceResolved>) {
        for reference in references {
            self.upsert(reference);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceResolved> {
        self.entries.values()
    }
}
