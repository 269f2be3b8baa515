use crate::config::SeverityPolicy;
use crate::types::NodeRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// The fields conflict detection needs from a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeValidity {
    pub node_id: String,
    pub doc_id: String,
    pub version_id: String,
    pub canonical_path: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub is_current_law: bool,
}

impl NodeValidity {
    fn start(&self) -> NaiveDate {
        self.valid_from.unwrap_or(NaiveDate::MIN)
    }

    fn end(&self) -> NaiveDate {
        self.valid_to.unwrap_or(NaiveDate::MAX)
    }
}

impl From<&NodeRecord> for NodeValidity {
    fn from(node: &NodeRecord) -> Self {
        Self {
            node_id: node.node_id.clone(),
            doc_id: node.doc_id.clone(),
            version_id: node.version_id.clone(),
            canonical_path: node.canonical_path.clone(),
            valid_from: node.valid_from,
            valid_to: node.valid_to,
            is_current_law: node.is_current_law,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCandidate {
    pub doc_id: String,
    pub canonical_path: String,
    pub node_id_a: String,
    pub node_id_b: String,
    pub version_id_a: String,
    pub version_id_b: String,
    pub valid_from_a: Option<NaiveDate>,
    pub valid_to_a: Option<NaiveDate>,
    pub valid_from_b: Option<NaiveDate>,
    pub valid_to_b: Option<NaiveDate>,
    pub severity: Severity,
}

impl ConflictCandidate {
    /// Same pair with `node_id_a <= node_id_b`.
    pub fn canonicalized(self) -> Self {
        if self.node_id_a <= self.node_id_b {
            return self;
        }
        Self {
            node_id_a: self.node_id_b,
            node_id_b: self.node_id_a,
            version_id_a: self.version_id_b,
            version_id_b: self.version_id_a,
            valid_from_a: self.valid_from_b,
            valid_to_a: self.valid_to_b,
            valid_from_b: self.valid_from_a,
            valid_to_b: self.valid_to_a,
            ..self
        }
    }

    pub fn pair_key(&self) -> (String, String) {
        if self.node_id_a <= self.node_id_b {
            (self.node_id_a.clone(), self.node_id_b.clone())
        } else {
            (self.node_id_b.clone(), self.node_id_a.clone())
        }
    }
}

pub fn ranges_overlap(a: &NodeValidity, b: &NodeValidity) -> bool {
    a.start() <= b.end() && b.start() <= a.end()
}

fn severity_for(a: &NodeValidity, b: &NodeValidity, policy: &SeverityPolicy) -> Severity {
    if policy.current_law_flag && a.is_current_law && b.is_current_law {
        return Severity::Critical;
    }
    if policy.null_valid_to && a.valid_to.is_none() && b.valid_to.is_none() {
        return Severity::Critical;
    }
    Severity::Warning
}

fn candidate(a: &NodeValidity, b: &NodeValidity, severity: Severity) -> ConflictCandidate {
    ConflictCandidate {
        doc_id: b.doc_id.clone(),
        canonical_path: b.canonical_path.clone(),
        node_id_a: a.node_id.clone(),
        node_id_b: b.node_id.clone(),
        version_id_a: a.version_id.clone(),
        version_id_b: b.version_id.clone(),
        valid_from_a: a.valid_from,
        valid_to_a: a.valid_to,
        valid_from_b: b.valid_from,
        valid_to_b: b.valid_to,
        severity,
    }
    .canonicalized()
}

/// Order nodes the way [`detect_temporal_conflicts`] expects them.
pub fn sort_for_detection(nodes: &mut [NodeValidity]) {
    nodes.sort_by(|a, b| {
        (&a.doc_id, &a.canonical_path, a.start(), a.end(), &a.node_id).cmp(&(
            &b.doc_id,
            &b.canonical_path,
            b.start(),
            b.end(),
            &b.node_id,
        ))
    });
}

/// Sweep over nodes grouped by `(doc_id, canonical_path)` and ordered by
/// validity start, reporting every overlapping pair within a group.
pub fn detect_temporal_conflicts<'a, I>(nodes: I, policy: &SeverityPolicy) -> Vec<ConflictCandidate>
where
    I: IntoIterator<Item = &'a NodeValidity>,
{
    let mut conflicts = Vec::new();
    let mut group: Option<(&str, &str)> = None;
    let mut active: Vec<&NodeValidity> = Vec::new();

    for node in nodes {
        if node.is_current_law != node.valid_to.is_none() {
            tracing::warn!(
                "[Conflicts] Node {} at {} has is_current_law={} but valid_to={:?}",
                node.node_id,
                node.canonical_path,
                node.is_current_law,
                node.valid_to
            );
        }

        let key = (node.doc_id.as_str(), node.canonical_path.as_str());
        if group != Some(key) {
            group = Some(key);
            active.clear();
        }

        let start = node.start();
        active.retain(|other| other.end() >= start);
        for other in &active {
            if ranges_overlap(other, node) {
                conflicts.push(candidate(other, node, severity_for(other, node, policy)));
            }
        }
        active.push(node);
    }

    if !conflicts.is_empty() {
        let critical = conflicts
            .iter()
            .filter(|c| c.severity == Severity::Critical)
            .count();
        tracing::info!(
            "[Conflicts] {} overlapping pairs ({} critical)",
            conflicts.len(),
            critical
        );
    }
    conflicts
}

/// Sort a copy of `nodes` and run detection on it.
pub fn detect_conflicts(nodes: &[NodeValidity], policy: &SeverityPolicy) -> Vec<ConflictCandidate> {
    let mut sorted = nodes.to_vec();
    sort_for_detection(&mut sorted);
    detect_temporal_conflicts(&sorted, policy)
}

// ──────────────────────────────────────────────────────────────
// Recording
// ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStatus {
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEvent {
    #[serde(flatten)]
    pub candidate: ConflictCandidate,
    pub status: ConflictStatus,
}

pub trait ConflictStore {
    fn contains_pair(&self, node_id_a: &str, node_id_b: &str) -> bool;

    fn insert(&mut self, event: ConflictEvent);
}

/// Events keyed by their ordered node pair.
#[derive(Debug, Default)]
pub struct InMemoryConflictStore {
    events: BTreeMap<(String, String), ConflictEvent>,
}

impl InMemoryConflictStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &ConflictEvent> {
        self.events.values()
    }
}

impl ConflictStore for InMemoryConflictStore {
    fn contains_pair(&self, node_id_a: &str, node_id_b: &str) -> bool {
        self.events
            .contains_key(&(node_id_a.to_string(), node_id_b.to_string()))
    }

    fn insert(&mut self, event: ConflictEvent) {
        let key = event.candidate.pair_key();
        self.events.insert(key, event);
    }
}

/// Store a pending event for each pair not already recorded. Returns how many
/// were added.
pub fn record_conflicts(store: &mut dyn ConflictStore, candidates: Vec<ConflictCandidate>) -> usize {
    let mut seen = HashSet::new();
    let mut created = 0;
    for candidate in candidates {
        let candidate = candidate.canonicalized();
        let key = candidate.pair_key();
        if !seen.insert(key.clone()) || store.contains_pair(&key.0, &key.1) {
            continue;
        }
        store.insert(ConflictEvent {
            candidate,
            status: ConflictStatus::Pending,
        });
        created += 1;
    }
    tracing::info!("[Conflicts] Recorded {} new conflict events", created);
    created
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> Option<NaiveDate> {
        Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    fn node(id: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> NodeValidity {
        NodeValidity {
            node_id: id.to_string(),
            doc_id: "doc".to_string(),
            version_id: format!("v-{id}"),
            canonical_path: "art:1".to_string(),
            valid_from: from,
            valid_to: to,
            is_current_law: to.is_none(),
        }
    }

    #[test]
    fn touching_closed_intervals_overlap() {
        let a = node("a", date("2000-01-01"), date("2010-01-01"));
        let b = node("b", date("2010-01-01"), None);
        assert!(ranges_overlap(&a, &b));
        let c = node("c", date("2010-01-02"), None);
        assert!(!ranges_overlap(&a, &c));
    }

    #[test]
    fn evicted_entries_do_not_pair() {
        let nodes = vec![
            node("a", date("2000-01-01"), date("2001-01-01")),
            node("b", date("2002-01-01"), date("2003-01-01")),
            node("c", date("2002-06-01"), None),
        ];
        let conflicts = detect_temporal_conflicts(&nodes, &SeverityPolicy::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].pair_key(), ("b".to_string(), "c".to_string()));
        assert_eq!(conflicts[0].severity, Severity::Warning);
    }

    #[test]
    fn groups_reset_between_paths() {
        let mut other = node("z", None, None);
        other.canonical_path = "art:2".to_string();
        let nodes = vec![node("a", None, None), other];
        assert!(detect_temporal_conflicts(&nodes, &SeverityPolicy::default()).is_empty());
    }

    #[test]
    fn severity_checks_can_be_switched_off() {
        let mut a = node("a", None, None);
        let mut b = node("b", None, None);
        a.is_current_law = false;
        b.is_current_law = false;
        let both = SeverityPolicy::default();
        assert_eq!(severity_for(&a, &b, &both), Severity::Critical);
        let flag_only = SeverityPolicy {
            current_law_flag: true,
            null_valid_to: false,
        };
        assert_eq!(severity_for(&a, &b, &flag_only), Severity::Warning);
    }
}
