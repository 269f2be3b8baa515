use chrono::NaiveDate;
use normattiva_kb::config::SeverityPolicy;
use normattiva_kb::conflicts::{
    detect_conflicts, detect_temporal_conflicts, record_conflicts, sort_for_detection,
    ConflictStatus, InMemoryConflictStore, NodeValidity, Severity,
};

fn date(s: &str) -> Option<NaiveDate> {
    Some(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
}

fn version(node_id: &str, path: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> NodeValidity {
    NodeValidity {
        node_id: node_id.to_string(),
        doc_id: "doc-legge-212".to_string(),
        version_id: format!("version-{node_id}"),
        canonical_path: path.to_string(),
        valid_from: from,
        valid_to: to,
        is_current_law: to.is_none(),
    }
}

#[test]
fn overlapping_current_versions_conflict_once() {
    let mut v1 = version("n1", "art:5", date("2001-01-01"), date("2010-12-31"));
    let v2 = version("n2", "art:5", date("2009-06-01"), None);
    v1.is_current_law = true;
    let conflicts = detect_conflicts(&[v1, v2], &SeverityPolicy::default());
    assert_eq!(conflicts.len(), 1);
    let conflict = &conflicts[0];
    assert_eq!(conflict.node_id_a, "n1");
    assert_eq!(conflict.node_id_b, "n2");
    assert_eq!(conflict.canonical_path, "art:5");
    assert_eq!(conflict.doc_id, "doc-legge-212");
    assert_eq!(conflict.severity, Severity::Critical);
}

#[test]
fn closed_version_overlapping_open_one_is_a_warning() {
    let v1 = version("n1", "art:5", date("2001-01-01"), date("2010-12-31"));
    let v2 = version("n2", "art:5", date("2009-06-01"), None);
    let conflicts = detect_conflicts(&[v1, v2], &SeverityPolicy::default());
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, Severity::Warning);
}

#[test]
fn two_open_ended_current_versions_are_critical() {
    let v1 = version("n1", "art:5", date("2001-01-01"), None);
    let v2 = version("n2", "art:5", date("2009-06-01"), None);
    let conflicts = detect_conflicts(&[v1, v2], &SeverityPolicy::default());
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, Severity::Critical);
}

#[test]
fn adjacent_versions_do_not_conflict() {
    let v1 = version("n1", "art:5", date("2001-01-01"), date("2005-01-01"));
    let v2 = version("n2", "art:5", date("2006-01-01"), None);
    assert!(detect_conflicts(&[v1, v2], &SeverityPolicy::default()).is_empty());
}

#[test]
fn missing_start_is_the_earliest_date() {
    let v1 = version("n1", "art:5", None, date("2005-01-01"));
    let v2 = version("n2", "art:5", date("1990-01-01"), date("1990-12-31"));
    let conflicts = detect_conflicts(&[v2, v1], &SeverityPolicy::default());
    assert_eq!(conflicts.len(), 1);
}

#[test]
fn input_order_does_not_matter() {
    let a = version("zz", "art:5", date("2001-01-01"), date("2010-12-31"));
    let b = version("aa", "art:5", date("2009-06-01"), None);
    let forward = detect_conflicts(&[a.clone(), b.clone()], &SeverityPolicy::default());
    let backward = detect_conflicts(&[b, a], &SeverityPolicy::default());
    assert_eq!(forward, backward);
    assert_eq!(forward[0].node_id_a, "aa");
    assert_eq!(forward[0].version_id_a, "version-aa");
    assert_eq!(forward[0].valid_from_a, date("2009-06-01"));
}

#[test]
fn paths_are_grouped_separately() {
    let mut nodes = vec![
        version("n1", "art:5", date("2001-01-01"), None),
        version("n2", "art:6", date("2001-01-01"), None),
        version("n3", "art:5", date("2002-01-01"), None),
    ];
    sort_for_detection(&mut nodes);
    let conflicts = detect_temporal_conflicts(&nodes, &SeverityPolicy::default());
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].canonical_path, "art:5");
}

#[test]
fn three_way_overlap_reports_every_pair() {
    let nodes = vec![
        version("n1", "art:1", date("2000-01-01"), date("2020-01-01")),
        version("n2", "art:1", date("2005-01-01"), date("2021-01-01")),
        version("n3", "art:1", date("2010-01-01"), None),
    ];
    let conflicts = detect_conflicts(&nodes, &SeverityPolicy::default());
    let pairs: Vec<(String, String)> = conflicts.iter().map(|c| c.pair_key()).collect();
    assert_eq!(
        pairs,
        vec![
            ("n1".to_string(), "n2".to_string()),
            ("n1".to_string(), "n3".to_string()),
            ("n2".to_string(), "n3".to_string()),
        ]
    );
}

#[test]
fn stale_current_law_flag_follows_policy() {
    let mut v1 = version("n1", "art:5", date("2001-01-01"), date("2010-12-31"));
    let mut v2 = version("n2", "art:5", date("2009-06-01"), date("2012-01-01"));
    v1.is_current_law = true;
    v2.is_current_law = true;

    let strict = detect_conflicts(&[v1.clone(), v2.clone()], &SeverityPolicy::default());
    assert_eq!(strict[0].severity, Severity::Critical);

    let raw_dates_only = SeverityPolicy {
        current_law_flag: false,
        null_valid_to: true,
    };
    let lenient = detect_conflicts(&[v1, v2], &raw_dates_only);
    assert_eq!(lenient[0].severity, Severity::Warning);
}

#[test]
fn recording_twice_creates_no_duplicates() {
    let nodes = vec![
        version("n2", "art:5", date("2009-06-01"), None),
        version("n1", "art:5", date("2001-01-01"), None),
    ];
    let mut store = InMemoryConflictStore::new();

    let first = detect_conflicts(&nodes, &SeverityPolicy::default());
    assert_eq!(record_conflicts(&mut store, first.clone()), 1);
    assert_eq!(record_conflicts(&mut store, first), 0);

    let mut reversed = nodes.clone();
    reversed.reverse();
    let again = detect_conflicts(&reversed, &SeverityPolicy::default());
    assert_eq!(record_conflicts(&mut store, again), 0);

    assert_eq!(store.len(), 1);
    let event = store.events().next().unwrap();
    assert_eq!(event.status, ConflictStatus::Pending);
    assert_eq!(event.candidate.node_id_a, "n1");
}

#[test]
fn duplicate_candidates_in_one_batch_are_recorded_once() {
    let nodes = vec![
        version("n1", "art:5", date("2001-01-01"), None),
        version("n2", "art:5", date("2009-06-01"), None),
    ];
    let mut candidates = detect_conflicts(&nodes, &SeverityPolicy::default());
    let repeated = candidates.clone();
    candidates.extend(repeated);
    let mut store = InMemoryConflictStore::new();
    assert_eq!(record_conflicts(&mut store, candidates), 1);
}
