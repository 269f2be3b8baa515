#![allow(dead_code)]
use normattiva_kb::config::KbConfig;
use normattiva_kb::sources::DocumentParser;
use normattiva_kb::types::ParseOutcome;
use std::path::Path;

pub fn fixtures_dir() -> String {
    format!("{}/tests/fixtures", env!("CARGO_MANIFEST_DIR"))
}

pub fn load_fixture(filename: &str) -> String {
    let path = Path::new(&fixtures_dir()).join(filename);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

pub fn default_parser() -> DocumentParser {
    DocumentParser::from_config(&KbConfig::default()).expect("default config is valid")
}

pub fn paths(outcome: &ParseOutcome) -> Vec<&str> {
    outcome
        .document
        .nodes
        .iter()
        .map(|n| n.canonical_path.as_str())
        .collect()
}

/// Sorted `(canonical_path, text_clean)` pairs, for comparing parse modes.
pub fn path_text_pairs(outcome: &ParseOutcome) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = outcome
        .document
        .nodes
        .iter()
        .map(|n| (n.canonical_path.clone(), n.text_clean.clone()))
        .collect();
    pairs.sort();
    pairs
}
