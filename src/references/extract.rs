use super::{AliasTable, ArticleRef, ExtractionMethod, ReferenceCandidate, RelationType};
use crate::canonical::{canonical_doc_id, canonical_node};
use regex::{Captures, Regex};
use std::sync::LazyLock;

const SNIPPET_RADIUS: usize = 200;
const SNIPPET_FALLBACK_CHARS: usize = 400;
const ARTICLE_WINDOW: usize = 80;
const EMPTY_TEXT_SNIPPET: &str = "(testo vuoto)";

pub const ALIAS_CONFIDENCE: f64 = 0.6;
pub const ACT_CONFIDENCE: f64 = 0.6;
pub const ACT_WITH_ARTICLE_CONFIDENCE: f64 = 0.9;
pub const ARTICLE_CONFIDENCE: f64 = 0.4;

static ART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bart(?:icolo|\.)\s*(\d+[a-z-]*)(?:,\s*comma\s*(\d+[a-z-]*))?(?:,\s*(?:lettera|lett\.)\s*([a-z]))?(?:,\s*n\.\s*(\d+))?",
    )
    .unwrap()
});

// Checked in order; a match inside an earlier act match is the same citation.
static ACT_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("dlgs", r"(?i)\bdecreto legislativo\s+n\.\s*(\d+)\s+del\s+(\d{4})"),
        ("dlgs", r"(?i)\bd\.\s?lgs\.?\s*(?:n\.\s*)?(\d+)/(\d{4})"),
        ("dl", r"(?i)\bd\.l\.\s*(?:n\.\s*)?(\d+)/(\d{4})"),
        ("dpr", r"(?i)\bd\.?p\.?r\.?\s*(?:n\.\s*)?(\d+)/(\d{4})"),
        ("l", r"(?i)\blegge\s*(?:n\.\s*)?(\d+)/(\d{4})"),
        ("l", r"(?i)\bl\.\s*n\.\s*(\d+)/(\d{4})"),
    ]
    .into_iter()
    .map(|(doc_type, pattern)| (doc_type, Regex::new(pattern).unwrap()))
    .collect()
});

// Strongest cue first.
static RELATION_PATTERNS: LazyLock<Vec<(RelationType, Regex)>> = LazyLock::new(|| {
    vec![
        (
            RelationType::Amends,
            Regex::new(r"(?i)modificat[oaie] da|sostituit[oaie] da|inserit[oaie] da").unwrap(),
        ),
        (RelationType::Repeals, Regex::new(r"(?i)abrogat[oaie]").unwrap()),
        (RelationType::Derogates, Regex::new(r"(?i)in deroga a").unwrap()),
    ]
});

/// Find citations in one node's cleaned text.
///
/// The alias, act and bare-article passes all run over the whole text and
/// their results are concatenated without merging.
pub fn extract_references(text: &str, aliases: &AliasTable) -> Vec<ReferenceCandidate> {
    let mut candidates = Vec::new();
    let relation = detect_relation(text);

    for (entry, position) in aliases.find_all(text) {
        candidates.push(ReferenceCandidate {
            match_text: entry.alias.clone(),
            raw_snippet: snippet(text, position),
            relation_type: RelationType::Cites,
            target_article: None,
            target_comma: None,
            target_letter: None,
            target_number: None,
            target_canonical_doc: Some(entry.target.clone()),
            target_canonical_node: None,
            confidence: ALIAS_CONFIDENCE,
            method: ExtractionMethod::Alias,
        });
    }

    let mut act_spans: Vec<(usize, usize)> = Vec::new();
    for (doc_type, pattern) in ACT_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let (start, end) = (whole.start(), whole.end());
            if act_spans.iter().any(|&(s, e)| s <= start && end <= e) {
                continue;
            }
            act_spans.push((start, end));

            let canonical_doc = canonical_doc_id(doc_type, group(&caps, 1), group(&caps, 2));
            let nearby = ART_RE
                .captures(window(text, start, end, ARTICLE_WINDOW))
                .map(|c| article_ref(&c))
                .unwrap_or_default();
            let confidence = if nearby.is_empty() {
                ACT_CONFIDENCE
            } else {
                ACT_WITH_ARTICLE_CONFIDENCE
            };
            let canonical_node = (!nearby.is_empty()).then(|| {
                canonical_node(
                    &canonical_doc,
                    nearby.article.as_deref(),
                    nearby.comma.as_deref(),
                    nearby.letter.as_deref(),
                    nearby.number.as_deref(),
                )
            });

            candidates.push(ReferenceCandidate {
                match_text: whole.as_str().to_string(),
                raw_snippet: snippet(text, start),
                relation_type: relation,
                target_article: nearby.article,
                target_comma: nearby.comma,
                target_letter: nearby.letter,
                target_number: nearby.number,
                target_canonical_doc: Some(canonical_doc),
                target_canonical_node: canonical_node,
                confidence,
                method: ExtractionMethod::Regex,
            });
        }
    }

    for caps in ART_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let found = article_ref(&caps);
        candidates.push(ReferenceCandidate {
            match_text: whole.as_str().to_string(),
            raw_snippet: snippet(text, whole.start()),
            relation_type: relation,
            target_article: found.article,
            target_comma: found.comma,
            target_letter: found.letter,
            target_number: found.number,
            target_canonical_doc: None,
            target_canonical_node: None,
            confidence: ARTICLE_CONFIDENCE,
            method: ExtractionMethod::Regex,
        });
    }

    candidates
}

pub fn detect_relation(text: &str) -> RelationType {
    RELATION_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(relation, _)| *relation)
        .unwrap_or(RelationType::Cites)
}

/// Parse the first article reference in `text`.
pub fn parse_article_ref(text: &str) -> ArticleRef {
    ART_RE
        .captures(text)
        .map(|c| article_ref(&c))
        .unwrap_or_default()
}

fn article_ref(caps: &Captures) -> ArticleRef {
    let owned = |i| group(caps, i).map(str::to_string);
    ArticleRef {
        article: owned(1),
        comma: owned(2),
        letter: owned(3).map(|l| l.to_lowercase()),
        number: owned(4),
    }
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> Option<&'t str> {
    caps.get(index).map(|m| m.as_str())
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

fn window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = floor_boundary(text, start.saturating_sub(radius));
    let to = ceil_boundary(text, end.saturating_add(radius));
    &text[from..to]
}

/// Text around `position`, never empty.
pub fn snippet(text: &str, position: usize) -> String {
    if text.is_empty() {
        return EMPTY_TEXT_SNIPPET.to_string();
    }
    let around = window(text, position, position, SNIPPET_RADIUS).trim();
    if !around.is_empty() {
        return around.to_string();
    }
    let head: String = text.chars().take(SNIPPET_FALLBACK_CHARS).collect();
    if head.trim().is_empty() {
        EMPTY_TEXT_SNIPPET.to_string()
    } else {
        head
    }
}
