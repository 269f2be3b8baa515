use crate::text::sha256_hex;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_TECHNICAL_PREFIXES: &[&str] = &[
    "akomantoso",
    "akomanotoso",
    "akoma",
    "akn",
    "it",
    "act",
    "main",
    "main.xml",
    "body",
    "mainbody",
];

/// One element on the open-element stack, as it appears in a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub tag: String,
    pub element_id: Option<String>,
}

impl PathSegment {
    pub fn new(tag: impl Into<String>, element_id: Option<&str>) -> Self {
        Self {
            tag: tag.into(),
            element_id: element_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }

    pub fn render(&self) -> String {
        match &self.element_id {
            Some(id) => format!("{}:{}", self.tag, id),
            None => self.tag.clone(),
        }
    }
}

pub fn build_path(parent_path: &str, tag: &str, element_id: Option<&str>) -> String {
    let segment = PathSegment::new(tag, element_id).render();
    if parent_path.is_empty() {
        segment
    } else {
        format!("{parent_path}/{segment}")
    }
}

/// Keeps sibling paths distinct: the n-th repeat of a segment under one
/// parent gets a `-n` suffix.
#[derive(Debug, Default)]
pub struct SiblingSegments {
    seen: HashMap<String, usize>,
}

impl SiblingSegments {
    pub fn child_path(&mut self, parent_path: &str, tag: &str, element_id: Option<&str>) -> String {
        let segment = PathSegment::new(tag, element_id).render();
        let count = self.seen.entry(segment.clone()).or_insert(0);
        *count += 1;
        let segment = if *count > 1 {
            format!("{segment}-{count}")
        } else {
            segment
        };
        if parent_path.is_empty() {
            segment
        } else {
            format!("{parent_path}/{segment}")
        }
    }
}

pub fn doc_id(canonical_doc: &str) -> String {
    sha256_hex(canonical_doc)
}

/// Node identity deliberately excludes text, so corrections to the text of a
/// node keep its id within the same version.
pub fn node_id(doc_id: &str, version_id: &str, canonical_path: &str) -> String {
    sha256_hex(&format!("{doc_id}:{version_id}:{canonical_path}"))
}

pub fn version_id(doc_id: &str, version_tag: &str) -> String {
    sha256_hex(&format!("{doc_id}:{version_tag}"))
}

pub fn canonical_doc_id(doc_type: &str, number: Option<&str>, year: Option<&str>) -> String {
    let number = number.filter(|n| !n.is_empty()).unwrap_or("0");
    let year = year.filter(|y| !y.is_empty()).unwrap_or("0");
    format!("{doc_type}:{number}:{year}")
}

/// `doc#art:5/c:2/lett:a`, or just `doc` when no unit is given.
pub fn canonical_node(
    canonical_doc: &str,
    article: Option<&str>,
    comma: Option<&str>,
    letter: Option<&str>,
    number: Option<&str>,
) -> String {
    let parts: Vec<String> = [("art", article), ("c", comma), ("lett", letter), ("num", number)]
        .into_iter()
        .filter_map(|(prefix, value)| {
            value
                .filter(|v| !v.is_empty())
                .map(|v| format!("{prefix}:{v}"))
        })
        .collect();
    if parts.is_empty() {
        canonical_doc.to_string()
    } else {
        format!("{canonical_doc}#{}", parts.join("/"))
    }
}

pub fn sort_key(canonical_path: &str) -> String {
    canonical_path.replace('/', "_")
}

/// Builds human-readable breadcrumbs such as `Art. 5 > Comma 2 > lett. a`.
#[derive(Debug, Clone)]
pub struct HierarchyFormatter {
    technical_prefixes: HashSet<String>,
}

impl HierarchyFormatter {
    pub fn new<S: AsRef<str>>(technical_prefixes: &[S]) -> Self {
        Self {
            technical_prefixes: technical_prefixes
                .iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }

    fn is_technical(&self, segment: &str) -> bool {
        let prefix = segment.split(':').next().unwrap_or(segment);
        self.technical_prefixes.contains(&prefix.to_lowercase())
    }

    pub fn hierarchy_string(&self, doc_canonical: &str, path: &str) -> Option<String> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Some(doc_canonical.to_string()).filter(|d| !d.is_empty());
        }
        let kept: Vec<&str> = segments
            .iter()
            .copied()
            .filter(|s| !self.is_technical(s))
            .collect();
        let chosen = if kept.is_empty() { segments } else { kept };
        Some(
            chosen
                .into_iter()
                .map(segment_label)
                .collect::<Vec<_>>()
                .join(" > "),
        )
    }
}

impl Default for HierarchyFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_TECHNICAL_PREFIXES)
    }
}

fn known_label(prefix: &str) -> Option<(&'static str, &'static str)> {
    // (label with suffix, label alone)
    let labels = match prefix.to_lowercase().as_str() {
        "art" | "articolo" | "article" => ("Art.", "Articolo"),
        "c" | "com" | "comma" | "paragraph" => ("Comma", "Comma"),
        "let" | "lett" | "lettera" | "letter" => ("lett.", "Lettera"),
        "num" | "numero" | "item" | "number" => ("n.", "Numero"),
        "capo" | "chapter" => ("Capo", "Capo"),
        "tit" | "titolo" | "title" => ("Titolo", "Titolo"),
        "atto" => ("Atto", "Atto"),
        "preambolo" | "preamble" => ("Preambolo", "Preambolo"),
        "allegato" | "annex" => ("Allegato", "Allegato"),
        "tabella" => ("Tabella", "Tabella"),
        "nota" => ("Nota", "Nota"),
        _ => return None,
    };
    Some(labels)
}

/// Render one path segment (`art:5`, `lett:a`, `chapter`) as a breadcrumb label.
pub fn segment_label(segment: &str) -> String {
    let (prefix, suffix) = match segment.split_once(':') {
        Some((prefix, suffix)) => (prefix, Some(suffix).filter(|s| !s.is_empty())),
        None => (segment, None),
    };
    match (known_label(prefix), suffix) {
        (Some((label, _)), Some(suffix)) => format!("{label} {suffix}"),
        (Some((_, bare)), None) => bare.to_string(),
        (None, Some(suffix)) => format!("{prefix} {suffix}"),
        (None, None) => prefix.to_string(),
    }
}
