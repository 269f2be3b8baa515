use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

pub mod extract;
pub mod resolved;
pub mod resolver;

pub use extract::extract_references;
pub use resolved::{resolve_references, NodeLookup, ReferenceResolved, ResolvedReferenceSet};
pub use resolver::{Resolution, ResolutionMethod, UrnResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Cites,
    Amends,
    Repeals,
    Derogates,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Cites => "CITES",
            RelationType::Amends => "AMENDS",
            RelationType::Repeals => "REPEALS",
            RelationType::Derogates => "DEROGATES",
        }
    }
}

/// Provenance tag stored with each extracted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    #[serde(rename = "alias:v1")]
    Alias,
    #[serde(rename = "regex:v1")]
    Regex,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Alias => "alias:v1",
            ExtractionMethod::Regex => "regex:v1",
        }
    }
}

/// A well-known short name for an act, e.g. `TUIR` for `dpr:917:1986`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub target: String,
}

impl AliasEntry {
    pub fn new(alias: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            target: target.into(),
        }
    }
}

/// Aliases compiled to case-insensitive literal matchers, in table order.
#[derive(Debug, Clone)]
pub struct AliasTable {
    entries: Vec<(AliasEntry, Regex)>,
}

impl AliasTable {
    pub fn new(entries: &[AliasEntry]) -> Self {
        let mut compiled = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.alias.trim().is_empty() {
                tracing::warn!("[References] Skipping empty alias for {}", entry.target);
                continue;
            }
            match RegexBuilder::new(&regex::escape(&entry.alias))
                .case_insensitive(true)
                .build()
            {
                Ok(re) => compiled.push((entry.clone(), re)),
                Err(err) => {
                    tracing::warn!("[References] Skipping alias {:?}: {}", entry.alias, err)
                }
            }
        }
        Self { entries: compiled }
    }

    /// First occurrence of every alias found in `text`, as `(entry, byte offset)`.
    pub fn find_all<'a>(&'a self, text: &str) -> Vec<(&'a AliasEntry, usize)> {
        self.entries
            .iter()
            .filter_map(|(entry, re)| re.find(text).map(|m| (entry, m.start())))
            .collect()
    }

    /// Target of the first alias in table order that occurs in `text`.
    pub fn lookup(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(entry, _)| entry.target.as_str())
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new(&crate::config::KbConfig::default().aliases)
    }
}

/// Article / comma / letter / number, all but the article optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    pub article: Option<String>,
    pub comma: Option<String>,
    pub letter: Option<String>,
    pub number: Option<String>,
}

impl ArticleRef {
    pub fn is_empty(&self) -> bool {
        self.article.is_none()
    }
}

/// One citation found in a node's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    pub match_text: String,
    pub raw_snippet: String,
    pub relation_type: RelationType,
    pub target_article: Option<String>,
    pub target_comma: Option<String>,
    pub target_letter: Option<String>,
    pub target_number: Option<String>,
    pub target_canonical_doc: Option<String>,
    pub target_canonical_node: Option<String>,
    pub confidence: f64,
    pub method: ExtractionMethod,
}

impl ReferenceCandidate {
    pub fn article_ref(&self) -> ArticleRef {
        ArticleRef {
            article: self.target_article.clone(),
            comma: self.target_comma.clone(),
            letter: self.target_letter.clone(),
            number: self.target_number.clone(),
        }
    }
}
