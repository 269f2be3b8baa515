use super::extract::parse_article_ref;
use super::{AliasTable, ArticleRef};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const EXPLICIT_CONFIDENCE: f64 = 1.0;
pub const DYNAMIC_CONFIDENCE: f64 = 0.85;
pub const ALIAS_CONFIDENCE: f64 = 0.8;
pub const CONTEXTUAL_CONFIDENCE: f64 = 0.6;

static DYNAMIC_LAW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(legge|l\.|d\.lgs\.?|decreto legislativo|d\.l\.|decreto legge|d\.p\.r\.)(?:\s+(?:regionale|provinciale))?[^0-9]*?\b(\d{1,4})\b(?:[^0-9]{1,15})?\b(\d{2,4})\b",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Explicit,
    DynamicParsing,
    Alias,
    Contextual,
    Unresolved,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::Explicit => "explicit",
            ResolutionMethod::DynamicParsing => "dynamic_parsing",
            ResolutionMethod::Alias => "alias",
            ResolutionMethod::Contextual => "contextual",
            ResolutionMethod::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub urn: Option<String>,
    pub confidence: f64,
    pub method: ResolutionMethod,
}

impl Resolution {
    fn found(urn: String, confidence: f64, method: ResolutionMethod) -> Self {
        Self {
            urn: Some(urn),
            confidence,
            method,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            urn: None,
            confidence: 0.0,
            method: ResolutionMethod::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.urn.is_some()
    }
}

/// `base#art5-com2-letb-num3`, or `base` when no unit is known.
pub fn build_urn(base: &str, unit: &ArticleRef) -> String {
    let fragment: Vec<String> = [
        ("art", &unit.article),
        ("com", &unit.comma),
        ("let", &unit.letter),
        ("num", &unit.number),
    ]
    .into_iter()
    .filter_map(|(prefix, value)| value.as_deref().map(|v| format!("{prefix}{v}")))
    .collect();
    if fragment.is_empty() {
        base.to_string()
    } else {
        format!("{base}#{}", fragment.join("-"))
    }
}

fn explicit_urn(match_text: &str) -> Option<String> {
    let start = match_text.find("urn:")?;
    let token = match_text[start..]
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_end_matches([',', '.', ';', ')', ']']);
    Some(token.to_string())
}

fn normalize_year(raw: &str) -> String {
    match (raw.len(), raw.parse::<u32>()) {
        (2, Ok(y)) if y < 50 => format!("20{raw}"),
        (2, Ok(_)) => format!("19{raw}"),
        _ => raw.to_string(),
    }
}

fn urn_act_type(raw: &str) -> &'static str {
    let raw = raw.to_lowercase();
    if raw.starts_with("d.lgs") || raw.contains("legislativo") {
        "decreto.legislativo"
    } else if raw == "d.l." || raw == "decreto legge" {
        "decreto.legge"
    } else if raw.starts_with("d.p.r") {
        "decreto.presidente.repubblica"
    } else {
        "legge"
    }
}

/// `urn:nir:stato:{type}:{year};{number}` for citations like "Legge 231/2001".
pub fn dynamic_law_urn(text: &str) -> Option<String> {
    let caps = DYNAMIC_LAW_RE.captures(text)?;
    let act_type = urn_act_type(caps.get(1)?.as_str());
    let number = caps.get(2)?.as_str();
    let year = normalize_year(caps.get(3)?.as_str());
    Some(format!("urn:nir:stato:{act_type}:{year};{number}"))
}

/// Resolves citations for one citing document at a time.
///
/// Results are cached per `(match_text, raw_snippet)`; switching document
/// through [`UrnResolver::for_document`] drops the cache, since contextual
/// resolutions depend on the citing document.
#[derive(Debug, Clone)]
pub struct UrnResolver {
    document_urn: Option<String>,
    aliases: AliasTable,
    cache: HashMap<(String, String), Resolution>,
}

impl UrnResolver {
    pub fn new(aliases: AliasTable, document_urn: Option<&str>) -> Self {
        Self {
            document_urn: document_urn
                .filter(|u| !u.trim().is_empty())
                .map(str::to_string),
            aliases,
            cache: HashMap::new(),
        }
    }

    pub fn for_document(&mut self, document_urn: Option<&str>) {
        self.document_urn = document_urn
            .filter(|u| !u.trim().is_empty())
            .map(str::to_string);
        self.cache.clear();
    }

    pub fn resolve(&mut self, match_text: &str, raw_snippet: &str) -> Resolution {
        let key = (match_text.to_string(), raw_snippet.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let resolution = self.resolve_uncached(match_text, raw_snippet);
        tracing::debug!(
            "[Resolver] {:?} -> {:?} ({:.2}, {})",
            match_text,
            resolution.urn,
            resolution.confidence,
            resolution.method.as_str()
        );
        self.cache.insert(key, resolution.clone());
        resolution
    }

    fn resolve_uncached(&self, match_text: &str, raw_snippet: &str) -> Resolution {
        if let Some(urn) = explicit_urn(match_text) {
            return Resolution::found(urn, EXPLICIT_CONFIDENCE, ResolutionMethod::Explicit);
        }

        let unit = parse_article_ref(match_text);
        let combined = format!("{match_text} {raw_snippet}");
        let combined = combined.trim();

        if let Some(base) = dynamic_law_urn(combined) {
            return Resolution::found(
                build_urn(&base, &unit),
                DYNAMIC_CONFIDENCE,
                ResolutionMethod::DynamicParsing,
            );
        }

        if let Some(base) = self.aliases.lookup(combined) {
            return Resolution::found(
                build_urn(base, &unit),
                ALIAS_CONFIDENCE,
                ResolutionMethod::Alias,
            );
        }

        if let Some(document_urn) = self.document_urn.as_deref().filter(|_| !unit.is_empty()) {
            return Resolution::found(
                build_urn(document_urn, &unit),
                CONTEXTUAL_CONFIDENCE,
                ResolutionMethod::Contextual,
            );
        }

        Resolution::unresolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn act_types_normalize() {
        assert_eq!(
            dynamic_law_urn("D.Lgs. 40 del 1998").as_deref(),
            Some("urn:nir:stato:decreto.legislativo:1998;40")
        );
        assert_eq!(
            dynamic_law_urn("d.l. 18/2020").as_deref(),
            Some("urn:nir:stato:decreto.legge:2020;18")
        );
        assert_eq!(
            dynamic_law_urn("d.p.r. 917/86").as_deref(),
            Some("urn:nir:stato:decreto.presidente.repubblica:1986;917")
        );
        assert_eq!(dynamic_law_urn("nessuna norma"), None);
    }

    #[test]
    fn explicit_urn_drops_trailing_punctuation() {
        assert_eq!(
            explicit_urn("vedi urn:nir:stato:legge:2000;212, art. 1").as_deref(),
            Some("urn:nir:stato:legge:2000;212")
        );
    }

    #[test]
    fn fragment_order_is_fixed() {
        let unit = ArticleRef {
            article: Some("5".into()),
            comma: Some("2".into()),
            letter: Some("b".into()),
            number: Some("3".into()),
        };
        assert_eq!(build_urn("urn:x", &unit), "urn:x#art5-com2-letb-num3");
        assert_eq!(build_urn("urn:x", &ArticleRef::default()), "urn:x");
    }

    #[test]
    fn switching_document_drops_contextual_cache() {
        let mut resolver = UrnResolver::new(AliasTable::new(&[]), Some("urn:doc:a"));
        assert_eq!(
            resolver.resolve("art. 5", "").urn.as_deref(),
            Some("urn:doc:a#art5")
        );
        resolver.for_document(Some("urn:doc:b"));
        assert_eq!(
            resolver.resolve("art. 5", "").urn.as_deref(),
            Some("urn:doc:b#art5")
        );
    }
}
