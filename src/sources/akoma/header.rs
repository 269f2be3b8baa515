use crate::canonical::canonical_doc_id;
use crate::dates::parse_date;
use crate::types::{DocumentHeader, FrbrMeta};
use crate::xml_tree::{attr_value, XmlNode};
use ego_tree::NodeRef;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static AKN_URN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/akn/(?P<country>[a-z]{2})/(?P<class>act|bill|doc)/(?P<doc_type>[^/]+)/(?P<authority>[^/]+)/(?P<date>\d{4}-\d{2}-\d{2})/(?P<number>\d+)(?:/|$)",
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AkomaUrn {
    pub country: String,
    pub doc_type: String,
    pub authority: String,
    pub date: String,
    pub number: String,
}

impl AkomaUrn {
    pub fn year(&self) -> &str {
        &self.date[..4]
    }
}

/// `/akn/it/act/legge/stato/2000-07-27/212/!main` style work identifiers.
pub fn parse_akoma_urn(urn: &str) -> Option<AkomaUrn> {
    let caps = AKN_URN_RE.captures(urn)?;
    Some(AkomaUrn {
        country: caps["country"].to_lowercase(),
        doc_type: caps["doc_type"].to_lowercase(),
        authority: caps["authority"].to_string(),
        date: caps["date"].to_string(),
        number: caps["number"].to_string(),
    })
}

/// Picks FRBR identifiers out of `<identification>` as elements go by.
/// The first value seen for each slot wins.
#[derive(Debug, Default)]
pub struct FrbrCollector {
    work_this: Option<String>,
    work_uri: Option<String>,
    expression_this: Option<String>,
    expression_uri: Option<String>,
    manifestation_this: Option<String>,
    manifestation_uri: Option<String>,
    expression_date: Option<String>,
    manifestation_date: Option<String>,
}

fn keep_first(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        *slot = value.map(|v| v.trim().to_string());
    }
}

impl FrbrCollector {
    pub fn observe(&mut self, parent: &str, tag: &str, attrs: &HashMap<String, String>) {
        let value = attr_value(attrs, "value");
        let date = attr_value(attrs, "date");
        match (parent, tag) {
            ("FRBRWork", "FRBRthis") => keep_first(&mut self.work_this, value),
            ("FRBRWork", "FRBRuri") => keep_first(&mut self.work_uri, value),
            ("FRBRExpression", "FRBRthis") => keep_first(&mut self.expression_this, value),
            ("FRBRExpression", "FRBRuri") => keep_first(&mut self.expression_uri, value),
            ("FRBRExpression", "FRBRdate") => keep_first(&mut self.expression_date, date),
            ("FRBRManifestation", "FRBRthis") => keep_first(&mut self.manifestation_this, value),
            ("FRBRManifestation", "FRBRuri") => keep_first(&mut self.manifestation_uri, value),
            ("FRBRManifestation", "FRBRdate") => {
                keep_first(&mut self.manifestation_date, date)
            }
            _ => {}
        }
    }

    pub fn finish(self) -> FrbrMeta {
        FrbrMeta {
            urn: self.work_this,
            work_urn: self.work_uri,
            expression_urn: self.expression_uri.or(self.expression_this),
            manifestation_urn: self.manifestation_uri.or(self.manifestation_this),
            publication_date: self.manifestation_date,
            version_date: self.expression_date,
        }
    }
}

/// Run the collector over an already built tree, in document order.
pub fn frbr_from_tree(root: NodeRef<'_, XmlNode>) -> FrbrMeta {
    let mut collector = FrbrCollector::default();
    for node in root.descendants() {
        let Some(el) = node.value().as_element() else {
            continue;
        };
        if let Some(parent) = node.parent().and_then(|p| p.value().as_element()) {
            collector.observe(&parent.tag, &el.tag, &el.attrs);
        }
    }
    collector.finish()
}

pub fn build_header(frbr: FrbrMeta, source_name: Option<&str>) -> DocumentHeader {
    let parsed = [frbr.urn.as_deref(), frbr.work_urn.as_deref()]
        .into_iter()
        .flatten()
        .find_map(parse_akoma_urn);

    let canonical_doc = match &parsed {
        Some(urn) => canonical_doc_id(&urn.doc_type, Some(&urn.number), Some(urn.year())),
        None => frbr
            .urn
            .clone()
            .or_else(|| frbr.work_urn.clone())
            .or_else(|| source_name.map(str::to_string))
            .unwrap_or_else(|| canonical_doc_id("altro", None, None)),
    };

    DocumentHeader {
        canonical_doc,
        doc_type: parsed
            .as_ref()
            .map(|u| u.doc_type.clone())
            .unwrap_or_else(|| "altro".to_string()),
        number: parsed.as_ref().and_then(|u| u.number.parse().ok()),
        year: parsed.as_ref().and_then(|u| u.year().parse().ok()),
        title: None,
        authority: parsed.as_ref().map(|u| u.authority.clone()),
        version_tag: frbr
            .expression_urn
            .clone()
            .or_else(|| frbr.version_date.clone()),
        valid_from: frbr.version_date.as_deref().and_then(parse_date),
        valid_to: None,
        source_url: None,
        source_name: source_name.map(str::to_string),
        frbr: Some(frbr),
    }
}
