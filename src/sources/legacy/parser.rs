use crate::canonical::{canonical_doc_id, HierarchyFormatter};
use crate::dates::parse_date;
use crate::error::{ParseError, ParseWarning};
use crate::sources::common::{absorb_element, finish_document, Absorbed, NodeUnit};
use crate::sources::StructuralParser;
use crate::taxonomy::{TagClass, TagTaxonomy};
use crate::types::{Dialect, DocumentHeader, ParseOutcome};
use crate::xml_tree::{
    child_elements, first_child_element, parse_tree, root_element, Element, SaxEvent, SaxReader,
    TreeBuilder, XmlNode,
};
use ego_tree::NodeRef;
use std::collections::HashMap;
use std::io::BufRead;

/// Direct children of the root that are parsed as self-contained fragments.
const FRAGMENT_TAGS: &[&str] = &["meta", "preambolo", "articolo", "allegato", "nota"];

/// Parser for the legacy Normattiva export:
/// `articolo > comma > lettera > numero`, with `preambolo`, `allegato`
/// (holding `tabella`) and `nota` beside the articles.
///
/// An article without `comma` children keeps all of its own text; no
/// implicit first comma is synthesized.
pub struct LegacyParser {
    taxonomy: TagTaxonomy,
    hierarchy: HierarchyFormatter,
}

impl LegacyParser {
    pub fn new(taxonomy: TagTaxonomy, hierarchy: HierarchyFormatter) -> Self {
        Self {
            taxonomy,
            hierarchy,
        }
    }

    fn finish(
        &self,
        walker: LegacyWalker<'_>,
        mut warnings: Vec<ParseWarning>,
        source_name: Option<&str>,
        mode: &str,
    ) -> ParseOutcome {
        warnings.extend(walker.warnings);
        let header = walker.meta.into_header(source_name);
        finish_document(
            Dialect::Legacy,
            header,
            walker.units,
            warnings,
            &self.hierarchy,
            mode,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdIssue {
    Missing,
    Duplicate,
}

/// Hands out unit ids within one parent, repairing missing and repeated ones.
#[derive(Debug, Default)]
struct IdAllocator {
    seen: HashMap<String, usize>,
    ordinal: usize,
}

fn normalize_unit_id(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("-")
}

impl IdAllocator {
    fn assign(
        &mut self,
        raw: Option<&str>,
        fallback: fn(usize) -> String,
    ) -> (String, Option<IdIssue>) {
        self.ordinal += 1;
        let (base, issue) = match raw.map(normalize_unit_id).filter(|id| !id.is_empty()) {
            Some(id) => (id, None),
            None => (fallback(self.ordinal), Some(IdIssue::Missing)),
        };

        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            return (base, issue);
        }

        let mut n = *count;
        let mut candidate = format!("{base}-{n}");
        while self.seen.contains_key(&candidate) {
            n += 1;
            candidate = format!("{base}-{n}");
        }
        self.seen.insert(candidate.clone(), 1);
        (candidate, Some(IdIssue::Duplicate))
    }
}

fn ordinal_id(n: usize) -> String {
    n.to_string()
}

fn ordinal_letter(n: usize) -> String {
    match u8::try_from(n) {
        Ok(n @ 1..=26) => char::from(b'a' + n - 1).to_string(),
        _ => n.to_string(),
    }
}

fn ordinal_annex(n: usize) -> String {
    ordinal_letter(n).to_uppercase()
}

#[derive(Debug, Default)]
struct LegacyMeta {
    seen: bool,
    doc_type: Option<String>,
    number: Option<String>,
    year: Option<String>,
    title: Option<String>,
    valid_from: Option<String>,
    valid_to: Option<String>,
    source_url: Option<String>,
    version_tag: Option<String>,
}

fn digits(value: Option<&str>) -> Option<i32> {
    value
        .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
        .and_then(|v| v.parse().ok())
}

impl LegacyMeta {
    fn into_header(self, source_name: Option<&str>) -> DocumentHeader {
        let doc_type = self
            .doc_type
            .map(|t| t.to_lowercase())
            .unwrap_or_else(|| "altro".to_string());
        DocumentHeader {
            canonical_doc: canonical_doc_id(&doc_type, self.number.as_deref(), self.year.as_deref()),
            number: digits(self.number.as_deref()),
            year: digits(self.year.as_deref()),
            doc_type,
            title: self.title,
            authority: None,
            version_tag: self.version_tag,
            valid_from: self.valid_from.as_deref().and_then(parse_date),
            valid_to: self.valid_to.as_deref().and_then(parse_date),
            source_url: self.source_url,
            source_name: source_name.map(str::to_string),
            frbr: None,
        }
    }
}

/// Walks top-level fragments in document order. Shared by both modes so that
/// ids, labels and warnings come out the same.
struct LegacyWalker<'a> {
    taxonomy: &'a TagTaxonomy,
    units: Vec<NodeUnit>,
    warnings: Vec<ParseWarning>,
    meta: LegacyMeta,
    preamboli: usize,
    articles: IdAllocator,
    annexes: IdAllocator,
    notes: IdAllocator,
}

impl<'a> LegacyWalker<'a> {
    fn new(taxonomy: &'a TagTaxonomy) -> Self {
        Self {
            taxonomy,
            units: Vec::new(),
            warnings: Vec::new(),
            meta: LegacyMeta::default(),
            preamboli: 0,
            articles: IdAllocator::default(),
            annexes: IdAllocator::default(),
            notes: IdAllocator::default(),
        }
    }

    fn fragment(&mut self, node: NodeRef<'_, XmlNode>) {
        let Some(el) = node.value().as_element() else {
            return;
        };
        match el.tag.as_str() {
            "meta" => self.meta(node),
            "preambolo" => self.preambolo(node),
            "articolo" => self.articolo(node, el),
            "allegato" => self.allegato(node, el),
            "nota" => self.nota(node, el),
            _ => {}
        }
    }

    fn text_of(&self, node: NodeRef<'_, XmlNode>, units: &[&str]) -> Absorbed {
        absorb_element(node, |child: &Element| {
            units.contains(&child.tag.as_str())
                || self.taxonomy.classify(&child.tag) == TagClass::Metadata
        })
    }

    fn child_text(&self, node: NodeRef<'_, XmlNode>, tag: &str) -> Option<String> {
        let child = first_child_element(node, tag)?;
        Some(absorb_element(child, |_| false).text).filter(|t| !t.is_empty())
    }

    fn assign(
        &mut self,
        allocator: Allocator,
        unit: &str,
        el: &Element,
        fallback: fn(usize) -> String,
    ) -> String {
        let raw = el.attr("id");
        let (id, issue) = match allocator {
            Allocator::Article => self.articles.assign(raw, fallback),
            Allocator::Annex => self.annexes.assign(raw, fallback),
            Allocator::Note => self.notes.assign(raw, fallback),
            Allocator::Local(local) => local.assign(raw, fallback),
        };
        if issue.is_some() {
            self.warnings.push(ParseWarning::AmbiguousArticleId {
                unit: unit.to_string(),
                raw: raw.map(str::to_string),
                assigned: id.clone(),
            });
        }
        id
    }

    fn push_unit(
        &mut self,
        node_type: &str,
        label: String,
        path: String,
        heading: Option<String>,
        absorbed: Absorbed,
        element_id: Option<&str>,
    ) {
        if absorbed.text.is_empty() && heading.is_none() {
            return;
        }
        let level = path.matches('/').count();
        self.units.push(NodeUnit {
            node_type: node_type.to_string(),
            label,
            canonical_path: path,
            heading,
            text: absorbed.text,
            level,
            element_id: element_id.map(str::to_string),
            mentions: absorbed.mentions,
        });
    }

    fn meta(&mut self, node: NodeRef<'_, XmlNode>) {
        if self.meta.seen {
            return;
        }
        self.meta = LegacyMeta {
            seen: true,
            doc_type: self.child_text(node, "doc_type"),
            number: self.child_text(node, "number"),
            year: self.child_text(node, "year"),
            title: self.child_text(node, "title"),
            valid_from: self.child_text(node, "valid_from"),
            valid_to: self.child_text(node, "valid_to"),
            source_url: self.child_text(node, "source_url"),
            version_tag: self.child_text(node, "version_tag"),
        };
    }

    fn preambolo(&mut self, node: NodeRef<'_, XmlNode>) {
        self.preamboli += 1;
        let path = if self.preamboli == 1 {
            "atto/preambolo".to_string()
        } else {
            format!("atto/preambolo:{}", self.preamboli)
        };
        let absorbed = self.text_of(node, &[]);
        self.push_unit("atto_preambolo", "Preambolo".to_string(), path, None, absorbed, None);
    }

    fn articolo(&mut self, node: NodeRef<'_, XmlNode>, el: &Element) {
        let art_id = self.assign(Allocator::Article, "articolo", el, ordinal_id);
        let art_path = format!("art:{art_id}");
        let heading = self.child_text(node, "rubrica");
        let absorbed = self.text_of(node, &["rubrica", "comma"]);
        self.push_unit(
            "articolo",
            format!("Art. {art_id}"),
            art_path.clone(),
            heading,
            absorbed,
            el.attr("id"),
        );

        let mut commas = IdAllocator::default();
        for (comma, comma_el) in child_elements(node).filter(|(_, e)| e.tag == "comma") {
            let comma_id = self.assign(Allocator::Local(&mut commas), "comma", comma_el, ordinal_id);
            let comma_path = format!("{art_path}/c:{comma_id}");
            let absorbed = self.text_of(comma, &["lettera"]);
            self.push_unit(
                "comma",
                format!("comma {comma_id}"),
                comma_path.clone(),
                None,
                absorbed,
                comma_el.attr("id"),
            );

            let mut letters = IdAllocator::default();
            for (lettera, lettera_el) in child_elements(comma).filter(|(_, e)| e.tag == "lettera") {
                let letter_id =
                    self.assign(Allocator::Local(&mut letters), "lettera", lettera_el, ordinal_letter);
                let letter_path = format!("{comma_path}/lett:{letter_id}");
                let absorbed = self.text_of(lettera, &["numero"]);
                self.push_unit(
                    "lettera",
                    format!("lett. {letter_id}"),
                    letter_path.clone(),
                    None,
                    absorbed,
                    lettera_el.attr("id"),
                );

                let mut numbers = IdAllocator::default();
                for (numero, numero_el) in child_elements(lettera).filter(|(_, e)| e.tag == "numero") {
                    let num_id =
                        self.assign(Allocator::Local(&mut numbers), "numero", numero_el, ordinal_id);
                    let absorbed = self.text_of(numero, &[]);
                    self.push_unit(
                        "numero",
                        format!("num. {num_id}"),
                        format!("{letter_path}/num:{num_id}"),
                        None,
                        absorbed,
                        numero_el.attr("id"),
                    );
                }
            }
        }
    }

    fn allegato(&mut self, node: NodeRef<'_, XmlNode>, el: &Element) {
        let annex_id = self.assign(Allocator::Annex, "allegato", el, ordinal_annex);
        let annex_path = format!("allegato:{annex_id}");
        let absorbed = self.text_of(node, &["tabella"]);
        self.push_unit(
            "allegato",
            format!("Allegato {annex_id}"),
            annex_path.clone(),
            None,
            absorbed,
            el.attr("id"),
        );

        let mut tables = IdAllocator::default();
        for (tabella, tabella_el) in child_elements(node).filter(|(_, e)| e.tag == "tabella") {
            let table_id = self.assign(Allocator::Local(&mut tables), "tabella", tabella_el, ordinal_id);
            let absorbed = self.text_of(tabella, &[]);
            self.push_unit(
                "tabella",
                format!("Tabella {table_id}"),
                format!("{annex_path}/tabella:{table_id}"),
                None,
                absorbed,
                tabella_el.attr("id"),
            );
        }
    }

    fn nota(&mut self, node: NodeRef<'_, XmlNode>, el: &Element) {
        let note_id = self.assign(Allocator::Note, "nota", el, ordinal_id);
        let absorbed = self.text_of(node, &[]);
        self.push_unit(
            "nota",
            format!("nota {note_id}"),
            format!("nota:{note_id}"),
            None,
            absorbed,
            el.attr("id"),
        );
    }
}

enum Allocator<'b> {
    Article,
    Annex,
    Note,
    Local(&'b mut IdAllocator),
}

impl StructuralParser for LegacyParser {
    fn dialect(&self) -> Dialect {
        Dialect::Legacy
    }

    fn parse_str(&self, xml: &str, source_name: Option<&str>) -> Result<ParseOutcome, ParseError> {
        let (tree, warnings) = parse_tree(xml.as_bytes())?;
        let root = root_element(&tree).ok_or_else(|| ParseError::NotWellFormed {
            message: "no root element".to_string(),
        })?;
        let mut walker = LegacyWalker::new(&self.taxonomy);
        for (child, _) in child_elements(root) {
            walker.fragment(child);
        }
        Ok(self.finish(walker, warnings, source_name, "in-memory"))
    }

    fn parse_stream(
        &self,
        input: &mut dyn BufRead,
        source_name: Option<&str>,
    ) -> Result<ParseOutcome, ParseError> {
        let mut reader = SaxReader::new(input);
        let mut walker = LegacyWalker::new(&self.taxonomy);
        let mut depth = 0usize;
        let mut capture: Option<TreeBuilder> = None;

        while let Some(event) = reader.next_event()? {
            match event {
                SaxEvent::Open { tag_name, attrs } => {
                    if let Some(builder) = capture.as_mut() {
                        builder.open(tag_name, attrs);
                    } else if depth == 1 && FRAGMENT_TAGS.contains(&tag_name.as_str()) {
                        let mut builder = TreeBuilder::new();
                        builder.open(tag_name, attrs);
                        capture = Some(builder);
                    }
                    depth += 1;
                }
                SaxEvent::Text(text) => {
                    if let Some(builder) = capture.as_mut() {
                        builder.text(&text);
                    }
                }
                SaxEvent::Close { .. } => {
                    depth = depth.saturating_sub(1);
                    let Some(builder) = capture.as_mut() else {
                        continue;
                    };
                    builder.close();
                    if builder.depth() > 0 {
                        continue;
                    }
                    // Fragment complete: walk it, then drop the subtree.
                    if let Some(builder) = capture.take() {
                        let tree = builder.finish();
                        if let Some(fragment) = root_element(&tree) {
                            walker.fragment(fragment);
                        }
                    }
                }
            }
        }

        let warnings = reader.take_warnings();
        Ok(self.finish(walker, warnings, source_name, "streaming"))
    }
}
