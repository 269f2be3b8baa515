use super::header::{build_header, frbr_from_tree, FrbrCollector};
use crate::canonical::{build_path, HierarchyFormatter, SiblingSegments};
use crate::error::{ParseError, ParseWarning};
use crate::sources::common::{
    absorb_element, finish_document, ref_href, ref_mention, Absorbed, NodeUnit,
};
use crate::sources::StructuralParser;
use crate::taxonomy::{TagClass, TagTaxonomy};
use crate::text::TextParts;
use crate::types::{Dialect, ParseOutcome, RefMention};
use crate::xml_tree::{
    child_elements, element_id_of, first_child_element, parse_tree, root_element, Element,
    SaxEvent, SaxReader, XmlNode,
};
use ego_tree::{NodeRef, Tree};
use std::collections::HashMap;
use std::io::BufRead;

/// Taxonomy-driven parser for Akoma Ntoso documents.
///
/// Every structural or container element with text of its own becomes a node.
/// Metadata subtrees contribute nothing except FRBR identifiers.
pub struct AkomaParser {
    taxonomy: TagTaxonomy,
    hierarchy: HierarchyFormatter,
}

impl AkomaParser {
    pub fn new(taxonomy: TagTaxonomy, hierarchy: HierarchyFormatter) -> Self {
        Self {
            taxonomy,
            hierarchy,
        }
    }

    fn excluded_from_text(&self, tag: &str) -> bool {
        let class = self.taxonomy.classify(tag);
        class.is_boundary() || class == TagClass::Metadata
    }

    fn absorb(&self, node: NodeRef<'_, XmlNode>) -> Absorbed {
        absorb_element(node, |el: &Element| self.excluded_from_text(&el.tag))
    }

    fn heading_of(&self, node: NodeRef<'_, XmlNode>) -> Option<String> {
        let heading = first_child_element(node, "heading")?;
        if self.excluded_from_text("heading") {
            return None;
        }
        Some(self.absorb(heading).text).filter(|t| !t.is_empty())
    }

    fn parse_tree_document(
        &self,
        tree: &Tree<XmlNode>,
        warnings: Vec<ParseWarning>,
        source_name: Option<&str>,
    ) -> Result<ParseOutcome, ParseError> {
        let root = root_element(tree).ok_or_else(|| ParseError::NotWellFormed {
            message: "no root element".to_string(),
        })?;

        let root_path = root
            .value()
            .as_element()
            .map(|el| build_path("", &el.tag, el.element_id()))
            .unwrap_or_default();

        let mut units = Vec::new();
        let mut stack: Vec<(NodeRef<'_, XmlNode>, String, usize)> = vec![(root, root_path, 0)];
        while let Some((node, path, level)) = stack.pop() {
            let Some(el) = node.value().as_element() else {
                continue;
            };
            let class = self.taxonomy.classify(&el.tag);
            if class == TagClass::Metadata {
                continue;
            }

            if class.emits_node(Dialect::AkomaNtoso) {
                let absorbed = self.absorb(node);
                let heading = self.heading_of(node);
                if !absorbed.text.is_empty() || heading.is_some() {
                    units.push(akoma_unit(
                        &el.tag,
                        &path,
                        level,
                        el.element_id(),
                        heading,
                        absorbed.text,
                        absorbed.mentions,
                    ));
                }
            }

            let mut siblings = SiblingSegments::default();
            let children: Vec<_> = child_elements(node)
                .filter(|(_, child)| self.taxonomy.classify(&child.tag) != TagClass::Metadata)
                .map(|(child, child_el)| {
                    let child_path =
                        siblings.child_path(&path, &child_el.tag, child_el.element_id());
                    (child, child_path, level + 1)
                })
                .collect();
            stack.extend(children.into_iter().rev());
        }

        let header = build_header(frbr_from_tree(root), source_name);
        Ok(finish_document(
            Dialect::AkomaNtoso,
            header,
            units,
            warnings,
            &self.hierarchy,
            "in-memory",
        ))
    }

    fn parse_events<R: BufRead>(
        &self,
        input: R,
        source_name: Option<&str>,
    ) -> Result<ParseOutcome, ParseError> {
        let mut reader = SaxReader::new(input);
        let mut state = StreamState::default();
        while let Some(event) = reader.next_event()? {
            match event {
                SaxEvent::Open { tag_name, attrs } => {
                    let parent = state
                        .skipped
                        .last()
                        .or_else(|| state.frames.last().map(|f| &f.tag));
                    if let Some(parent) = parent {
                        state.frbr.observe(parent, &tag_name, &attrs);
                    }
                    if !state.skipped.is_empty()
                        || self.taxonomy.classify(&tag_name) == TagClass::Metadata
                    {
                        if state.skipped.is_empty() {
                            if let Some(top) = state.frames.last_mut() {
                                top.parts.mark_boundary();
                            }
                        }
                        state.skipped.push(tag_name);
                        continue;
                    }
                    self.open_frame(&mut state, tag_name, &attrs);
                }
                SaxEvent::Text(text) => {
                    if !state.skipped.is_empty() {
                        continue;
                    }
                    if let Some(top) = state.frames.last_mut().filter(|f| f.absorbing) {
                        top.parts.push_raw(&text);
                    }
                }
                SaxEvent::Close { .. } => {
                    if state.skipped.pop().is_some() {
                        continue;
                    }
                    if let Some(frame) = state.frames.pop() {
                        close_frame(&mut state, frame);
                    }
                }
            }
        }

        let units: Vec<NodeUnit> = state.slots.into_iter().flatten().collect();
        let header = build_header(state.frbr.finish(), source_name);
        Ok(finish_document(
            Dialect::AkomaNtoso,
            header,
            units,
            reader.take_warnings(),
            &self.hierarchy,
            "streaming",
        ))
    }

    fn open_frame(
        &self,
        state: &mut StreamState,
        tag_name: String,
        attrs: &HashMap<String, String>,
    ) {
        let class = self.taxonomy.classify(&tag_name);
        let element_id = element_id_of(attrs).map(|id| id.trim().to_string());
        let emits = class.emits_node(Dialect::AkomaNtoso);
        let (path, absorbing) = match state.frames.last_mut() {
            Some(parent) => (
                parent
                    .children
                    .child_path(&parent.path, &tag_name, element_id.as_deref()),
                emits || (parent.absorbing && !class.is_boundary()),
            ),
            None => (build_path("", &tag_name, element_id.as_deref()), emits),
        };
        let slot = emits.then(|| {
            state.slots.push(None);
            state.slots.len() - 1
        });
        let href = if tag_name == "ref" { ref_href(attrs) } else { None };
        let level = state.frames.len();
        state.frames.push(StreamFrame {
            tag: tag_name,
            path,
            level,
            element_id,
            absorbing,
            slot,
            href,
            children: SiblingSegments::default(),
            parts: TextParts::new(),
            mentions: Vec::new(),
            heading: None,
            heading_seen: false,
        });
    }
}

fn akoma_unit(
    tag: &str,
    path: &str,
    level: usize,
    element_id: Option<&str>,
    heading: Option<String>,
    text: String,
    mentions: Vec<RefMention>,
) -> NodeUnit {
    NodeUnit {
        node_type: tag.to_string(),
        label: path.rsplit('/').next().unwrap_or(path).to_string(),
        canonical_path: path.to_string(),
        heading,
        text,
        level,
        element_id: element_id.map(|id| id.trim().to_string()),
        mentions,
    }
}

struct StreamFrame {
    tag: String,
    path: String,
    level: usize,
    element_id: Option<String>,
    absorbing: bool,
    /// Output position reserved at open time for node-emitting elements.
    slot: Option<usize>,
    href: Option<String>,
    children: SiblingSegments,
    parts: TextParts,
    mentions: Vec<RefMention>,
    heading: Option<String>,
    heading_seen: bool,
}

#[derive(Default)]
struct StreamState {
    frames: Vec<StreamFrame>,
    skipped: Vec<String>,
    slots: Vec<Option<NodeUnit>>,
    frbr: FrbrCollector,
}

fn close_frame(state: &mut StreamState, frame: StreamFrame) {
    let text = frame.parts.finish();

    if frame.slot.is_some() || !frame.absorbing {
        if let Some(parent) = state.frames.last_mut() {
            parent.parts.mark_boundary();
        }
    }
    if let Some(slot) = frame.slot {
        if !text.is_empty() || frame.heading.is_some() {
            state.slots[slot] = Some(akoma_unit(
                &frame.tag,
                &frame.path,
                frame.level,
                frame.element_id.as_deref(),
                frame.heading,
                text,
                frame.mentions,
            ));
        }
        return;
    }
    if !frame.absorbing {
        return;
    }
    let Some(parent) = state.frames.last_mut() else {
        return;
    };
    if frame.tag == "heading" && parent.slot.is_some() && !parent.heading_seen {
        parent.heading_seen = true;
        parent.heading = Some(text.clone()).filter(|t| !t.is_empty());
    }
    parent.parts.push_part(&text);
    if frame.tag == "ref" {
        if let Some(mention) = ref_mention(frame.href, text) {
            parent.mentions.push(mention);
        }
    }
    parent.mentions.extend(frame.mentions);
}

impl StructuralParser for AkomaParser {
    fn dialect(&self) -> Dialect {
        Dialect::AkomaNtoso
    }

    fn parse_str(&self, xml: &str, source_name: Option<&str>) -> Result<ParseOutcome, ParseError> {
        let (tree, warnings) = parse_tree(xml.as_bytes())?;
        self.parse_tree_document(&tree, warnings, source_name)
    }

    fn parse_stream(
        &self,
        input: &mut dyn BufRead,
        source_name: Option<&str>,
    ) -> Result<ParseOutcome, ParseError> {
        self.parse_events(input, source_name)
    }
}
