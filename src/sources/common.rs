use crate::canonical::{sort_key, HierarchyFormatter};
use crate::error::ParseWarning;
use crate::logging::log_parse_warnings;
use crate::text::{clean_text, sha256_hex, TextParts};
use crate::types::{Dialect, DocumentHeader, ParseOutcome, ParsedDocument, ParsedNode, RefMention};
use crate::xml_tree::{Element, XmlNode};
use ego_tree::iter::Children;
use ego_tree::NodeRef;
use std::collections::HashMap;

pub fn ref_href(attrs: &HashMap<String, String>) -> Option<String> {
    ["href", "hrefs"]
        .iter()
        .filter_map(|key| attrs.get(*key))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn ref_mention(href: Option<String>, text: String) -> Option<RefMention> {
    if href.is_none() && text.is_empty() {
        return None;
    }
    Some(RefMention {
        href: href.unwrap_or_default(),
        text,
    })
}

/// Normalized text of an element together with the `<ref>`s seen in it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Absorbed {
    pub text: String,
    pub mentions: Vec<RefMention>,
}

struct AbsorbFrame<'a> {
    element: Option<&'a Element>,
    children: Children<'a, XmlNode>,
    parts: TextParts,
    mentions: Vec<RefMention>,
}

impl<'a> AbsorbFrame<'a> {
    fn new(node: NodeRef<'a, XmlNode>) -> Self {
        Self {
            element: node.value().as_element(),
            children: node.children(),
            parts: TextParts::new(),
            mentions: Vec::new(),
        }
    }
}

/// Collect the text of `node` and every descendant not rejected by `exclude`.
///
/// Text directly inside the element and between children is kept even when
/// the surrounding child is excluded. Each absorbed child is normalized on its
/// own before being joined to its parent.
pub fn absorb_element<F>(node: NodeRef<'_, XmlNode>, exclude: F) -> Absorbed
where
    F: Fn(&Element) -> bool,
{
    let mut stack = vec![AbsorbFrame::new(node)];
    loop {
        let Some(top) = stack.last_mut() else {
            return Absorbed::default();
        };
        match top.children.next() {
            Some(child) => match child.value() {
                XmlNode::Text(text) => top.parts.push_raw(text),
                XmlNode::Element(el) => {
                    if exclude(el) {
                        top.parts.mark_boundary();
                    } else {
                        stack.push(AbsorbFrame::new(child));
                    }
                }
                XmlNode::Document => {}
            },
            None => {
                let Some(done) = stack.pop() else {
                    return Absorbed::default();
                };
                let text = done.parts.finish();
                match stack.last_mut() {
                    Some(parent) => {
                        parent.parts.push_part(&text);
                        if let Some(el) = done.element.filter(|el| el.tag == "ref") {
                            if let Some(mention) = ref_mention(ref_href(&el.attrs), text) {
                                parent.mentions.push(mention);
                            }
                        }
                        parent.mentions.extend(done.mentions);
                    }
                    None => {
                        return Absorbed {
                            text,
                            mentions: done.mentions,
                        }
                    }
                }
            }
        }
    }
}

/// A node before identity and hashes are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUnit {
    pub node_type: String,
    pub label: String,
    pub canonical_path: String,
    pub heading: Option<String>,
    pub text: String,
    pub level: usize,
    pub element_id: Option<String>,
    pub mentions: Vec<RefMention>,
}

impl NodeUnit {
    pub fn into_node(self, hierarchy: &HierarchyFormatter, doc_canonical: &str) -> ParsedNode {
        let text_clean = clean_text(&self.text);
        ParsedNode {
            hierarchy_string: hierarchy.hierarchy_string(doc_canonical, &self.canonical_path),
            sort_key: sort_key(&self.canonical_path),
            text_hash: sha256_hex(&text_clean),
            text_clean,
            text_raw: self.text,
            node_type: self.node_type,
            label: self.label,
            canonical_path: self.canonical_path,
            heading: self.heading,
            level: self.level,
            element_id: self.element_id,
            mentions: self.mentions,
        }
    }
}

/// Attach identity to every unit, flag empty documents, and log the result.
pub fn finish_document(
    dialect: Dialect,
    header: DocumentHeader,
    units: Vec<NodeUnit>,
    mut warnings: Vec<ParseWarning>,
    hierarchy: &HierarchyFormatter,
    mode: &str,
) -> ParseOutcome {
    let nodes: Vec<ParsedNode> = units
        .into_iter()
        .map(|unit| unit.into_node(hierarchy, &header.canonical_doc))
        .collect();
    if nodes.is_empty() {
        warnings.push(ParseWarning::EmptyDocument);
    }

    let source = header
        .source_name
        .clone()
        .unwrap_or_else(|| header.canonical_doc.clone());
    log_parse_warnings(&source, &warnings);
    tracing::info!(
        "[Parser] {} ({}, {}): {} nodes, {} warnings",
        source,
        dialect.as_str(),
        mode,
        nodes.len(),
        warnings.len()
    );

    ParseOutcome {
        document: ParsedDocument {
            dialect,
            header,
            nodes,
        },
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml_tree::{parse_tree, root_element};

    #[test]
    fn absorb_keeps_tail_text_of_excluded_children() {
        let xml = "<article>Prima <paragraph>escluso</paragraph> dopo <p>uno</p><p>due</p></article>";
        let (tree, _) = parse_tree(xml.as_bytes()).unwrap();
        let root = root_element(&tree).unwrap();
        let absorbed = absorb_element(root, |el| el.tag == "paragraph");
        assert_eq!(absorbed.text, "Prima dopo uno due");
    }

    #[test]
    fn absorb_collects_refs_with_visible_text() {
        let xml = r#"<p>vedi <ref href="/akn/it/act/legge/stato/2000-07-27/212"> legge <i>212</i></ref>.</p>"#;
        let (tree, _) = parse_tree(xml.as_bytes()).unwrap();
        let root = root_element(&tree).unwrap();
        let absorbed = absorb_element(root, |_| false);
        assert_eq!(absorbed.text, "vedi legge 212.");
        assert_eq!(
            absorbed.mentions,
            vec![RefMention {
                href: "/akn/it/act/legge/stato/2000-07-27/212".to_string(),
                text: "legge 212".to_string(),
            }]
        );
    }
}
