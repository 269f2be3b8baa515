//! Error-tolerant XML event reading and a small owned element tree.
//!
//! [`SaxReader`] wraps `quick_xml` and never aborts on a syntax problem: bad
//! end tags are reconciled against the open-element stack, unclosed elements
//! are closed at end of input, and every repair is recorded as a
//! [`ParseWarning::MalformedInput`]. The in-memory parsers feed these events
//! into a [`TreeBuilder`]; the streaming parsers consume them directly.

use crate::error::{ParseError, ParseWarning};
use ego_tree::{NodeId, NodeRef, Tree};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{HashMap, VecDeque};
use std::io::BufRead;

const MAX_SYNTAX_ERRORS: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaxEvent {
    Open {
        tag_name: String,
        attrs: HashMap<String, String>,
    },
    Close {
        tag_name: String,
    },
    Text(String),
}

enum RawEvent {
    Start {
        tag_name: String,
        attrs: HashMap<String, String>,
        empty: bool,
    },
    End(String),
    Text { text: String, lossy: bool },
    Eof,
    Error(String),
    Io(std::io::Error),
    Skip,
}

pub struct SaxReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open: Vec<String>,
    pending: VecDeque<SaxEvent>,
    warnings: Vec<ParseWarning>,
    saw_root: bool,
    trailing_depth: usize,
    done: bool,
    error_count: usize,
    last_error_position: Option<u64>,
}

impl<R: BufRead> SaxReader<R> {
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        Self {
            reader,
            buf: Vec::new(),
            open: Vec::new(),
            pending: VecDeque::new(),
            warnings: Vec::new(),
            saw_root: false,
            trailing_depth: 0,
            done: false,
            error_count: 0,
            last_error_position: None,
        }
    }

    pub fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    pub fn take_warnings(&mut self) -> Vec<ParseWarning> {
        std::mem::take(&mut self.warnings)
    }

    fn warn(&mut self, message: String) {
        let position = self.position();
        self.warnings
            .push(ParseWarning::MalformedInput { position, message });
    }

    fn read_raw(&mut self) -> RawEvent {
        self.buf.clear();
        match self.reader.read_event_into(&mut self.buf) {
            Ok(Event::Start(ref e)) => RawEvent::Start {
                tag_name: local_name(e),
                attrs: extract_attrs(e),
                empty: false,
            },
            Ok(Event::Empty(ref e)) => RawEvent::Start {
                tag_name: local_name(e),
                attrs: extract_attrs(e),
                empty: true,
            },
            Ok(Event::End(ref e)) => {
                RawEvent::End(String::from_utf8_lossy(e.local_name().as_ref()).to_string())
            }
            Ok(Event::Text(ref e)) => match e.unescape() {
                Ok(text) => RawEvent::Text {
                    text: text.to_string(),
                    lossy: false,
                },
                Err(_) => RawEvent::Text {
                    text: String::from_utf8_lossy(e).to_string(),
                    lossy: true,
                },
            },
            Ok(Event::CData(ref e)) => RawEvent::Text {
                text: String::from_utf8_lossy(e).to_string(),
                lossy: false,
            },
            Ok(Event::Eof) => RawEvent::Eof,
            Ok(_) => RawEvent::Skip,
            Err(quick_xml::Error::Io(err)) => {
                RawEvent::Io(std::io::Error::new(err.kind(), err.to_string()))
            }
            Err(err) => RawEvent::Error(err.to_string()),
        }
    }

    /// Next balanced event, or `None` once the document is exhausted.
    ///
    /// Fails only when the input holds no element at all or cannot be read.
    pub fn next_event(&mut self) -> Result<Option<SaxEvent>, ParseError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.done {
                return Ok(None);
            }
            match self.read_raw() {
                RawEvent::Start {
                    tag_name,
                    attrs,
                    empty,
                } => {
                    if self.trailing_depth > 0 {
                        if !empty {
                            self.trailing_depth += 1;
                        }
                        continue;
                    }
                    if self.saw_root && self.open.is_empty() {
                        self.warn(format!("content after document element ignored: <{tag_name}>"));
                        if !empty {
                            self.trailing_depth = 1;
                        }
                        continue;
                    }
                    self.saw_root = true;
                    if empty {
                        self.pending.push_back(SaxEvent::Close {
                            tag_name: tag_name.clone(),
                        });
                    } else {
                        self.open.push(tag_name.clone());
                    }
                    return Ok(Some(SaxEvent::Open { tag_name, attrs }));
                }
                RawEvent::End(tag_name) => {
                    if self.trailing_depth > 0 {
                        self.trailing_depth -= 1;
                        continue;
                    }
                    self.close_matching(tag_name);
                }
                RawEvent::Text { text, lossy } => {
                    if self.open.is_empty() || self.trailing_depth > 0 {
                        continue;
                    }
                    if lossy {
                        self.warn("text with unknown entity kept verbatim".to_string());
                    }
                    return Ok(Some(SaxEvent::Text(text)));
                }
                RawEvent::Eof => self.finish()?,
                RawEvent::Error(message) => {
                    let position = self.position();
                    self.error_count += 1;
                    self.warn(message);
                    let stalled = self.last_error_position == Some(position);
                    self.last_error_position = Some(position);
                    if stalled || self.error_count >= MAX_SYNTAX_ERRORS {
                        self.warn("unrecoverable syntax error, stopping early".to_string());
                        self.finish()?;
                    }
                }
                RawEvent::Io(err) => return Err(ParseError::Io(err)),
                RawEvent::Skip => {}
            }
        }
    }

    fn close_matching(&mut self, tag_name: String) {
        match self.open.iter().rposition(|open| *open == tag_name) {
            Some(idx) => {
                while self.open.len() > idx + 1 {
                    if let Some(unclosed) = self.open.pop() {
                        self.warn(format!("<{unclosed}> closed by </{tag_name}>"));
                        self.pending.push_back(SaxEvent::Close { tag_name: unclosed });
                    }
                }
                self.open.pop();
                self.pending.push_back(SaxEvent::Close { tag_name });
            }
            None => self.warn(format!("stray </{tag_name}> ignored")),
        }
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        self.done = true;
        if !self.saw_root {
            return Err(ParseError::NotWellFormed {
                message: "no root element".to_string(),
            });
        }
        while let Some(unclosed) = self.open.pop() {
            self.warn(format!("<{unclosed}> not closed before end of input"));
            self.pending.push_back(SaxEvent::Close { tag_name: unclosed });
        }
        Ok(())
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn extract_attrs(e: &BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = match attr.unescape_value() {
            Ok(value) => value.to_string(),
            Err(_) => String::from_utf8_lossy(&attr.value).to_string(),
        };
        attrs.insert(key, value);
    }
    attrs
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: HashMap<String, String>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        attr_value(&self.attrs, name)
    }

    pub fn element_id(&self) -> Option<&str> {
        element_id_of(&self.attrs)
    }
}

/// Non-blank attribute value.
pub fn attr_value<'a>(attrs: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    attrs
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

/// `eId`, falling back to `id`.
pub fn element_id_of(attrs: &HashMap<String, String>) -> Option<&str> {
    attr_value(attrs, "eId").or_else(|| attr_value(attrs, "id"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Document,
    Element(Element),
    Text(String),
}

impl XmlNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            XmlNode::Element(el) => Some(el),
            _ => None,
        }
    }
}

pub struct TreeBuilder {
    tree: Tree<XmlNode>,
    stack: Vec<NodeId>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let tree = Tree::new(XmlNode::Document);
        let root = tree.root().id();
        Self {
            tree,
            stack: vec![root],
        }
    }

    pub fn open(&mut self, tag_name: String, attrs: HashMap<String, String>) {
        let Some(parent_id) = self.stack.last().copied() else {
            return;
        };
        if let Some(mut parent) = self.tree.get_mut(parent_id) {
            let child = parent.append(XmlNode::Element(Element {
                tag: tag_name,
                attrs,
            }));
            self.stack.push(child.id());
        }
    }

    pub fn text(&mut self, text: &str) {
        let Some(parent_id) = self.stack.last().copied() else {
            return;
        };
        let Some(mut parent) = self.tree.get_mut(parent_id) else {
            return;
        };
        if let Some(mut last) = parent.last_child() {
            if let XmlNode::Text(existing) = last.value() {
                existing.push_str(text);
                return;
            }
        }
        parent.append(XmlNode::Text(text.to_string()));
    }

    pub fn close(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Number of elements currently open.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn apply(&mut self, event: SaxEvent) {
        match event {
            SaxEvent::Open { tag_name, attrs } => self.open(tag_name, attrs),
            SaxEvent::Close { .. } => self.close(),
            SaxEvent::Text(text) => self.text(&text),
        }
    }

    pub fn finish(self) -> Tree<XmlNode> {
        self.tree
    }
}

/// Read a whole document into a tree, recovering where possible.
pub fn parse_tree<R: BufRead>(input: R) -> Result<(Tree<XmlNode>, Vec<ParseWarning>), ParseError> {
    let mut reader = SaxReader::new(input);
    let mut builder = TreeBuilder::new();
    while let Some(event) = reader.next_event()? {
        builder.apply(event);
    }
    Ok((builder.finish(), reader.take_warnings()))
}

pub fn root_element(tree: &Tree<XmlNode>) -> Option<NodeRef<'_, XmlNode>> {
    tree.root()
        .children()
        .find(|child| child.value().as_element().is_some())
}

pub fn child_elements<'a>(
    node: NodeRef<'a, XmlNode>,
) -> impl Iterator<Item = (NodeRef<'a, XmlNode>, &'a Element)> {
    node.children()
        .filter_map(|child| child.value().as_element().map(|el| (child, el)))
}

pub fn first_child_element<'a>(node: NodeRef<'a, XmlNode>, tag: &str) -> Option<NodeRef<'a, XmlNode>> {
    child_elements(node)
        .find(|(_, el)| el.tag == tag)
        .map(|(child, _)| child)
}
