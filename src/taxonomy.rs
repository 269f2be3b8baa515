use crate::error::ConfigError;
use crate::types::Dialect;
use std::collections::HashMap;

pub const STRUCTURAL_TAGS: &[&str] = &[
    "article",
    "articolo",
    "paragraph",
    "comma",
    "subparagraph",
    "clause",
    "section",
    "part",
    "chapter",
    "capo",
    "title",
    "titolo",
    "book",
    "annex",
    "allegato",
    "item",
    "point",
    "list",
];

pub const CONTAINER_TAGS: &[&str] = &[
    "akomaNtoso",
    "act",
    "body",
    "mainBody",
    "preamble",
    "preambolo",
    "preface",
    "conclusions",
    "formula",
    "citations",
    "hcontainer",
    "attachment",
    "attachments",
    "quotedStructure",
];

pub const INLINE_TAGS: &[&str] = &[
    "p",
    "content",
    "num",
    "heading",
    "subheading",
    "intro",
    "alinea",
    "letter",
    "subpoint",
    "ins",
    "del",
    "mod",
    "ref",
    "quotedText",
    "span",
    "b",
    "i",
    "u",
    "sub",
    "sup",
];

pub const METADATA_TAGS: &[&str] = &[
    "meta",
    "identification",
    "publication",
    "classification",
    "lifecycle",
    "analysis",
    "references",
    "proprietary",
    "eli",
    "rdf",
    "FRBRWork",
    "FRBRExpression",
    "FRBRManifestation",
    "FRBRthis",
    "FRBRuri",
    "FRBRalias",
    "FRBRdate",
    "FRBRauthor",
    "FRBRcountry",
    "FRBRlanguage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagClass {
    Structural,
    Container,
    Inline,
    Metadata,
    Unknown,
}

impl TagClass {
    /// Structural and container elements delimit nodes; their text never
    /// flows into the enclosing node.
    pub fn is_boundary(self) -> bool {
        matches!(self, TagClass::Structural | TagClass::Container)
    }

    pub fn emits_node(self, dialect: Dialect) -> bool {
        match self {
            TagClass::Structural => true,
            TagClass::Container => dialect == Dialect::AkomaNtoso,
            _ => false,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            TagClass::Structural => "structural",
            TagClass::Container => "container",
            TagClass::Inline => "inline",
            TagClass::Metadata => "metadata",
            TagClass::Unknown => "unknown",
        }
    }
}

/// Maps element local names to their [`TagClass`]. Anything not listed is
/// [`TagClass::Unknown`] and treated as inline for text absorption.
#[derive(Debug, Clone)]
pub struct TagTaxonomy {
    classes: HashMap<String, TagClass>,
}

impl TagTaxonomy {
    /// Build from explicit sets. A tag may appear in only one set.
    pub fn from_sets<S: AsRef<str>>(
        structural: &[S],
        container: &[S],
        inline: &[S],
        metadata: &[S],
    ) -> Result<Self, ConfigError> {
        let mut classes = HashMap::new();
        let groups = [
            (TagClass::Structural, structural),
            (TagClass::Container, container),
            (TagClass::Inline, inline),
            (TagClass::Metadata, metadata),
        ];
        for (class, tags) in groups {
            for tag in tags {
                let tag = tag.as_ref();
                if let Some(existing) = classes.insert(tag.to_string(), class) {
                    if existing != class {
                        return Err(ConfigError::OverlappingTag {
                            tag: tag.to_string(),
                            first: existing.as_str(),
                            second: class.as_str(),
                        });
                    }
                }
            }
        }
        Ok(Self { classes })
    }

    pub fn classify(&self, tag: &str) -> TagClass {
        self.classes
            .get(tag)
            .copied()
            .unwrap_or(TagClass::Unknown)
    }
}

impl Default for TagTaxonomy {
    fn default() -> Self {
        let mut classes = HashMap::new();
        let groups = [
            (TagClass::Structural, STRUCTURAL_TAGS),
            (TagClass::Container, CONTAINER_TAGS),
            (TagClass::Inline, INLINE_TAGS),
            (TagClass::Metadata, METADATA_TAGS),
        ];
        for (class, tags) in groups {
            for tag in tags {
                classes.insert((*tag).to_string(), class);
            }
        }
        Self { classes }
    }
}
