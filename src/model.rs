use serde::{Deserialize, Serialize};
use std::fmt;

/// Label meaning "explicitly marked as having no relation"
pub const UNSET_TAG: &str = "unset";

/// Opaque identifier handed out by the annotation store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Character offsets of an annotation. Two annotations denote the same
/// segment when their spans are equal, whatever object they were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    pub fn covers(&self, other: &Span) -> bool {
        self.begin <= other.begin && other.end <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub url: Option<String>,
    pub doc_id: Option<String>,
}

/// A sentence-like unit of the document shown on one side of the editor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub span: Span,
    pub text: String,
    #[serde(default)]
    pub metadata: SegmentMetadata,
}

impl Segment {
    pub fn new(begin: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            span: Span::new(begin, end),
            text: text.into(),
            metadata: SegmentMetadata::default(),
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.span == other.span
    }
}

impl Eq for Segment {}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn unset() -> Self {
        Self::new(UNSET_TAG)
    }

    pub fn is_unset(&self) -> bool {
        self.name == UNSET_TAG
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// True when a persisted label says something about the pair: not empty and
/// not the sentinel.
pub fn is_informative_label(label: Option<&str>) -> bool {
    matches!(label, Some(l) if !l.is_empty() && l != UNSET_TAG)
}

/// The configured tag list of the relation layer's label feature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagSet {
    pub name: String,
    pub tags: Vec<Tag>,
}

impl TagSet {
    pub fn new(name: impl Into<String>, tags: Vec<Tag>) -> Self {
        Self {
            name: name.into(),
            tags,
        }
    }

    pub fn find(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    /// Make sure the sentinel can be chosen from the dropdowns.
    pub fn with_sentinel(mut self) -> Self {
        if self.find(UNSET_TAG).is_none() {
            self.tags.push(Tag::unset());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// A persisted directed edge between two segment spans.
/// `dependent` is the target of the arrow, `governor` its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationAnnotation {
    pub id: AnnotationId,
    pub dependent: Span,
    pub governor: Span,
    pub label: Option<String>,
}

impl RelationAnnotation {
    pub fn has_informative_label(&self) -> bool {
        is_informative_label(self.label.as_deref())
    }
}
