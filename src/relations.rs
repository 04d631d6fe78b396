use std::collections::{BTreeSet, HashMap};

use crate::model::{RelationAnnotation, Span, Tag, TagSet};

/// Tags attached between two segments L and R
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRelation {
    /// Edge with dependent = L, governor = R
    pub right_to_left: Option<Tag>,
    /// Edge with dependent = R, governor = L
    pub left_to_right: Option<Tag>,
}

impl ResolvedRelation {
    /// Whether `tag` is attached in either direction
    pub fn contains(&self, tag: &Tag) -> bool {
        self.right_to_left.as_ref() == Some(tag) || self.left_to_right.as_ref() == Some(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.right_to_left.is_none() && self.left_to_right.is_none()
    }
}

/// Labels of persisted edges keyed by their (dependent, governor) spans.
///
/// When several edges share endpoints the one persisted last wins.
#[derive(Debug, Clone, Default)]
pub struct RelationIndex {
    labels: HashMap<(Span, Span), Option<String>>,
    linked: HashMap<Span, BTreeSet<Span>>,
    tags: TagSet,
}

impl RelationIndex {
    pub fn build(relations: &[RelationAnnotation], tags: TagSet) -> Self {
        let mut labels = HashMap::with_capacity(relations.len());
        let mut linked: HashMap<Span, BTreeSet<Span>> = HashMap::new();

        for relation in relations {
            labels.insert((relation.dependent, relation.governor), relation.label.clone());
            linked
                .entry(relation.dependent)
                .or_default()
                .insert(relation.governor);
            linked
                .entry(relation.governor)
                .or_default()
                .insert(relation.dependent);
        }

        Self {
            labels,
            linked,
            tags,
        }
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Raw label of the edge `dependent <- governor`, if such an edge exists
    pub fn label(&self, dependent: Span, governor: Span) -> Option<&str> {
        self.labels
            .get(&(dependent, governor))
            .and_then(|l| l.as_deref())
    }

    /// Tag of the edge `dependent <- governor`. Labels outside the tagset do
    /// not resolve.
    pub fn tag(&self, dependent: Span, governor: Span) -> Option<Tag> {
        self.label(dependent, governor)
            .and_then(|name| self.tags.find(name))
            .cloned()
    }

    pub fn resolve(&self, left: Span, right: Span) -> ResolvedRelation {
        ResolvedRelation {
            right_to_left: self.tag(left, right),
            left_to_right: self.tag(right, left),
        }
    }

    /// Segments connected to `segment` by an edge in either direction
    pub fn linked(&self, segment: Span) -> impl Iterator<Item = &Span> {
        self.linked.get(&segment).into_iter().flatten()
    }

    pub fn edge_count(&self) -> usize {
        self.labels.len()
    }
}
