use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::config::LayerConfig;
use crate::document::AnnotationStore;
use crate::error::{EditorError, EditorResult};
use crate::model::{AnnotationId, RelationAnnotation, Span, Tag};
use crate::pairs::{Pair, PairSet};
use crate::segments::SegmentStore;

/// Outcome of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRelation {
    pub relation: AnnotationId,
    pub pair: Pair,
    pub replaced: usize,
    pub completed: bool,
}

/// Applies label decisions to the annotation store
#[derive(Debug, Clone)]
pub struct AnnotationWriter<'a> {
    layers: &'a LayerConfig,
}

impl<'a> AnnotationWriter<'a> {
    pub fn new(layers: &'a LayerConfig) -> Self {
        Self { layers }
    }

    /// Label the edge from `origin` to `target` (governor = origin,
    /// dependent = target) with `tag`, replacing whatever edge existed in
    /// that direction.
    ///
    /// On failure every change made to the store is undone before the error
    /// is returned.
    ///
    /// Completion flags change only after the store accepted every write:
    /// the sentinel clears the pair, a real tag completes it when the
    /// inverse edge already carries a real label.
    pub fn apply<S: AnnotationStore + ?Sized>(
        &self,
        store: &mut S,
        segments: &SegmentStore,
        pairs: &mut PairSet,
        tag: &Tag,
        origin: usize,
        target: usize,
    ) -> EditorResult<AppliedRelation> {
        let origin_span = segment_span(segments, origin)?;
        let target_span = segment_span(segments, target)?;
        let pair = Pair::new(origin, target)
            .ok_or_else(|| anyhow!("cannot relate segment {} to itself", origin))?;

        let relations = store.relations(&self.layers.relation_layer, &self.layers.label_feature);
        let inverse_informative = relations
            .iter()
            .rev()
            .find(|r| r.dependent == origin_span && r.governor == target_span)
            .map(|r| r.has_informative_label())
            .unwrap_or(false);
        let previous: Vec<RelationAnnotation> = relations
            .into_iter()
            .filter(|r| r.dependent == target_span && r.governor == origin_span)
            .collect();

        let mut undo = Undo::default();
        let relation = match self.edit(store, &mut undo, tag, origin_span, target_span, &previous) {
            Ok(relation) => relation,
            Err(e) => {
                self.roll_back(store, undo);
                return Err(e);
            }
        };

        if tag.is_unset() {
            pairs.mark_incomplete(pair);
        } else if !pairs.is_completed(pair) && inverse_informative {
            pairs.mark_completed(pair);
        }

        let completed = pairs.is_completed(pair);
        info!(
            %relation,
            tag = %tag,
            origin,
            target,
            replaced = previous.len(),
            completed,
            "Applied relation"
        );

        Ok(AppliedRelation {
            relation,
            pair,
            replaced: previous.len(),
            completed,
        })
    }

    // Store mutations of one apply, recorded in `undo` as they succeed.
    fn edit<S: AnnotationStore + ?Sized>(
        &self,
        store: &mut S,
        undo: &mut Undo,
        tag: &Tag,
        origin_span: Span,
        target_span: Span,
        previous: &[RelationAnnotation],
    ) -> EditorResult<AnnotationId> {
        let origin_id = self.ensure_span(store, undo, origin_span)?;
        let target_id = self.ensure_span(store, undo, target_span)?;
        undo.endpoints = Some((target_id, origin_id));

        for old in previous {
            store
                .delete(old.id)
                .map_err(|e| EditorError::persistence("delete previous relation", e))?;
            undo.removed.push(old.label.clone());
            debug!(relation = %old.id, "Removed previous relation");
        }

        let relation = store
            .add_relation(&self.layers.relation_layer, target_id, origin_id)
            .map_err(|e| EditorError::persistence("create relation annotation", e))?;
        undo.created_relation = Some(relation);
        store
            .set_feature_value(relation, &self.layers.label_feature, &tag.name)
            .map_err(|e| EditorError::persistence("set relation label", e))?;
        store
            .write()
            .map_err(|e| EditorError::persistence("write document", e))?;
        Ok(relation)
    }

    /// Undo the in-memory part of a failed apply so the store again holds
    /// what was last written.
    fn roll_back<S: AnnotationStore + ?Sized>(&self, store: &mut S, undo: Undo) {
        let mut clean = true;

        if let Some(relation) = undo.created_relation {
            if let Err(e) = store.delete(relation) {
                warn!(%relation, error = %e, "Could not remove unwritten relation");
                clean = false;
            }
        }

        if let Some((dependent, governor)) = undo.endpoints {
            for label in &undo.removed {
                let restored = store
                    .add_relation(&self.layers.relation_layer, dependent, governor)
                    .and_then(|id| match label {
                        Some(label) => store.set_feature_value(id, &self.layers.label_feature, label),
                        None => Ok(()),
                    });
                if let Err(e) = restored {
                    warn!(error = %e, "Could not restore removed relation");
                    clean = false;
                }
            }
        }

        // Restored relations point at the spans created for them.
        if undo.removed.is_empty() {
            for span in undo.created_spans.into_iter().rev() {
                if let Err(e) = store.delete(span) {
                    warn!(%span, error = %e, "Could not remove unwritten span");
                    clean = false;
                }
            }
        }

        if clean {
            debug!("Rolled back failed relation write");
        }
    }

    /// Sentence-layer span at exactly these boundaries, created on demand
    fn ensure_span<S: AnnotationStore + ?Sized>(
        &self,
        store: &mut S,
        undo: &mut Undo,
        span: Span,
    ) -> EditorResult<AnnotationId> {
        let existing = store
            .spans_covered_by(&self.layers.sentence_layer, span)
            .into_iter()
            .find(|s| s.span() == span);
        if let Some(existing) = existing {
            return Ok(existing.id);
        }

        let id = store
            .add_span(&self.layers.sentence_layer, span)
            .map_err(|e| EditorError::persistence("create span annotation", e))?;
        undo.created_spans.push(id);
        Ok(id)
    }
}

#[derive(Debug, Default)]
struct Undo {
    created_spans: Vec<AnnotationId>,
    endpoints: Option<(AnnotationId, AnnotationId)>,
    removed: Vec<Option<String>>,
    created_relation: Option<AnnotationId>,
}

fn segment_span(segments: &SegmentStore, index: usize) -> EditorResult<Span> {
    segments
        .get(index)
        .map(|s| s.span)
        .ok_or(EditorError::SegmentOutOfRange {
            index,
            len: segments.len(),
        })
}
