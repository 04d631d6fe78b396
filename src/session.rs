use serde::Serialize;
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::cursor::{Direction, NavigationCursor, RelationLookup, Side};
use crate::document::{AnnotationStore, DocumentProvider};
use crate::error::{EditorError, EditorResult};
use crate::logging::PerformanceTimer;
use crate::model::{SegmentMetadata, Tag, TagSet};
use crate::pairs::{IntegrityWarning, Pair, PairSet, PairSource};
use crate::progress::{relation_css_class, ProgressTracker};
use crate::relations::{RelationIndex, ResolvedRelation};
use crate::segments::{SegmentSource, SegmentStore};
use crate::writer::{AnnotationWriter, AppliedRelation};

/// Which of the two relation dropdowns was used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationDirection {
    /// Edge from the left segment to the right one (the right dropdown)
    LeftToRight,
    /// Edge from the right segment to the left one (the left dropdown)
    RightToLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairMove {
    Next,
    Previous,
    NextIncomplete,
}

/// Everything the hosting UI renders for the current pair
#[derive(Debug, Clone, Serialize)]
pub struct EditorView {
    pub left_text: String,
    pub right_text: String,
    pub left_position: String,
    pub right_position: String,
    /// Tag of the edge pointing at the left segment
    pub left_relation: Option<Tag>,
    /// Tag of the edge pointing at the right segment
    pub right_relation: Option<Tag>,
    pub left_arrow_class: &'static str,
    pub right_arrow_class: &'static str,
    pub left_metadata: SegmentMetadata,
    pub right_metadata: SegmentMetadata,
    pub filter: Option<Tag>,
    pub pair_index: usize,
    pub pair_count: usize,
    pub progress: ProgressTracker,
    pub progress_label: String,
    pub progress_bar_style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagStatistics {
    pub tag: Tag,
    /// Pairs carrying the tag in at least one direction
    pub pairs: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsView {
    pub progress: ProgressTracker,
    pub per_tag: Vec<TagStatistics>,
}

struct SessionLookup<'a> {
    segments: &'a SegmentStore,
    index: &'a RelationIndex,
}

impl RelationLookup for SessionLookup<'_> {
    fn resolve_pair(&self, pair: Pair) -> ResolvedRelation {
        match (self.segments.get(pair.low()), self.segments.get(pair.high())) {
            (Some(low), Some(high)) => self.index.resolve(low.span, high.span),
            _ => ResolvedRelation::default(),
        }
    }
}

/// One user's editing session over one document
#[derive(Debug)]
pub struct EditorSession<S: AnnotationStore> {
    store: S,
    config: EditorConfig,
    segments: SegmentStore,
    index: RelationIndex,
    pairs: PairSet,
    cursor: NavigationCursor,
    warnings: Vec<IntegrityWarning>,
}

impl<S: AnnotationStore> EditorSession<S> {
    pub fn from_provider<P>(provider: &P, config: EditorConfig) -> EditorResult<Self>
    where
        P: DocumentProvider<Store = S>,
    {
        let store = provider.load()?;
        Self::open(store, config)
    }

    /// Build segments, relation index, pairs and the initial cursor.
    pub fn open(store: S, config: EditorConfig) -> EditorResult<Self> {
        let timer = PerformanceTimer::start(format!("open session for {}", store.name()));

        let segments = SegmentStore::load(&store, &config.layers);
        if segments.len() < 2 {
            return Err(EditorError::document_load(format!(
                "document '{}' has {} segment(s), at least two are needed",
                store.name(),
                segments.len()
            )));
        }

        let layers = &config.layers;
        let tags = store
            .tagset(&layers.relation_layer, &layers.label_feature)
            .unwrap_or_else(|| TagSet::new(layers.label_feature.clone(), Vec::new()))
            .with_sentinel();
        let relations = store.relations(&layers.relation_layer, &layers.label_feature);
        let policy = config.navigation.duplicate_policy;
        timer.checkpoint("segments and relations loaded");

        let (pairs, warnings) = match segments.source() {
            SegmentSource::PreAnnotated => {
                let (pairs, warnings) = PairSet::enumerate(&relations, &segments, policy);
                if pairs.is_empty() {
                    info!("No relations between segments yet, offering every combination");
                    let (all, _) = PairSet::enumerate_all(&relations, &segments, policy);
                    (all, warnings)
                } else {
                    (pairs, warnings)
                }
            }
            SegmentSource::Derived => PairSet::enumerate_all(&relations, &segments, policy),
        };

        let cursor = NavigationCursor::new(&pairs)
            .ok_or_else(|| EditorError::document_load("no candidate pairs"))?;
        let index = RelationIndex::build(&relations, tags);

        info!(
            document = %store.name(),
            segments = segments.len(),
            pairs = pairs.len(),
            completed = pairs.completed_count(),
            warnings = warnings.len(),
            "Editor session ready"
        );

        Ok(Self {
            store,
            config,
            segments,
            index,
            pairs,
            cursor,
            warnings,
        })
    }

    fn reindex(&mut self) {
        let layers = &self.config.layers;
        let relations = self
            .store
            .relations(&layers.relation_layer, &layers.label_feature);
        let tags = self.index.tags().clone();
        self.index = RelationIndex::build(&relations, tags);
    }

    fn tag(&self, name: &str) -> EditorResult<Tag> {
        self.index
            .tags()
            .find(name)
            .cloned()
            .ok_or_else(|| EditorError::UnknownTag {
                name: name.to_string(),
            })
    }

    /// Label the current pair in one direction.
    pub fn on_select_relation(
        &mut self,
        direction: RelationDirection,
        tag_name: &str,
    ) -> EditorResult<AppliedRelation> {
        let tag = self.tag(tag_name)?;
        let (origin, target) = match direction {
            RelationDirection::LeftToRight => (self.cursor.left(), self.cursor.right()),
            RelationDirection::RightToLeft => (self.cursor.right(), self.cursor.left()),
        };

        let writer = AnnotationWriter::new(&self.config.layers);
        let result = writer.apply(
            &mut self.store,
            &self.segments,
            &mut self.pairs,
            &tag,
            origin,
            target,
        );

        match result {
            Ok(applied) => {
                self.reindex();
                Ok(applied)
            }
            Err(err) => {
                crate::log_error!(err, "select relation");
                // Edges may have been removed before the failure.
                self.reindex();
                Err(err)
            }
        }
    }

    /// Move one side to the next or previous related segment.
    pub fn on_navigate(&mut self, side: Side, direction: Direction) -> usize {
        self.cursor.advance_segment(side, direction, &self.pairs)
    }

    pub fn on_navigate_pair(&mut self, movement: PairMove) -> Option<Pair> {
        let lookup = SessionLookup {
            segments: &self.segments,
            index: &self.index,
        };
        match movement {
            PairMove::Next => self.cursor.advance_pair(Direction::Next, &self.pairs, &lookup),
            PairMove::Previous => {
                self.cursor
                    .advance_pair(Direction::Previous, &self.pairs, &lookup)
            }
            PairMove::NextIncomplete => self.cursor.jump_to_next_incomplete(&self.pairs, &lookup),
        }
    }

    /// Restrict pair navigation to pairs carrying `tag`; `None` clears it.
    pub fn on_set_filter(&mut self, tag: Option<&str>) -> EditorResult<()> {
        let filter = tag.map(|name| self.tag(name)).transpose()?;
        self.cursor.set_filter(filter);
        Ok(())
    }

    /// Relation between two segments by index
    pub fn resolve(&self, left: usize, right: usize) -> EditorResult<ResolvedRelation> {
        let span = |index: usize| {
            self.segments
                .get(index)
                .map(|s| s.span)
                .ok_or(EditorError::SegmentOutOfRange {
                    index,
                    len: self.segments.len(),
                })
        };
        Ok(self.index.resolve(span(left)?, span(right)?))
    }

    pub fn progress(&self) -> ProgressTracker {
        ProgressTracker::from_pairs(&self.pairs)
    }

    pub fn tag_statistics(&self) -> StatisticsView {
        let lookup = SessionLookup {
            segments: &self.segments,
            index: &self.index,
        };
        let resolved: Vec<ResolvedRelation> =
            self.pairs.iter().map(|p| lookup.resolve_pair(p)).collect();

        let per_tag = self
            .index
            .tags()
            .tags
            .iter()
            .map(|tag| TagStatistics {
                tag: tag.clone(),
                pairs: resolved.iter().filter(|r| r.contains(tag)).count(),
            })
            .collect();
        debug!(pairs = resolved.len(), "Computed tag statistics");

        StatisticsView {
            progress: self.progress(),
            per_tag,
        }
    }

    pub fn view(&self) -> EditorView {
        let left = self.cursor.left();
        let right = self.cursor.right();
        let resolved = self.resolve(left, right).unwrap_or_default();
        let source = self.segments.source();
        let count = self.segments.len();
        let progress = self.progress();
        let segment = |index: usize| self.segments.get(index).cloned();

        let (left_text, left_metadata) = segment(left)
            .map(|s| (s.text, s.metadata))
            .unwrap_or_default();
        let (right_text, right_metadata) = segment(right)
            .map(|s| (s.text, s.metadata))
            .unwrap_or_default();

        EditorView {
            left_text,
            right_text,
            left_position: self
                .cursor
                .position_label(Side::Left, &self.pairs, source, count),
            right_position: self
                .cursor
                .position_label(Side::Right, &self.pairs, source, count),
            left_arrow_class: relation_css_class(resolved.right_to_left.as_ref()),
            right_arrow_class: relation_css_class(resolved.left_to_right.as_ref()),
            left_relation: resolved.right_to_left,
            right_relation: resolved.left_to_right,
            left_metadata,
            right_metadata,
            filter: self.cursor.filter().cloned(),
            pair_index: self.cursor.pair_index(),
            pair_count: self.pairs.len(),
            progress,
            progress_label: progress.percent_label(),
            progress_bar_style: progress.bar_style(self.config.progress.bar_width_px),
        }
    }

    pub fn cursor(&self) -> &NavigationCursor {
        &self.cursor
    }

    pub fn pairs(&self) -> &PairSet {
        &self.pairs
    }

    pub fn pair_source(&self) -> PairSource {
        self.pairs.source()
    }

    pub fn segments(&self) -> &SegmentStore {
        &self.segments
    }

    pub fn tags(&self) -> &TagSet {
        self.index.tags()
    }

    pub fn warnings(&self) -> &[IntegrityWarning] {
        &self.warnings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }
}
