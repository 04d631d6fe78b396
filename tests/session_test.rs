use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use relation_editor::cursor::{Direction, Side};
use relation_editor::document::{
    AnnotationStore, DocumentAccessor, JsonDocument, JsonFileProvider, SpanAnnotation, StoreError,
    StoreResult,
};
use relation_editor::model::{AnnotationId, RelationAnnotation, Span, Tag, TagSet};
use relation_editor::pairs::{IntegrityWarning, Pair, PairSource};
use relation_editor::segments::SegmentSource;
use relation_editor::session::{PairMove, RelationDirection};
use relation_editor::{EditorConfig, EditorError, EditorSession};

const SENTENCE: &str = "webanno.custom.Sentence";
const RELATION: &str = "webanno.custom.SentenceRelation";
const STORY: [&str; 3] = ["Alice left.", "Bob cried.", "It rained."];

fn tagset() -> TagSet {
    TagSet::new("label", vec![Tag::new("cause"), Tag::new("contrast")])
}

fn spans_of(sentences: &[&str]) -> (String, Vec<Span>) {
    let mut spans = Vec::new();
    let mut begin = 0;
    for sentence in sentences {
        let end = begin + sentence.chars().count();
        spans.push(Span::new(begin, end));
        begin = end + 1;
    }
    (sentences.join(" "), spans)
}

fn derived_doc(sentences: &[&str]) -> JsonDocument {
    let (text, spans) = spans_of(sentences);
    let mut doc = JsonDocument::new("story.txt", "text", text).with_tagset(RELATION, "label", tagset());
    for span in spans {
        doc = doc.with_sentence(span.begin, span.end);
    }
    doc
}

fn pre_annotated_doc(sentences: &[&str]) -> (JsonDocument, Vec<AnnotationId>) {
    let (text, spans) = spans_of(sentences);
    let mut doc = JsonDocument::new("story.xmi", "xmi", text).with_tagset(RELATION, "label", tagset());
    let ids = spans
        .into_iter()
        .map(|span| doc.insert_span(SENTENCE, span, BTreeMap::new()))
        .collect();
    (doc, ids)
}

fn pair(a: usize, b: usize) -> Pair {
    Pair::new(a, b).unwrap()
}

fn cursor_pair<S: AnnotationStore>(session: &EditorSession<S>) -> (usize, usize) {
    (session.cursor().left(), session.cursor().right())
}

#[test]
fn test_pre_annotated_without_relations_walks_all_combinations() {
    let (doc, _) = pre_annotated_doc(&STORY);
    let mut session = EditorSession::open(doc, EditorConfig::default()).unwrap();

    assert_eq!(session.segments().source(), SegmentSource::PreAnnotated);
    assert_eq!(session.pair_source(), PairSource::AllCombinations);
    let pairs: Vec<Pair> = session.pairs().iter().collect();
    assert_eq!(pairs, vec![pair(0, 1), pair(0, 2), pair(1, 2)]);

    assert_eq!(cursor_pair(&session), (0, 1));
    assert_eq!(session.on_navigate_pair(PairMove::Next), Some(pair(0, 2)));
    assert_eq!(session.on_navigate_pair(PairMove::Next), Some(pair(1, 2)));
    assert_eq!(session.on_navigate_pair(PairMove::Next), Some(pair(0, 1)));
    assert_eq!(cursor_pair(&session), (0, 1));
}

#[test]
fn test_back_and_forth_returns_to_original_pair() {
    let sentences = ["One.", "Two.", "Three.", "Four.", "Five."];
    let mut session = EditorSession::open(derived_doc(&sentences), EditorConfig::default()).unwrap();
    session.on_navigate_pair(PairMove::Next);
    let start = session.cursor().clone();

    for _ in 0..sentences.len() {
        let landed = session.on_navigate_pair(PairMove::Next).unwrap();
        assert_ne!(landed.low(), landed.high());
        assert_ne!(session.cursor().left(), session.cursor().right());
    }
    for _ in 0..sentences.len() {
        session.on_navigate_pair(PairMove::Previous).unwrap();
        assert_ne!(session.cursor().left(), session.cursor().right());
    }
    assert_eq!(session.cursor(), &start);
}

#[test]
fn test_filter_without_match_terminates_in_place() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    session.on_navigate_pair(PairMove::Next);
    session.on_set_filter(Some("contrast")).unwrap();

    let before = session.cursor().pair_index();
    assert_eq!(session.on_navigate_pair(PairMove::Next), Some(pair(0, 2)));
    assert_eq!(session.cursor().pair_index(), before);
}

#[test]
fn test_filter_lands_only_on_matching_pairs() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    session.on_navigate_pair(PairMove::Next);
    session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();
    session.on_navigate_pair(PairMove::Previous);
    assert_eq!(cursor_pair(&session), (0, 1));

    session.on_set_filter(Some("cause")).unwrap();
    assert_eq!(session.on_navigate_pair(PairMove::Next), Some(pair(0, 2)));
    assert_eq!(session.on_navigate_pair(PairMove::Next), Some(pair(0, 2)));
    assert_eq!(session.on_navigate_pair(PairMove::Previous), Some(pair(0, 2)));

    session.on_set_filter(None).unwrap();
    assert_eq!(session.on_navigate_pair(PairMove::Next), Some(pair(1, 2)));
}

#[test]
fn test_unknown_filter_tag_is_rejected() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    let err = session.on_set_filter(Some("sarcasm")).unwrap_err();
    assert!(matches!(err, EditorError::UnknownTag { ref name } if name == "sarcasm"));
    assert!(session.cursor().filter().is_none());
}

#[test]
fn test_applied_tag_resolves_in_its_direction() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();

    session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();
    let resolved = session.resolve(0, 1).unwrap();
    assert_eq!(resolved.left_to_right, Some(Tag::new("cause")));
    assert_eq!(resolved.right_to_left, None);

    session
        .on_select_relation(RelationDirection::RightToLeft, "contrast")
        .unwrap();
    let resolved = session.resolve(0, 1).unwrap();
    assert_eq!(resolved.right_to_left, Some(Tag::new("contrast")));
    assert_eq!(resolved.left_to_right, Some(Tag::new("cause")));

    let view = session.view();
    assert_eq!(view.right_relation, Some(Tag::new("cause")));
    assert_eq!(view.left_relation, Some(Tag::new("contrast")));
    assert_eq!(view.left_arrow_class, " active");

    let relations = session.store().relations(RELATION, "label");
    assert_eq!(relations.len(), 2);
    let left_to_right = relations
        .iter()
        .find(|r| r.label.as_deref() == Some("cause"))
        .unwrap();
    assert_eq!(left_to_right.governor, session.segments().get(0).unwrap().span);
    assert_eq!(left_to_right.dependent, session.segments().get(1).unwrap().span);
}

#[test]
fn test_reapplying_a_direction_replaces_the_edge() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();
    let applied = session
        .on_select_relation(RelationDirection::LeftToRight, "contrast")
        .unwrap();

    assert_eq!(applied.replaced, 1);
    assert_eq!(session.store().relations(RELATION, "label").len(), 1);
    assert_eq!(session.store().layer_spans(SENTENCE).len(), 2);
    assert_eq!(
        session.resolve(0, 1).unwrap().left_to_right,
        Some(Tag::new("contrast"))
    );
}

#[test]
fn test_unset_removes_completion_and_lowers_progress() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();
    let applied = session
        .on_select_relation(RelationDirection::RightToLeft, "contrast")
        .unwrap();
    assert!(applied.completed);

    let before = session.progress();
    assert_eq!(before.count_label(), "1/3");
    assert_eq!(session.view().progress_label, "33%");

    session
        .on_select_relation(RelationDirection::RightToLeft, "unset")
        .unwrap();
    let after = session.progress();
    assert_eq!(after.completed, 0);
    assert!(after.fraction() < before.fraction());
    assert_eq!(session.view().progress_bar_style, "width:0px");
}

#[test]
fn test_unset_on_the_other_direction_leaves_pair_incomplete() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();

    let first = session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();
    assert!(!first.completed);

    let second = session
        .on_select_relation(RelationDirection::RightToLeft, "unset")
        .unwrap();
    assert!(!second.completed);
    assert!(!session.pairs().is_completed(pair(0, 1)));
    assert_eq!(session.progress().completed, 0);
    assert_eq!(
        session.resolve(0, 1).unwrap().left_to_right,
        Some(Tag::new("cause"))
    );
}

#[test]
fn test_next_incomplete_is_idempotent_when_everything_is_done() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    for _ in 0..3 {
        session
            .on_select_relation(RelationDirection::LeftToRight, "cause")
            .unwrap();
        session
            .on_select_relation(RelationDirection::RightToLeft, "cause")
            .unwrap();
        session.on_navigate_pair(PairMove::Next);
    }
    assert!(session.pairs().is_fully_completed());
    assert_eq!(session.progress().fraction(), 1.0);

    let before = session.cursor().clone();
    let current = before.pair();
    assert_eq!(session.on_navigate_pair(PairMove::NextIncomplete), current);
    assert_eq!(session.on_navigate_pair(PairMove::NextIncomplete), current);
    assert_eq!(session.cursor(), &before);
}

#[test]
fn test_next_incomplete_skips_completed_pairs() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    session.on_navigate_pair(PairMove::Next);
    session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();
    session
        .on_select_relation(RelationDirection::RightToLeft, "contrast")
        .unwrap();
    session.on_navigate_pair(PairMove::Previous);

    assert_eq!(session.on_navigate_pair(PairMove::NextIncomplete), Some(pair(1, 2)));
}

#[test]
fn test_legacy_placeholder_pair_is_complete() {
    let (mut doc, ids) = pre_annotated_doc(&STORY);
    doc.insert_relation(RELATION, ids[1], ids[0], "label", Some("unset"));
    doc.insert_relation(RELATION, ids[1], ids[0], "label", Some("cause"));

    let session = EditorSession::open(doc, EditorConfig::default()).unwrap();
    assert_eq!(session.pair_source(), PairSource::Relations);
    let pairs: Vec<Pair> = session.pairs().iter().collect();
    assert_eq!(pairs, vec![pair(0, 1)]);
    assert!(session.pairs().is_completed(pair(0, 1)));
    assert!(matches!(
        session.warnings(),
        [IntegrityWarning::LegacyPlaceholder { .. }]
    ));
}

#[test]
fn test_pre_annotated_positions_follow_partners() {
    let (mut doc, ids) = pre_annotated_doc(&["A.", "B.", "C.", "D."]);
    doc.insert_relation(RELATION, ids[1], ids[0], "label", Some("cause"));
    doc.insert_relation(RELATION, ids[2], ids[0], "label", Some("unset"));
    doc.insert_relation(RELATION, ids[3], ids[2], "label", Some("contrast"));

    let mut session = EditorSession::open(doc, EditorConfig::default()).unwrap();
    let pairs: Vec<Pair> = session.pairs().iter().collect();
    assert_eq!(pairs, vec![pair(0, 1), pair(0, 2), pair(2, 3)]);
    assert_eq!(session.progress().count_label(), "2/3");

    // rank within {0, 1, 2}, count without the fixed segment 0
    let view = session.view();
    assert_eq!(view.right_position, "(2/2)");
    assert_eq!(view.left_position, "(1/1)");

    // right side moves among the partners of segment 0
    assert_eq!(session.on_navigate(Side::Right, Direction::Next), 2);
    assert_eq!(session.cursor().pair_index(), 1);
    assert_eq!(session.view().right_position, "(3/2)");
    assert_eq!(session.on_navigate(Side::Right, Direction::Next), 1);

    // segment 1 only pairs with 0, so the left side cannot move
    assert_eq!(session.on_navigate(Side::Left, Direction::Next), 0);
}

#[test]
fn test_derived_positions_and_texts() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    let view = session.view();
    assert_eq!(view.left_text, "Alice left.");
    assert_eq!(view.right_text, "Bob cried.");
    assert_eq!(view.left_position, "(1/3)");
    assert_eq!(view.right_position, "(2/3)");
    assert_eq!(view.pair_count, 3);

    assert_eq!(session.on_navigate(Side::Right, Direction::Next), 2);
    let view = session.view();
    assert_eq!(view.right_text, "It rained.");
    assert_eq!(view.pair_index, 1);
}

#[test]
fn test_segment_metadata_reaches_the_view() {
    let (text, spans) = spans_of(&STORY);
    let mut doc = JsonDocument::new("story.xmi", "xmi", text);
    for (i, span) in spans.into_iter().enumerate() {
        let mut features = BTreeMap::new();
        features.insert("url".to_string(), format!("https://example.org/{}", i));
        features.insert("doc_id".to_string(), format!("doc-{}", i));
        doc.insert_span(SENTENCE, span, features);
    }

    let session = EditorSession::open(doc, EditorConfig::default()).unwrap();
    let view = session.view();
    assert_eq!(view.left_metadata.url.as_deref(), Some("https://example.org/0"));
    assert_eq!(view.right_metadata.doc_id.as_deref(), Some("doc-1"));
}

#[test]
fn test_tag_statistics() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();
    session.on_navigate_pair(PairMove::Next);
    session
        .on_select_relation(RelationDirection::RightToLeft, "cause")
        .unwrap();
    session
        .on_select_relation(RelationDirection::LeftToRight, "contrast")
        .unwrap();

    let stats = session.tag_statistics();
    let count = |name: &str| {
        stats
            .per_tag
            .iter()
            .find(|s| s.tag.name == name)
            .map(|s| s.pairs)
            .unwrap()
    };
    assert_eq!(count("cause"), 2);
    assert_eq!(count("contrast"), 1);
    assert_eq!(count("unset"), 0);
    assert_eq!(stats.progress.completed, 1);
}

#[test]
fn test_too_few_segments_fail_to_load() {
    let err = EditorSession::open(derived_doc(&["Alone."]), EditorConfig::default()).unwrap_err();
    assert!(matches!(err, EditorError::DocumentLoad { .. }));
    assert!(!err.is_recoverable());
}

#[test]
fn test_missing_document_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let provider = JsonFileProvider::new(dir.path().join("missing.json"));
    let err = EditorSession::from_provider(&provider, EditorConfig::default()).unwrap_err();
    assert!(matches!(err, EditorError::DocumentLoad { .. }));
}

#[test]
fn test_writes_reach_the_backing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("story.json");
    derived_doc(&STORY).save_to_file(&path).unwrap();

    let provider = JsonFileProvider::new(&path);
    let mut session = EditorSession::from_provider(&provider, EditorConfig::default()).unwrap();
    session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();

    let reloaded = JsonDocument::load_from_file(&path).unwrap();
    let relations = reloaded.relations(RELATION, "label");
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].label.as_deref(), Some("cause"));
    assert_eq!(reloaded.layer_spans(SENTENCE).len(), 2);
}

/// Delegates to a JSON document but refuses to write while `fail` is set
struct FlakyStore {
    inner: JsonDocument,
    fail: Rc<Cell<bool>>,
}

impl DocumentAccessor for FlakyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn format(&self) -> &str {
        self.inner.format()
    }

    fn text(&self) -> &str {
        self.inner.text()
    }

    fn layer_spans(&self, layer: &str) -> Vec<SpanAnnotation> {
        self.inner.layer_spans(layer)
    }

    fn generic_sentences(&self) -> Vec<Span> {
        self.inner.generic_sentences()
    }

    fn relations(&self, layer: &str, label_feature: &str) -> Vec<RelationAnnotation> {
        self.inner.relations(layer, label_feature)
    }

    fn tagset(&self, layer: &str, feature: &str) -> Option<TagSet> {
        self.inner.tagset(layer, feature)
    }
}

impl AnnotationStore for FlakyStore {
    fn spans_covered_by(&self, layer: &str, span: Span) -> Vec<SpanAnnotation> {
        self.inner.spans_covered_by(layer, span)
    }

    fn add_span(&mut self, layer: &str, span: Span) -> StoreResult<AnnotationId> {
        self.inner.add_span(layer, span)
    }

    fn add_relation(
        &mut self,
        layer: &str,
        dependent: AnnotationId,
        governor: AnnotationId,
    ) -> StoreResult<AnnotationId> {
        self.inner.add_relation(layer, dependent, governor)
    }

    fn set_feature_value(&mut self, id: AnnotationId, feature: &str, value: &str) -> StoreResult<()> {
        self.inner.set_feature_value(id, feature, value)
    }

    fn delete(&mut self, id: AnnotationId) -> StoreResult<()> {
        self.inner.delete(id)
    }

    fn write(&mut self) -> StoreResult<()> {
        if self.fail.get() {
            return Err(StoreError::Rejected("document is locked".to_string()));
        }
        self.inner.write()
    }
}

#[test]
fn test_persistence_failure_leaves_state_unchanged() {
    let fail = Rc::new(Cell::new(false));
    let store = FlakyStore {
        inner: derived_doc(&STORY),
        fail: Rc::clone(&fail),
    };
    let mut session = EditorSession::open(store, EditorConfig::default()).unwrap();
    session
        .on_select_relation(RelationDirection::LeftToRight, "cause")
        .unwrap();

    fail.set(true);
    let cursor = session.cursor().clone();
    let resolved = session.resolve(0, 1).unwrap();
    let err = session
        .on_select_relation(RelationDirection::RightToLeft, "contrast")
        .unwrap_err();
    assert!(matches!(err, EditorError::AnnotationPersistence { .. }));
    assert!(err.is_recoverable());
    assert!(err.user_message().contains("Please try again"));
    assert_eq!(session.cursor(), &cursor);
    assert_eq!(session.progress().completed, 0);
    assert!(session.cursor().pair_index() < session.pairs().len());
    assert_eq!(session.resolve(0, 1).unwrap(), resolved);

    // a failed replacement keeps the earlier label
    assert!(session
        .on_select_relation(RelationDirection::LeftToRight, "contrast")
        .is_err());
    assert_eq!(session.resolve(0, 1).unwrap(), resolved);
    assert_eq!(session.view().right_relation, Some(Tag::new("cause")));
    assert_eq!(session.store().relations(RELATION, "label").len(), 1);

    // the unwritten label is not reachable through the filter
    session.on_set_filter(Some("contrast")).unwrap();
    assert_eq!(session.on_navigate_pair(PairMove::Next), Some(pair(0, 1)));
    assert_eq!(session.cursor().pair_index(), cursor.pair_index());
    session.on_set_filter(None).unwrap();

    fail.set(false);
    let retried = session
        .on_select_relation(RelationDirection::RightToLeft, "contrast")
        .unwrap();
    assert!(retried.completed);
    assert_eq!(session.progress().completed, 1);
}

#[test]
fn test_unknown_tag_leaves_store_untouched() {
    let mut session = EditorSession::open(derived_doc(&STORY), EditorConfig::default()).unwrap();
    let err = session
        .on_select_relation(RelationDirection::LeftToRight, "sarcasm")
        .unwrap_err();
    assert!(matches!(err, EditorError::UnknownTag { .. }));
    assert!(session.store().relations(RELATION, "label").is_empty());
    assert!(session.store().layer_spans(SENTENCE).is_empty());
}
