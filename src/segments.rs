use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::config::LayerConfig;
use crate::document::DocumentAccessor;
use crate::model::{Segment, SegmentMetadata, Span};

static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?]+["')\]]*\s+"#).expect("sentence pattern is valid"));

/// Where the segments of a session came from. Decided once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSource {
    /// Spans of the dedicated sentence layer of a pre-annotated document
    PreAnnotated,
    /// Generic sentence boundaries
    Derived,
}

/// Read-only ordered segments of one document
#[derive(Debug, Clone)]
pub struct SegmentStore {
    segments: Vec<Segment>,
    source: SegmentSource,
}

impl SegmentStore {
    pub fn new(segments: Vec<Segment>, source: SegmentSource) -> Self {
        Self { segments, source }
    }

    /// Read segments from the sentence layer when the document format allows
    /// pre-annotation; fall back to generic sentences when that yields nothing.
    pub fn load(doc: &dyn DocumentAccessor, layers: &LayerConfig) -> Self {
        if layers.is_pre_annotated_format(doc.format()) {
            let segments: Vec<Segment> = doc
                .layer_spans(&layers.sentence_layer)
                .into_iter()
                .map(|span| Segment {
                    span: span.span(),
                    text: doc.covered_text(span.span()),
                    metadata: SegmentMetadata {
                        url: span.feature("url").map(str::to_string),
                        doc_id: span.feature("doc_id").map(str::to_string),
                    },
                })
                .collect();

            if !segments.is_empty() {
                info!(count = segments.len(), layer = %layers.sentence_layer, "Using pre-annotated segments");
                return Self::new(segments, SegmentSource::PreAnnotated);
            }
            info!("No pre-annotated segments found, falling back to sentence boundaries");
        }

        let mut spans = doc.generic_sentences();
        if spans.is_empty() && !doc.text().trim().is_empty() {
            spans = split_sentences(doc.text());
            debug!(count = spans.len(), "Split document text into sentences");
        }

        let segments = spans
            .into_iter()
            .map(|span| Segment {
                span,
                text: doc.covered_text(span),
                metadata: SegmentMetadata::default(),
            })
            .collect::<Vec<_>>();
        info!(count = segments.len(), "Using derived segments");
        Self::new(segments, SegmentSource::Derived)
    }

    pub fn source(&self) -> SegmentSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Index of the segment with exactly this span
    pub fn index_of(&self, span: &Span) -> Option<usize> {
        self.segments.iter().position(|s| s.span == *span)
    }
}

/// Split text at terminal punctuation followed by whitespace. Offsets are
/// character offsets with surrounding whitespace trimmed.
pub fn split_sentences(text: &str) -> Vec<Span> {
    let mut byte_spans = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        byte_spans.push((start, end));
        start = m.end();
    }
    if start < text.len() {
        byte_spans.push((start, text.len()));
    }

    byte_spans
        .into_iter()
        .filter_map(|(begin, end)| {
            let slice = &text[begin..end];
            let leading = slice.len() - slice.trim_start().len();
            let trimmed = slice.trim();
            if trimmed.is_empty() {
                return None;
            }
            let begin_byte = begin + leading;
            let end_byte = begin_byte + trimmed.len();
            Some(Span::new(
                text[..begin_byte].chars().count(),
                text[..end_byte].chars().count(),
            ))
        })
        .collect()
}
