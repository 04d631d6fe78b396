use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{EditorError, EditorResult, ErrorContext};
use crate::model::{AnnotationId, RelationAnnotation, Span, TagSet};

/// Feature names of a relation record
pub const DEPENDENT_FEATURE: &str = "Dependent";
pub const GOVERNOR_FEATURE: &str = "Governor";

/// Failures reported by the annotation store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("annotation {0} does not exist")]
    UnknownAnnotation(AnnotationId),

    #[error("I/O error writing {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed")]
    Serialization(#[from] serde_json::Error),

    #[error("store rejected the change: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A span annotation on a named layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanAnnotation {
    pub id: AnnotationId,
    pub layer: String,
    pub begin: usize,
    pub end: usize,
    #[serde(default)]
    pub features: BTreeMap<String, String>,
}

impl SpanAnnotation {
    pub fn span(&self) -> Span {
        Span::new(self.begin, self.end)
    }

    pub fn feature(&self, name: &str) -> Option<&str> {
        self.features.get(name).map(String::as_str)
    }
}

/// A relation as the store keeps it: endpoints and label are looked up by
/// feature name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRecord {
    pub id: AnnotationId,
    pub layer: String,
    #[serde(default)]
    pub features: BTreeMap<String, serde_json::Value>,
}

impl RelationRecord {
    fn endpoint(&self, feature: &str) -> Option<AnnotationId> {
        self.features
            .get(feature)
            .and_then(|v| v.as_u64())
            .map(AnnotationId)
    }

    fn string_feature(&self, feature: &str) -> Option<String> {
        match self.features.get(feature)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSetRecord {
    pub layer: String,
    pub feature: String,
    pub tagset: TagSet,
}

/// Turn raw relation records into typed annotations. Records whose endpoints
/// do not resolve to a span are dropped.
pub fn map_relations(
    records: &[RelationRecord],
    spans: &[SpanAnnotation],
    layer: &str,
    label_feature: &str,
) -> Vec<RelationAnnotation> {
    let by_id: HashMap<AnnotationId, Span> = spans.iter().map(|s| (s.id, s.span())).collect();

    records
        .iter()
        .filter(|r| r.layer == layer)
        .filter_map(|record| {
            let dependent = record
                .endpoint(DEPENDENT_FEATURE)
                .and_then(|id| by_id.get(&id).copied());
            let governor = record
                .endpoint(GOVERNOR_FEATURE)
                .and_then(|id| by_id.get(&id).copied());

            match (dependent, governor) {
                (Some(dependent), Some(governor)) => Some(RelationAnnotation {
                    id: record.id,
                    dependent,
                    governor,
                    label: record.string_feature(label_feature),
                }),
                _ => {
                    warn!(relation = %record.id, "relation endpoint does not resolve to a span, skipping");
                    None
                }
            }
        })
        .collect()
}

/// Read access to a document and its annotation layers
pub trait DocumentAccessor {
    fn name(&self) -> &str;

    /// Source format, e.g. "xmi" or "text"
    fn format(&self) -> &str;

    fn text(&self) -> &str;

    /// Text between two character offsets
    fn covered_text(&self, span: Span) -> String {
        self.text()
            .chars()
            .skip(span.begin)
            .take(span.end.saturating_sub(span.begin))
            .collect()
    }

    /// Span annotations of `layer` in document order
    fn layer_spans(&self, layer: &str) -> Vec<SpanAnnotation>;

    /// Generic sentence-boundary annotations in document order
    fn generic_sentences(&self) -> Vec<Span>;

    /// Relation annotations of `layer` in persisted order
    fn relations(&self, layer: &str, label_feature: &str) -> Vec<RelationAnnotation>;

    fn tagset(&self, layer: &str, feature: &str) -> Option<TagSet>;
}

/// Write access. Every method either fully applies its change or returns an
/// error.
pub trait AnnotationStore: DocumentAccessor {
    fn spans_covered_by(&self, layer: &str, span: Span) -> Vec<SpanAnnotation>;

    fn add_span(&mut self, layer: &str, span: Span) -> StoreResult<AnnotationId>;

    fn add_relation(
        &mut self,
        layer: &str,
        dependent: AnnotationId,
        governor: AnnotationId,
    ) -> StoreResult<AnnotationId>;

    fn set_feature_value(&mut self, id: AnnotationId, feature: &str, value: &str) -> StoreResult<()>;

    fn delete(&mut self, id: AnnotationId) -> StoreResult<()>;

    /// Flush the document to its backing storage
    fn write(&mut self) -> StoreResult<()>;
}

/// Something that can produce a loaded document store
pub trait DocumentProvider {
    type Store: AnnotationStore;

    fn load(&self) -> EditorResult<Self::Store>;
}

/// Serde-backed annotation store, optionally bound to a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonDocument {
    pub name: String,
    pub format: String,
    pub text: String,
    #[serde(default)]
    pub sentences: Vec<Span>,
    #[serde(default)]
    pub spans: Vec<SpanAnnotation>,
    #[serde(default)]
    pub relations: Vec<RelationRecord>,
    #[serde(default)]
    pub tagsets: Vec<TagSetRecord>,
    #[serde(default)]
    next_id: u64,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl JsonDocument {
    pub fn new(name: impl Into<String>, format: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> EditorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(&format!("reading {}", path.display()))?;
        let mut doc: JsonDocument = serde_json::from_str(&content)
            .with_context(&format!("parsing {}", path.display()))?;

        let highest = doc
            .spans
            .iter()
            .map(|s| s.id.0)
            .chain(doc.relations.iter().map(|r| r.id.0))
            .max()
            .unwrap_or(0);
        doc.next_id = doc.next_id.max(highest + 1);
        doc.path = Some(path.to_path_buf());

        info!(
            document = %doc.name,
            spans = doc.spans.len(),
            relations = doc.relations.len(),
            "Loaded document"
        );
        Ok(doc)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> EditorResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| EditorError::General(anyhow::Error::new(e)))?;
        std::fs::write(path, json).map_err(|e| EditorError::file_io(path.display().to_string(), e))
    }

    pub fn bind_to(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Add a generic sentence annotation
    pub fn with_sentence(mut self, begin: usize, end: usize) -> Self {
        self.sentences.push(Span::new(begin, end));
        self
    }

    pub fn with_tagset(mut self, layer: &str, feature: &str, tagset: TagSet) -> Self {
        self.tagsets.retain(|t| !(t.layer == layer && t.feature == feature));
        self.tagsets.push(TagSetRecord {
            layer: layer.to_string(),
            feature: feature.to_string(),
            tagset,
        });
        self
    }

    /// Add a span carrying features (e.g. pre-annotated sentence metadata)
    pub fn insert_span(
        &mut self,
        layer: &str,
        span: Span,
        features: BTreeMap<String, String>,
    ) -> AnnotationId {
        let id = self.allocate_id();
        self.spans.push(SpanAnnotation {
            id,
            layer: layer.to_string(),
            begin: span.begin,
            end: span.end,
            features,
        });
        id
    }

    /// Add a labelled relation record directly, bypassing the store API
    pub fn insert_relation(
        &mut self,
        layer: &str,
        dependent: AnnotationId,
        governor: AnnotationId,
        label_feature: &str,
        label: Option<&str>,
    ) -> AnnotationId {
        let id = self.allocate_id();
        let mut features = BTreeMap::new();
        features.insert(DEPENDENT_FEATURE.to_string(), serde_json::json!(dependent.0));
        features.insert(GOVERNOR_FEATURE.to_string(), serde_json::json!(governor.0));
        if let Some(label) = label {
            features.insert(label_feature.to_string(), serde_json::json!(label));
        }
        self.relations.push(RelationRecord {
            id,
            layer: layer.to_string(),
            features,
        });
        id
    }

    fn allocate_id(&mut self) -> AnnotationId {
        self.next_id = self.next_id.max(1);
        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl DocumentAccessor for JsonDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> &str {
        &self.format
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn layer_spans(&self, layer: &str) -> Vec<SpanAnnotation> {
        let mut spans: Vec<SpanAnnotation> =
            self.spans.iter().filter(|s| s.layer == layer).cloned().collect();
        spans.sort_by_key(|s| (s.begin, std::cmp::Reverse(s.end)));
        spans
    }

    fn generic_sentences(&self) -> Vec<Span> {
        let mut sentences = self.sentences.clone();
        sentences.sort();
        sentences
    }

    fn relations(&self, layer: &str, label_feature: &str) -> Vec<RelationAnnotation> {
        map_relations(&self.relations, &self.spans, layer, label_feature)
    }

    fn tagset(&self, layer: &str, feature: &str) -> Option<TagSet> {
        self.tagsets
            .iter()
            .find(|t| t.layer == layer && t.feature == feature)
            .map(|t| t.tagset.clone())
    }
}

impl AnnotationStore for JsonDocument {
    fn spans_covered_by(&self, layer: &str, span: Span) -> Vec<SpanAnnotation> {
        self.layer_spans(layer)
            .into_iter()
            .filter(|s| span.covers(&s.span()))
            .collect()
    }

    fn add_span(&mut self, layer: &str, span: Span) -> StoreResult<AnnotationId> {
        if span.end < span.begin || span.end > self.text.chars().count() {
            return Err(StoreError::Rejected(format!(
                "span {}..{} lies outside the document",
                span.begin, span.end
            )));
        }
        let id = self.insert_span(layer, span, BTreeMap::new());
        debug!(%id, layer, begin = span.begin, end = span.end, "Created span annotation");
        Ok(id)
    }

    fn add_relation(
        &mut self,
        layer: &str,
        dependent: AnnotationId,
        governor: AnnotationId,
    ) -> StoreResult<AnnotationId> {
        for endpoint in [dependent, governor] {
            if !self.spans.iter().any(|s| s.id == endpoint) {
                return Err(StoreError::UnknownAnnotation(endpoint));
            }
        }
        let id = self.allocate_id();
        let mut features = BTreeMap::new();
        features.insert(DEPENDENT_FEATURE.to_string(), serde_json::json!(dependent.0));
        features.insert(GOVERNOR_FEATURE.to_string(), serde_json::json!(governor.0));
        self.relations.push(RelationRecord {
            id,
            layer: layer.to_string(),
            features,
        });
        debug!(%id, layer, %dependent, %governor, "Created relation annotation");
        Ok(id)
    }

    fn set_feature_value(&mut self, id: AnnotationId, feature: &str, value: &str) -> StoreResult<()> {
        if let Some(relation) = self.relations.iter_mut().find(|r| r.id == id) {
            relation
                .features
                .insert(feature.to_string(), serde_json::json!(value));
            return Ok(());
        }
        if let Some(span) = self.spans.iter_mut().find(|s| s.id == id) {
            span.features.insert(feature.to_string(), value.to_string());
            return Ok(());
        }
        Err(StoreError::UnknownAnnotation(id))
    }

    fn delete(&mut self, id: AnnotationId) -> StoreResult<()> {
        let before = self.relations.len() + self.spans.len();
        self.relations.retain(|r| r.id != id);
        self.spans.retain(|s| s.id != id);
        if self.relations.len() + self.spans.len() == before {
            return Err(StoreError::UnknownAnnotation(id));
        }
        debug!(%id, "Deleted annotation");
        Ok(())
    }

    fn write(&mut self) -> StoreResult<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Loads a [`JsonDocument`] from disk and binds it for write-back
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    pub path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentProvider for JsonFileProvider {
    type Store = JsonDocument;

    fn load(&self) -> EditorResult<JsonDocument> {
        JsonDocument::load_from_file(&self.path)
    }
}
