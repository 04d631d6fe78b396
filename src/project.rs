use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EditorError, EditorResult};

/// Annotation project: the source documents and every user's annotation
/// document over them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_documents: Vec<SourceDocument>,
    pub annotation_documents: Vec<AnnotationDocument>,
    #[serde(skip)]
    pub project_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub name: String,
    pub added_at: DateTime<Utc>,
}

/// One user's copy of a source document, matched to it by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    pub name: String,
    pub user: String,
    pub state: AnnotationDocumentState,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationDocumentState {
    New,
    InProgress,
    Finished,
    Ignore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total_documents: usize,
    pub annotation_documents: usize,
    pub finished: usize,
    pub in_progress: usize,
    pub new: usize,
    pub ignored: usize,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            created_at: now,
            updated_at: now,
            source_documents: Vec::new(),
            annotation_documents: Vec::new(),
            project_path: None,
        }
    }

    /// Add a source document; returns false if one with that name exists.
    pub fn add_source_document(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.source_document(&name).is_some() {
            return false;
        }
        let now = Utc::now();
        self.source_documents.push(SourceDocument {
            name,
            added_at: now,
        });
        self.updated_at = now;
        true
    }

    pub fn source_document(&self, name: &str) -> Option<&SourceDocument> {
        self.source_documents.iter().find(|d| d.name == name)
    }

    /// Set `user`'s state for `document`, creating the annotation document
    /// on first use.
    pub fn record_state(&mut self, document: &str, user: &str, state: AnnotationDocumentState) {
        let now = Utc::now();
        match self
            .annotation_documents
            .iter_mut()
            .find(|a| a.name == document && a.user == user)
        {
            Some(existing) => {
                existing.state = state;
                existing.updated = now;
            }
            None => self.annotation_documents.push(AnnotationDocument {
                name: document.to_string(),
                user: user.to_string(),
                state,
                updated: now,
            }),
        }
        self.updated_at = now;
    }

    pub fn annotation_documents_for<'a>(
        &'a self,
        document: &'a str,
    ) -> impl Iterator<Item = &'a AnnotationDocument> + 'a {
        self.annotation_documents
            .iter()
            .filter(move |a| a.name == document)
    }

    fn users_in_state(&self, document: &str, state: AnnotationDocumentState) -> Vec<String> {
        self.annotation_documents_for(document)
            .filter(|a| a.state == state)
            .map(|a| a.user.clone())
            .collect()
    }

    pub fn users_finished_for_document(&self, document: &str) -> Vec<String> {
        self.users_in_state(document, AnnotationDocumentState::Finished)
    }

    pub fn users_in_progress_for_document(&self, document: &str) -> Vec<String> {
        self.users_in_state(document, AnnotationDocumentState::InProgress)
    }

    pub fn get_stats(&self) -> ProjectStats {
        let count = |state: AnnotationDocumentState| {
            self.annotation_documents
                .iter()
                .filter(|a| a.state == state)
                .count()
        };

        ProjectStats {
            total_documents: self.source_documents.len(),
            annotation_documents: self.annotation_documents.len(),
            finished: count(AnnotationDocumentState::Finished),
            in_progress: count(AnnotationDocumentState::InProgress),
            new: count(AnnotationDocumentState::New),
            ignored: count(AnnotationDocumentState::Ignore),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> EditorResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?;
        std::fs::write(path, json).map_err(|e| EditorError::file_io(path.to_string_lossy(), e))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> EditorResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EditorError::file_io(path.to_string_lossy(), e))?;
        let mut project: Project = serde_json::from_str(&json).map_err(|e| {
            EditorError::document_load_with_source(
                format!("invalid project file {}", path.display()),
                e,
            )
        })?;
        project.project_path = Some(path.to_path_buf());
        Ok(project)
    }
}
