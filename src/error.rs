use thiserror::Error;

use crate::document::StoreError;

/// Main error type for the relation editor
#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Document could not be loaded: {message}")]
    DocumentLoad {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Annotation could not be persisted: {operation}")]
    AnnotationPersistence {
        operation: String,
        #[source]
        source: StoreError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File I/O error: {path}")]
    FileIO {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown tag: {name}")]
    UnknownTag { name: String },

    #[error("Segment index {index} out of range ({len} segments)")]
    SegmentOutOfRange { index: usize, len: usize },

    #[error("General error: {0}")]
    General(#[from] anyhow::Error),
}

impl EditorError {
    pub fn document_load(message: impl Into<String>) -> Self {
        Self::DocumentLoad {
            message: message.into(),
            source: None,
        }
    }

    pub fn document_load_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DocumentLoad {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn persistence(operation: impl Into<String>, source: StoreError) -> Self {
        Self::AnnotationPersistence {
            operation: operation.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn file_io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileIO {
            path: path.into(),
            source,
        }
    }

    /// Whether the session can keep going after this error.
    ///
    /// Load and configuration failures happen before any usable editor state
    /// exists, so they are fatal. Everything raised by a single user action
    /// leaves the cursor and pair set untouched and may be retried.
    pub fn is_recoverable(&self) -> bool {
        match self {
            EditorError::DocumentLoad { .. } => false,
            EditorError::Configuration { .. } => false,
            EditorError::AnnotationPersistence { .. } => true,
            EditorError::UnknownTag { .. } => true,
            EditorError::SegmentOutOfRange { .. } => true,
            EditorError::FileIO { .. } => false,
            EditorError::General(_) => true,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            EditorError::DocumentLoad { message, .. } => {
                format!("Unable to load data: {}", message)
            }
            EditorError::AnnotationPersistence { operation, source } => {
                format!("Unable to {}: {}. Please try again.", operation, source)
            }
            EditorError::UnknownTag { name } => {
                format!("The tag '{}' is not part of the relation tagset.", name)
            }
            EditorError::Configuration { message } => {
                format!("Configuration problem: {}", message)
            }
            _ => "Something went wrong. Check the logs for details.".to_string(),
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;

/// Attach a context string to foreign errors raised while loading a document.
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> EditorResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context(self, context: &str) -> EditorResult<T> {
        self.map_err(|e| EditorError::document_load_with_source(context, e))
    }
}
