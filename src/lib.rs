//! Relation annotation between pairs of text segments: segment loading,
//! candidate pair enumeration, cursor navigation, label write-back and
//! completion tracking.

pub mod cli;
pub mod config;
pub mod cursor;
pub mod document;
pub mod error;
pub mod logging;
pub mod model;
pub mod monitoring;
pub mod pairs;
pub mod progress;
pub mod project;
pub mod relations;
pub mod segments;
pub mod session;
pub mod writer;

pub use config::EditorConfig;
pub use document::{AnnotationStore, DocumentAccessor, DocumentProvider, JsonDocument};
pub use error::{EditorError, EditorResult};
pub use session::EditorSession;
