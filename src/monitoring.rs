use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::project::Project;

/// Which users finished or are still working on one source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentCompletion {
    pub document: String,
    pub finished: Vec<String>,
    pub in_progress: Vec<String>,
}

impl DocumentCompletion {
    pub fn is_untouched(&self) -> bool {
        self.finished.is_empty() && self.in_progress.is_empty()
    }
}

/// One row per source document, in project order
pub fn completion_table(project: &Project) -> Vec<DocumentCompletion> {
    let rows: Vec<DocumentCompletion> = project
        .source_documents
        .par_iter()
        .map(|doc| DocumentCompletion {
            document: doc.name.clone(),
            finished: project.users_finished_for_document(&doc.name),
            in_progress: project.users_in_progress_for_document(&doc.name),
        })
        .collect();

    debug!(project = %project.name, rows = rows.len(), "Built completion table");
    rows
}

/// Plain-text rendering used by the `monitor` command
pub fn render_table(rows: &[DocumentCompletion]) -> String {
    let width = rows
        .iter()
        .map(|r| r.document.chars().count())
        .max()
        .unwrap_or(0)
        .max("Document".len());

    let mut out = format!("{:<width$}  {:<24}  {}\n", "Document", "Finished", "In progress");
    for row in rows {
        out.push_str(&format!(
            "{:<width$}  {:<24}  {}\n",
            row.document,
            join_or_dash(&row.finished),
            join_or_dash(&row.in_progress),
        ));
    }
    out
}

fn join_or_dash(users: &[String]) -> String {
    if users.is_empty() {
        "-".to_string()
    } else {
        users.join(", ")
    }
}
