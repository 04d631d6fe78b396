use serde::Serialize;

use crate::model::Tag;
use crate::pairs::PairSet;

/// Completion progress of the pair set. Presentation strings are derived
/// from the two counts only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressTracker {
    pub completed: usize,
    pub total: usize,
}

impl ProgressTracker {
    pub fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    pub fn from_pairs(pairs: &PairSet) -> Self {
        Self::new(pairs.completed_count(), pairs.len())
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// Whole percent, e.g. "42%"
    pub fn percent_label(&self) -> String {
        format!("{}%", (self.fraction() * 100.0).round() as u32)
    }

    /// e.g. "3/7"
    pub fn count_label(&self) -> String {
        format!("{}/{}", self.completed, self.total)
    }

    /// Inline style for a progress bar `bar_width_px` wide
    pub fn bar_style(&self, bar_width_px: u32) -> String {
        let percent = (self.fraction() * 100.0).round() as u32;
        format!("width:{}px", percent * bar_width_px / 100)
    }
}

/// CSS class marking a relation arrow that carries a tag
pub fn relation_css_class(tag: Option<&Tag>) -> &'static str {
    if tag.is_some() {
        " active"
    } else {
        ""
    }
}
