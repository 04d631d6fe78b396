use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub layers: LayerConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Span layer holding pre-annotated segments
    pub sentence_layer: String,

    /// Relation layer connecting two sentence-layer spans
    pub relation_layer: String,

    /// Feature of the relation layer carrying the tag name
    pub label_feature: String,

    /// Document formats that may carry pre-annotated segments
    pub pre_annotated_formats: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// How repeated edges for the same pair are folded when building pairs
    pub duplicate_policy: DuplicatePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Full width of the progress bar in pixels
    pub bar_width_px: u32,
}

/// Handling of legacy data holding more than one edge for the same pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Completion is decided by a pair's first edge, except that an "unset"
    /// placeholder directly followed by a real edge for the same
    /// (dependent, governor) counts as completed.
    #[default]
    Adjacent,

    /// Collapse edges by (dependent, governor); the last label wins.
    LastWriteWins,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            sentence_layer: "webanno.custom.Sentence".to_string(),
            relation_layer: "webanno.custom.SentenceRelation".to_string(),
            label_feature: "label".to_string(),
            pre_annotated_formats: vec!["xmi".to_string()],
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { bar_width_px: 200 }
    }
}

impl From<&str> for DuplicatePolicy {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "last_write_wins" | "last-write-wins" | "lww" => DuplicatePolicy::LastWriteWins,
            _ => DuplicatePolicy::Adjacent,
        }
    }
}

impl LayerConfig {
    pub fn is_pre_annotated_format(&self, format: &str) -> bool {
        let format = format.to_lowercase();
        self.pre_annotated_formats
            .iter()
            .any(|f| format.contains(&f.to_lowercase()))
    }
}

impl EditorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: EditorConfig = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    pub fn load_from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(layer) = std::env::var("RELATION_EDITOR_SENTENCE_LAYER") {
            self.layers.sentence_layer = layer;
        }

        if let Ok(layer) = std::env::var("RELATION_EDITOR_RELATION_LAYER") {
            self.layers.relation_layer = layer;
        }

        if let Ok(policy) = std::env::var("RELATION_EDITOR_DUPLICATE_POLICY") {
            self.navigation.duplicate_policy = DuplicatePolicy::from(policy.as_str());
        }

        self
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }
}
