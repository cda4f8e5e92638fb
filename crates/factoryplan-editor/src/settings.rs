use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use factoryplan_generators::OutpostSettings;

use crate::error::EditorError;

/// Editor configuration. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub outpost: OutpostSettings,
    /// Chunks loaded along each axis from the viewpoint chunk.
    pub chunk_load_span: i64,
    /// Extra chunks kept loaded around the span before eviction.
    pub chunk_keep_margin: i64,
    pub label: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            outpost: OutpostSettings::default(),
            chunk_load_span: 10,
            chunk_keep_margin: 2,
            label: "Blueprint".to_string(),
        }
    }
}

impl EditorSettings {
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        serde_json::from_str(json).map_err(|e| EditorError::Settings(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, EditorError> {
        let json = fs::read_to_string(path)
            .map_err(|e| EditorError::Settings(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}
