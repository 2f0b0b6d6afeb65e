//! Persisted mapping-table storage.
//!
//! Rows live in `.calmirror/state/mappings.json` under the target
//! calendar directory. Writes go through a temp file and rename so a
//! crash never leaves a half-written table behind.

use std::path::{Path, PathBuf};

use crate::error::{CalMirrorError, CalMirrorResult};
use crate::mapping::MappingRow;

const MAPPINGS_FILE: &str = "mappings.json";

pub struct MappingStore {
    state_dir: PathBuf,
}

impl MappingStore {
    /// Store rooted at a calendar directory.
    pub fn open(calendar_dir: &Path) -> Self {
        MappingStore {
            state_dir: calendar_dir.join(".calmirror/state"),
        }
    }

    /// Load all rows. A missing file is an empty table, not an error.
    pub fn load(&self) -> CalMirrorResult<Vec<MappingRow>> {
        let path = self.state_dir.join(MAPPINGS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| CalMirrorError::Store(format!("Corrupt mapping table: {e}")))
    }

    /// Persist all rows atomically, sorted by key for deterministic output.
    pub fn save(&self, rows: &[MappingRow]) -> CalMirrorResult<()> {
        std::fs::create_dir_all(&self.state_dir)?;

        let mut sorted: Vec<&MappingRow> = rows.iter().collect();
        sorted.sort_by_key(|r| (r.sync_id.clone(), r.key()));

        let content = serde_json::to_string_pretty(&sorted)
            .map_err(|e| CalMirrorError::Serialization(e.to_string()))?;

        let path = self.state_dir.join(MAPPINGS_FILE);
        let temp = self.state_dir.join(format!("{MAPPINGS_FILE}.tmp"));
        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &path)?;
        Ok(())
    }
}
