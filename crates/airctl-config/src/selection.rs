// ── Persisted selection ──
//
// The `{homeId, deviceId}` pair chosen last, stored as a small JSON file.
// A missing or unreadable file reads as "nothing stored".

use std::path::{Path, PathBuf};

use airctl_core::{CoreError, SelectionContext, SelectionStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ConfigError;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    home_id: Option<i64>,
    device_id: Option<i64>,
}

/// JSON file backing for [`SelectionStore`].
#[derive(Debug, Clone)]
pub struct FileSelectionStore {
    path: PathBuf,
}

impl FileSelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform data directory.
    pub fn default_location() -> Self {
        Self::new(crate::selection_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Option<SelectionContext>, ConfigError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: Record = serde_json::from_str(&raw)?;
        Ok(Some(SelectionContext::new(record.home_id, record.device_id)))
    }

    fn save(&self, selection: SelectionContext) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let record = Record {
            home_id: selection.home_id,
            device_id: selection.device_id,
        };
        std::fs::write(&self.path, serde_json::to_string(&record)?)?;
        Ok(())
    }
}

impl SelectionStore for FileSelectionStore {
    fn read(&self) -> Option<SelectionContext> {
        match self.load() {
            Ok(selection) => selection,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring stored selection");
                None
            }
        }
    }

    fn write(&self, selection: SelectionContext) -> Result<(), CoreError> {
        self.save(selection).map_err(|e| CoreError::Config {
            message: format!("failed to store selection: {e}"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_camel_case_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSelectionStore::new(dir.path().join("state").join("selection.json"));
        assert_eq!(store.read(), None);

        store
            .write(SelectionContext::new(Some(4), Some(12)))
            .unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"homeId":4,"deviceId":12}"#);
        assert_eq!(store.read(), Some(SelectionContext::new(Some(4), Some(12))));

        store.write(SelectionContext::new(Some(4), None)).unwrap();
        assert_eq!(store.read(), Some(SelectionContext::new(Some(4), None)));
    }

    #[test]
    fn garbage_reads_as_nothing_stored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(FileSelectionStore::new(path).read(), None);
    }
}
