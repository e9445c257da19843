//! Named macro persistence
//!
//! A store directory holds `index.json` - the ordered registry of
//! display name to macro id - and one `<id>.json` timeline per macro.
//! Insertion order is display order, so the index persists as a JSON
//! array. Every mutation rewrites the index immediately; there is no
//! batching to lose on a crash.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use mimeo_core::events::Timeline;
use mimeo_core::{Error, Result};

const INDEX_FILE: &str = "index.json";

/// Opaque identifier a macro's timeline is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroId(String);

impl MacroId {
    fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MacroId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    name: String,
    id: MacroId,
}

pub struct MacroStore {
    dir: PathBuf,
    index: Mutex<Vec<IndexEntry>>,
}

impl MacroStore {
    /// Opens `~/.mimeo`, creating it on first use.
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "home directory not found",
            ))
        })?;
        Self::open(home.join(".mimeo"))
    }

    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let index_path = dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            let data = fs::read_to_string(&index_path)?;
            match serde_json::from_str(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("macro index at {} is unreadable, starting empty: {e}", index_path.display());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            dir,
            index: Mutex::new(index),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Macro names in display (insertion) order.
    pub fn names(&self) -> Vec<String> {
        self.index.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub fn id_of(&self, name: &str) -> Option<MacroId> {
        self.index
            .lock()
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.id.clone())
    }

    /// Writes the timeline under `name`, minting an id for a new name
    /// and reusing the existing one otherwise. The index is persisted
    /// before returning.
    pub fn save(&self, name: &str, timeline: &Timeline) -> Result<MacroId> {
        let mut index = self.index.lock();
        let id = match index.iter().find(|e| e.name == name) {
            Some(entry) => entry.id.clone(),
            None => {
                let id = MacroId::random();
                index.push(IndexEntry {
                    name: name.to_string(),
                    id: id.clone(),
                });
                id
            }
        };

        let file = File::create(self.timeline_path(&id))?;
        serde_json::to_writer_pretty(BufWriter::new(file), timeline)?;
        self.persist_index(&index)?;
        Ok(id)
    }

    /// Loads a macro's timeline. Unreadable data is
    /// [`Error::TimelineLoad`]; an unregistered name is
    /// [`Error::UnknownMacro`].
    pub fn load(&self, name: &str) -> Result<Timeline> {
        let id = self
            .id_of(name)
            .ok_or_else(|| Error::UnknownMacro(name.to_string()))?;
        let path = self.timeline_path(&id);
        let data = fs::read_to_string(&path).map_err(|e| Error::TimelineLoad {
            reason: format!("{}: {e}", path.display()),
        })?;
        serde_json::from_str(&data).map_err(|e| Error::TimelineLoad {
            reason: format!("{}: {e}", path.display()),
        })
    }

    /// Like [`MacroStore::load`], but malformed data degrades to an
    /// empty (unplayable) timeline with a warning instead of an error.
    pub fn load_or_empty(&self, name: &str) -> Result<Timeline> {
        match self.load(name) {
            Err(Error::TimelineLoad { reason }) => {
                warn!("macro '{name}' is unreadable, treating as empty: {reason}");
                Ok(Timeline::new())
            }
            other => other,
        }
    }

    /// Renames a macro, keeping its display position and id.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut index = self.index.lock();
        if index.iter().any(|e| e.name == to) {
            return Err(Error::DuplicateName(to.to_string()));
        }
        let entry = index
            .iter_mut()
            .find(|e| e.name == from)
            .ok_or_else(|| Error::UnknownMacro(from.to_string()))?;
        entry.name = to.to_string();
        self.persist_index(&index)
    }

    /// Removes a macro and its timeline file.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut index = self.index.lock();
        let pos = index
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| Error::UnknownMacro(name.to_string()))?;
        let entry = index.remove(pos);

        match fs::remove_file(self.timeline_path(&entry.id)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        self.persist_index(&index)
    }

    fn persist_index(&self, index: &[IndexEntry]) -> Result<()> {
        let file = File::create(self.dir.join(INDEX_FILE))?;
        serde_json::to_writer_pretty(BufWriter::new(file), index)?;
        Ok(())
    }

    fn timeline_path(&self, id: &MacroId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimeo_core::events::EventKind;

    fn sample() -> Timeline {
        let mut timeline = Timeline::new();
        timeline.push(0.0, EventKind::Move { x: 1, y: 2 });
        timeline.push(0.5, EventKind::Move { x: 3, y: 4 });
        timeline
    }

    #[test]
    fn save_and_load_are_symmetric() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::open(dir.path()).unwrap();

        let timeline = sample();
        let id = store.save("demo", &timeline).unwrap();
        assert_eq!(store.id_of("demo"), Some(id));
        assert_eq!(store.load("demo").unwrap(), timeline);
    }

    #[test]
    fn saving_an_existing_name_reuses_its_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::open(dir.path()).unwrap();

        let first = store.save("demo", &sample()).unwrap();
        let second = store.save("demo", &Timeline::new()).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.names(), vec!["demo"]);
    }

    #[test]
    fn mutations_persist_immediately_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = MacroStore::open(dir.path()).unwrap();
            store.save("first", &sample()).unwrap();
            store.save("second", &sample()).unwrap();
        }
        let store = MacroStore::open(dir.path()).unwrap();
        assert_eq!(store.names(), vec!["first", "second"]);
        assert_eq!(store.load("second").unwrap(), sample());
    }

    #[test]
    fn rename_keeps_display_order_and_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::open(dir.path()).unwrap();
        store.save("a", &sample()).unwrap();
        let id = store.save("b", &sample()).unwrap();
        store.save("c", &sample()).unwrap();

        store.rename("b", "renamed").unwrap();
        assert_eq!(store.names(), vec!["a", "renamed", "c"]);
        assert_eq!(store.id_of("renamed"), Some(id));

        assert!(matches!(
            store.rename("missing", "x"),
            Err(Error::UnknownMacro(_))
        ));
        assert!(matches!(
            store.rename("a", "c"),
            Err(Error::DuplicateName(_))
        ));
    }

    #[test]
    fn delete_removes_the_entry_and_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::open(dir.path()).unwrap();
        let id = store.save("doomed", &sample()).unwrap();
        let path = dir.path().join(format!("{}.json", id.as_str()));
        assert!(path.exists());

        store.delete("doomed").unwrap();
        assert!(!path.exists());
        assert!(store.names().is_empty());
        assert!(matches!(store.load("doomed"), Err(Error::UnknownMacro(_))));
    }

    #[test]
    fn unknown_macros_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::open(dir.path()).unwrap();
        assert!(matches!(store.load("nope"), Err(Error::UnknownMacro(_))));
        assert!(matches!(store.delete("nope"), Err(Error::UnknownMacro(_))));
    }

    #[test]
    fn malformed_timelines_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::open(dir.path()).unwrap();
        let id = store.save("broken", &sample()).unwrap();
        fs::write(dir.path().join(format!("{}.json", id.as_str())), "not json").unwrap();

        assert!(matches!(
            store.load("broken"),
            Err(Error::TimelineLoad { .. })
        ));
        assert!(store.load_or_empty("broken").unwrap().is_empty());
        // unknown names still surface as errors
        assert!(store.load_or_empty("nope").is_err());
    }

    #[test]
    fn malformed_index_starts_empty_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(INDEX_FILE), "{{{{").unwrap();
        let store = MacroStore::open(dir.path()).unwrap();
        assert!(store.names().is_empty());
    }

    #[test]
    fn index_file_is_an_ordered_array_of_name_id_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let store = MacroStore::open(dir.path()).unwrap();
        store.save("one", &sample()).unwrap();
        store.save("two", &sample()).unwrap();

        let raw = fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let list = value.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["name"], "one");
        assert!(list[1]["id"].is_string());
    }
}
