//! Drawer record persistence.
//!
//! All records live in one pretty-printed JSON file keyed by drawer id
//! (`"row-col"`). Saves replace the whole file through a temp file and a
//! rename so a crash never leaves a half-written store behind.

use drawerlight_hw::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Contents of one drawer.
///
/// Unknown fields are rejected so a save never silently drops data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrawerRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub notes: String,
    pub row: u8,
    pub col: u8,
}

impl DrawerRecord {
    /// An empty record for `coord`.
    pub fn empty(coord: Coordinate) -> Self {
        Self {
            id: coord.to_string(),
            name: String::new(),
            items: Vec::new(),
            notes: String::new(),
            row: coord.row(),
            col: coord.col(),
        }
    }
}

/// Full record set keyed by drawer id.
pub type DrawerSet = BTreeMap<String, DrawerRecord>;

/// One empty record per drawer slot.
pub fn default_set() -> DrawerSet {
    Coordinate::all()
        .map(|c| (c.to_string(), DrawerRecord::empty(c)))
        .collect()
}

/// Persistence failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Drawer store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Drawer store format error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File-backed drawer store.
pub struct DrawerStore {
    path: PathBuf,
    // serializes file access; unrelated to the LED lock
    io: Mutex<()>,
}

impl DrawerStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            io: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record set.
    ///
    /// A missing or unreadable file yields [`default_set`]; startup never
    /// fails because of the store.
    pub fn load(&self) -> DrawerSet {
        let _guard = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        match self.read_file() {
            Ok(Some(set)) => set,
            Ok(None) => {
                debug!("No drawer file at {:?}, using defaults", self.path);
                default_set()
            }
            Err(e) => {
                warn!("Failed to load drawers from {:?}: {}", self.path, e);
                default_set()
            }
        }
    }

    fn read_file(&self) -> Result<Option<DrawerSet>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Replaces the stored record set wholesale.
    pub fn save(&self, set: &DrawerSet) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(set)?;
        let _guard = self.io.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, content)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!("Saved {} drawers to {:?}", set.len(), self.path);
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Which part of a record matched a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    Name,
    Item,
    Notes,
}

/// One matching piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    #[serde(rename = "type")]
    pub field: MatchField,
    pub text: String,
}

/// A drawer with at least one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub row: u8,
    pub col: u8,
    pub matches: Vec<Match>,
}

/// Case-insensitive substring search over names, items and notes.
///
/// An empty (or all-whitespace) query matches nothing.
pub fn search(set: &DrawerSet, query: &str) -> Vec<SearchHit> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    let hit = |text: &str| text.to_lowercase().contains(&query);

    set.values()
        .filter_map(|drawer| {
            let mut matches = Vec::new();
            if hit(&drawer.name) {
                matches.push(Match {
                    field: MatchField::Name,
                    text: drawer.name.clone(),
                });
            }
            for item in drawer.items.iter().filter(|i| hit(i)) {
                matches.push(Match {
                    field: MatchField::Item,
                    text: item.clone(),
                });
            }
            if hit(&drawer.notes) {
                matches.push(Match {
                    field: MatchField::Notes,
                    text: drawer.notes.clone(),
                });
            }

            (!matches.is_empty()).then(|| SearchHit {
                id: drawer.id.clone(),
                name: drawer.name.clone(),
                row: drawer.row,
                col: drawer.col,
                matches,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leds() -> DrawerRecord {
        DrawerRecord {
            id: "1-1".to_string(),
            name: "LEDs".to_string(),
            items: vec!["red 5mm x20".to_string()],
            notes: String::new(),
            row: 1,
            col: 1,
        }
    }

    #[test]
    fn test_load_without_file_gives_defaults() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = DrawerStore::new(dir.path().join("drawers.json"));
        let set = store.load();
        assert_eq!(set.len(), 32);
        assert_eq!(set["8-4"], DrawerRecord::empty("8-4".parse().unwrap()));
        assert!(set.values().all(|d| d.name.is_empty() && d.items.is_empty()));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = DrawerStore::new(dir.path().join("drawers.json"));
        let mut set = DrawerSet::new();
        set.insert("1-1".to_string(), leds());

        store.save(&set).unwrap();
        assert_eq!(store.load(), set);
        assert!(!dir.path().join("drawers.json.tmp").exists());
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = DrawerStore::new(dir.path().join("nested/drawers.json"));
        store.save(&default_set()).unwrap();

        let mut set = DrawerSet::new();
        set.insert("1-1".to_string(), leds());
        store.save(&set).unwrap();
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("drawers.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(DrawerStore::new(&path).load(), default_set());
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        // a directory where the file should be
        let path = dir.path().join("drawers.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();
        assert!(DrawerStore::new(&path).save(&default_set()).is_err());
    }

    #[test]
    fn test_search_fields() {
        let mut set = default_set();
        set.insert("1-1".to_string(), leds());
        let mut caps = DrawerRecord::empty("2-3".parse().unwrap());
        caps.name = "Capacitors".to_string();
        caps.notes = "no red ones".to_string();
        set.insert("2-3".to_string(), caps);

        let hits = search(&set, "  RED ");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "1-1");
        assert_eq!(hits[0].matches[0].field, MatchField::Item);
        assert_eq!(hits[1].id, "2-3");
        assert_eq!(hits[1].matches[0].field, MatchField::Notes);

        assert!(search(&set, "").is_empty());
        assert!(search(&set, "resistor").is_empty());
    }
}
