//! File-backed key-value store for the four record kinds.
//!
//! One JSON document holds three fixed keys; every operation is a whole-
//! document read-modify-write with an atomic rename on persist. Missing or
//! malformed stored content degrades to absent/empty with a logged warning;
//! only genuine medium failures surface as errors.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::types::{HistoryRecord, HistoryStats, PreferenceRecord, UserRecord};
use crate::error::OutfitCheckError;

pub const USER_KEY: &str = "outfitcheck_user";
pub const HISTORY_KEY: &str = "outfitcheck_history";
pub const SETTINGS_KEY: &str = "outfitcheck_settings";

/// The history collection is bounded to the newest entries; the oldest is
/// evicted on overflow.
pub const HISTORY_LIMIT: usize = 50;

/// Bumped when a record's stored shape changes; readers ignore versions they
/// don't understand instead of failing to parse.
const SCHEMA_VERSION: u64 = 1;

const STORE_FILE: &str = "records.json";

pub struct LocalRecordStore {
    path: PathBuf,
}

impl LocalRecordStore {
    /// Open the store at the platform data directory
    /// (`<data_dir>/outfitcheck/records.json`).
    pub fn open_default() -> Result<Self, OutfitCheckError> {
        let base = dirs::data_dir().ok_or_else(|| {
            OutfitCheckError::StorageUnavailable(
                "No platform data directory available".to_string(),
            )
        })?;
        Self::open(base.join("outfitcheck").join(STORE_FILE))
    }

    /// Open the store at an explicit path, creating parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, OutfitCheckError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                OutfitCheckError::StorageUnavailable(format!(
                    "Failed to create data dir: {}",
                    e
                ))
            })?;
        }
        info!("Opened record store at {}", path.display());
        Ok(Self { path })
    }

    // --- current user (single slot) ---

    pub fn put_user(&self, user: &UserRecord) -> Result<(), OutfitCheckError> {
        self.write_key(USER_KEY, user)
    }

    /// `None` means never set, cleared, or unparsable stored content.
    pub fn get_user(&self) -> Result<Option<UserRecord>, OutfitCheckError> {
        self.read_key(USER_KEY)
    }

    pub fn clear_user(&self) -> Result<(), OutfitCheckError> {
        self.remove_key(USER_KEY)
    }

    // --- check history (bounded, newest-first) ---

    /// Prepend a record, then truncate to the newest `HISTORY_LIMIT` before
    /// persisting.
    pub fn append_history(&self, record: HistoryRecord) -> Result<(), OutfitCheckError> {
        let mut history: Vec<HistoryRecord> = self.read_key(HISTORY_KEY)?.unwrap_or_default();
        history.insert(0, record);
        history.truncate(HISTORY_LIMIT);
        self.write_key(HISTORY_KEY, &history)
    }

    /// All records in stored (newest-first) order, optionally filtered to one
    /// owning user.
    pub fn list_history(
        &self,
        user_id: Option<&str>,
    ) -> Result<Vec<HistoryRecord>, OutfitCheckError> {
        let history: Vec<HistoryRecord> = self.read_key(HISTORY_KEY)?.unwrap_or_default();
        Ok(match user_id {
            Some(uid) => history.into_iter().filter(|r| r.user_id == uid).collect(),
            None => history,
        })
    }

    /// Remove the record with the given id. An absent id is a no-op.
    pub fn remove_history(&self, id: &str) -> Result<(), OutfitCheckError> {
        let mut history: Vec<HistoryRecord> = self.read_key(HISTORY_KEY)?.unwrap_or_default();
        let before = history.len();
        history.retain(|r| r.id != id);
        if history.len() == before {
            return Ok(());
        }
        self.write_key(HISTORY_KEY, &history)
    }

    pub fn clear_history(&self) -> Result<(), OutfitCheckError> {
        self.remove_key(HISTORY_KEY)
    }

    // --- preferences ---

    pub fn put_preferences(&self, prefs: &PreferenceRecord) -> Result<(), OutfitCheckError> {
        self.write_key(SETTINGS_KEY, prefs)
    }

    /// Always yields a record; the defaults stand in when never set.
    pub fn get_preferences(&self) -> Result<PreferenceRecord, OutfitCheckError> {
        Ok(self.read_key(SETTINGS_KEY)?.unwrap_or_default())
    }

    // --- derived ---

    /// Profile-view aggregates over one user's stored history.
    pub fn history_stats(&self, user_id: &str) -> Result<HistoryStats, OutfitCheckError> {
        let history = self.list_history(Some(user_id))?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in &history {
            if !record.occasion.is_empty() {
                *counts.entry(record.occasion.as_str()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let top_occasions = ranked
            .into_iter()
            .take(3)
            .map(|(occasion, _)| occasion.to_string())
            .collect();

        let scores: Vec<f32> = history.iter().filter_map(|r| r.score).collect();
        let average_score = if scores.is_empty() {
            None
        } else {
            let mean = scores.iter().sum::<f32>() / scores.len() as f32;
            Some((mean * 10.0).round() / 10.0)
        };

        Ok(HistoryStats {
            total_checks: history.len(),
            top_occasions,
            average_score,
        })
    }

    // --- document plumbing ---

    fn load_document(&self) -> Result<Map<String, Value>, OutfitCheckError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(OutfitCheckError::StorageUnavailable(format!(
                    "Failed to read store file: {}",
                    e
                )))
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => {
                warn!(
                    "Store file at {} is not a valid JSON object; treating as empty",
                    self.path.display()
                );
                Ok(Map::new())
            }
        }
    }

    fn persist_document(&self, doc: Map<String, Value>) -> Result<(), OutfitCheckError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            OutfitCheckError::StorageUnavailable(format!("Failed to create temp file: {}", e))
        })?;
        let body = serde_json::to_string_pretty(&Value::Object(doc)).map_err(|e| {
            OutfitCheckError::StorageUnavailable(format!("Failed to serialize store: {}", e))
        })?;
        tmp.write_all(body.as_bytes()).map_err(|e| {
            OutfitCheckError::StorageUnavailable(format!("Failed to write store: {}", e))
        })?;
        tmp.persist(&self.path).map_err(|e| {
            OutfitCheckError::StorageUnavailable(format!("Failed to persist store: {}", e))
        })?;
        Ok(())
    }

    /// Read one key, unwrapping the version envelope. Anything unexpected
    /// (missing key, unknown version, malformed data) degrades to `None`.
    fn read_key<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, OutfitCheckError> {
        let doc = self.load_document()?;
        let Some(entry) = doc.get(key) else {
            return Ok(None);
        };

        let version = entry.get("version").and_then(Value::as_u64);
        if version != Some(SCHEMA_VERSION) {
            warn!(
                "Unknown schema version {:?} for key '{}'; ignoring stored value",
                version, key
            );
            return Ok(None);
        }
        match entry.get("data") {
            Some(data) => match serde_json::from_value(data.clone()) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    warn!("Malformed stored record for key '{}': {}", key, e);
                    Ok(None)
                }
            },
            None => {
                warn!("Stored entry for key '{}' has no data field", key);
                Ok(None)
            }
        }
    }

    /// Write one key inside the version envelope, last write wins.
    fn write_key<T: Serialize>(&self, key: &str, value: &T) -> Result<(), OutfitCheckError> {
        let mut doc = self.load_document()?;
        let data = serde_json::to_value(value).map_err(|e| {
            OutfitCheckError::StorageUnavailable(format!(
                "Failed to serialize record for '{}': {}",
                key, e
            ))
        })?;
        doc.insert(
            key.to_string(),
            json!({ "version": SCHEMA_VERSION, "data": data }),
        );
        self.persist_document(doc)
    }

    fn remove_key(&self, key: &str) -> Result<(), OutfitCheckError> {
        let mut doc = self.load_document()?;
        if doc.remove(key).is_none() {
            return Ok(());
        }
        self.persist_document(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn create_test_store() -> (LocalRecordStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = LocalRecordStore::open(dir.path().join(STORE_FILE)).unwrap();
        (store, dir)
    }

    fn make_user(id: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            username: "casey".to_string(),
            email: "casey@example.com".to_string(),
            created_at: Utc::now(),
        }
    }

    fn make_check(id: &str, user_id: &str, occasion: &str, score: Option<f32>) -> HistoryRecord {
        HistoryRecord {
            id: id.to_string(),
            created_at: Utc::now(),
            image_ref: format!("/photos/{}.jpg", id),
            analysis: "Great color coordination.".to_string(),
            occasion: occasion.to_string(),
            score,
            user_id: user_id.to_string(),
        }
    }

    #[test]
    fn test_user_round_trip() {
        let (store, _dir) = create_test_store();
        let user = make_user("u1");

        store.put_user(&user).unwrap();
        assert_eq!(store.get_user().unwrap(), Some(user));
    }

    #[test]
    fn test_get_user_never_set() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.get_user().unwrap(), None);
    }

    #[test]
    fn test_clear_user() {
        let (store, _dir) = create_test_store();
        store.put_user(&make_user("u1")).unwrap();
        store.clear_user().unwrap();
        assert_eq!(store.get_user().unwrap(), None);

        // Clearing again is a no-op.
        store.clear_user().unwrap();
    }

    #[test]
    fn test_append_history_bounded_to_limit() {
        let (store, _dir) = create_test_store();

        for i in 0..60 {
            store
                .append_history(make_check(&i.to_string(), "u1", "casual", None))
                .unwrap();
        }

        let history = store.list_history(None).unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        // Newest first: the last append is at the front, the oldest ten were
        // evicted.
        assert_eq!(history[0].id, "59");
        assert_eq!(history[HISTORY_LIMIT - 1].id, "10");
    }

    #[test]
    fn test_list_history_filters_by_user() {
        let (store, _dir) = create_test_store();
        store.append_history(make_check("1", "u1", "casual", None)).unwrap();
        store.append_history(make_check("2", "u2", "formal", None)).unwrap();
        store.append_history(make_check("3", "u1", "work", None)).unwrap();

        let all = store.list_history(None).unwrap();
        assert_eq!(all.len(), 3);

        let mine = store.list_history(Some("u1")).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, "3");
        assert_eq!(mine[1].id, "1");
    }

    #[test]
    fn test_remove_history() {
        let (store, _dir) = create_test_store();
        store.append_history(make_check("1", "u1", "casual", None)).unwrap();
        store.append_history(make_check("2", "u1", "formal", None)).unwrap();

        store.remove_history("1").unwrap();
        let history = store.list_history(None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, "2");

        // Absent id is a no-op, not an error.
        store.remove_history("does-not-exist").unwrap();
        assert_eq!(store.list_history(None).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_history() {
        let (store, _dir) = create_test_store();
        store.append_history(make_check("1", "u1", "casual", None)).unwrap();
        store.clear_history().unwrap();
        assert!(store.list_history(None).unwrap().is_empty());
    }

    #[test]
    fn test_preferences_default_when_never_set() {
        let (store, _dir) = create_test_store();
        let prefs = store.get_preferences().unwrap();
        assert_eq!(prefs, PreferenceRecord::default());
        assert!(!prefs.dark_mode);
        assert!(prefs.notifications_enabled);
    }

    #[test]
    fn test_preferences_last_write_wins() {
        let (store, _dir) = create_test_store();

        let mut prefs = PreferenceRecord::default();
        prefs.dark_mode = true;
        prefs.favorite_occasions = vec!["formal".to_string()];
        store.put_preferences(&prefs).unwrap();

        prefs.dark_mode = false;
        prefs.favorite_occasions.push("casual".to_string());
        store.put_preferences(&prefs).unwrap();

        assert_eq!(store.get_preferences().unwrap(), prefs);
    }

    #[test]
    fn test_malformed_stored_value_degrades_to_absent() {
        let (store, dir) = create_test_store();
        let path = dir.path().join(STORE_FILE);

        fs::write(
            &path,
            r#"{"outfitcheck_user": {"version": 1, "data": {"bogus": true}}}"#,
        )
        .unwrap();
        assert_eq!(store.get_user().unwrap(), None);

        // A corrupt file as a whole also degrades, and writes recover it.
        fs::write(&path, "not json at all").unwrap();
        assert_eq!(store.get_user().unwrap(), None);
        let user = make_user("u1");
        store.put_user(&user).unwrap();
        assert_eq!(store.get_user().unwrap(), Some(user));
    }

    #[test]
    fn test_unknown_schema_version_ignored() {
        let (store, dir) = create_test_store();
        fs::write(
            dir.path().join(STORE_FILE),
            r#"{"outfitcheck_settings": {"version": 99, "data": {"dark_mode": true}}}"#,
        )
        .unwrap();

        // Unknown version reads as never-set, so the defaults apply.
        assert_eq!(store.get_preferences().unwrap(), PreferenceRecord::default());
    }

    #[test]
    fn test_keys_are_independent() {
        let (store, _dir) = create_test_store();
        let user = make_user("u1");
        store.put_user(&user).unwrap();
        store.append_history(make_check("1", "u1", "casual", None)).unwrap();

        store.clear_history().unwrap();
        assert_eq!(store.get_user().unwrap(), Some(user));
    }

    #[test]
    fn test_history_stats() {
        let (store, _dir) = create_test_store();
        store.append_history(make_check("1", "u1", "casual", Some(7.0))).unwrap();
        store.append_history(make_check("2", "u1", "casual", Some(8.0))).unwrap();
        store.append_history(make_check("3", "u1", "formal", None)).unwrap();
        store.append_history(make_check("4", "u2", "work", Some(2.0))).unwrap();

        let stats = store.history_stats("u1").unwrap();
        assert_eq!(stats.total_checks, 3);
        assert_eq!(stats.top_occasions, vec!["casual", "formal"]);
        assert_eq!(stats.average_score, Some(7.5));
    }

    #[test]
    fn test_history_stats_empty() {
        let (store, _dir) = create_test_store();
        let stats = store.history_stats("u1").unwrap();
        assert_eq!(stats.total_checks, 0);
        assert!(stats.top_occasions.is_empty());
        assert_eq!(stats.average_score, None);
    }
}
