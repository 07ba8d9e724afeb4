//! Bridge between the in-memory collections and a [`KvStore`].
//!
//! Reads never fail: a missing tasks record is an empty collection, a missing
//! lists record is seeded (once) with the starter lists, and a record that
//! does not parse is copied to the recovery log and treated as empty.
//!
//! A record the backend could not read at all is *held*: it loads as empty,
//! but nothing is written over it for the rest of the session. Saves aimed at
//! a held record go to the recovery log instead. Tasks are held along with
//! lists, since their list ids cannot be checked without the lists.
//!
//! Writes never fail either; a record that cannot be saved is copied into the
//! recovery log instead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::kv::{KvStore, LISTS_KEY, TASKS_KEY};
use super::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::list::{TaskList, seed_lists};
use crate::model::task::Task;

/// Outcome of reading one record
enum Record<T> {
    Missing,
    Loaded(Vec<T>),
    Malformed,
    Unreadable,
}

/// Persistence gateway over a key-value backend
#[derive(Debug)]
pub struct Storage<S: KvStore> {
    kv: S,
    held: Vec<&'static str>,
}

impl<S: KvStore> Storage<S> {
    pub fn new(kv: S) -> Self {
        Storage {
            kv,
            held: Vec::new(),
        }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    /// Load the task record. Missing, malformed or unreadable → empty.
    pub fn load_tasks(&mut self) -> Vec<Task> {
        match self.read_record(TASKS_KEY) {
            Record::Loaded(tasks) => tasks,
            Record::Unreadable => {
                self.hold(TASKS_KEY);
                Vec::new()
            }
            Record::Missing | Record::Malformed => Vec::new(),
        }
    }

    /// Load the list record, seeding General/Work/Personal when the record
    /// has never been written.
    pub fn load_lists(&mut self, now: DateTime<Utc>) -> Vec<TaskList> {
        match self.read_record(LISTS_KEY) {
            Record::Loaded(lists) => lists,
            Record::Missing => {
                let seeded = seed_lists(now);
                self.save_lists(&seeded);
                seeded
            }
            Record::Malformed => Vec::new(),
            Record::Unreadable => {
                self.hold(LISTS_KEY);
                self.hold(TASKS_KEY);
                Vec::new()
            }
        }
    }

    /// Whether the record under `key` could not be read and is protected
    /// from being overwritten
    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains(&key)
    }

    pub fn save_tasks<'a>(&mut self, tasks: impl IntoIterator<Item = &'a Task>) {
        let tasks: Vec<&Task> = tasks.into_iter().collect();
        self.write_record(TASKS_KEY, &tasks);
    }

    pub fn save_lists<'a>(&mut self, lists: impl IntoIterator<Item = &'a TaskList>) {
        let lists: Vec<&TaskList> = lists.into_iter().collect();
        self.write_record(LISTS_KEY, &lists);
    }

    /// Send a diagnostic to this backend's recovery log
    pub fn report(&self, entry: RecoveryEntry) {
        recovery::report(self.kv.log_dir(), entry);
    }

    fn hold(&mut self, key: &'static str) {
        if !self.held.contains(&key) {
            self.held.push(key);
        }
    }

    fn read_record<T: DeserializeOwned>(&self, key: &str) -> Record<T> {
        let bytes = match self.kv.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Record::Missing,
            Err(e) => {
                self.report(
                    RecoveryEntry::new(
                        RecoveryCategory::Parse,
                        format!("{} record unreadable, left untouched", key),
                    )
                    .field("Key", key)
                    .field("Error", e.to_string()),
                );
                return Record::Unreadable;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => Record::Loaded(records),
            Err(e) => {
                self.report(
                    RecoveryEntry::new(
                        RecoveryCategory::Parse,
                        format!("{} record malformed, loaded as empty", key),
                    )
                    .field("Key", key)
                    .field("Error", e.to_string())
                    .body(String::from_utf8_lossy(&bytes)),
                );
                Record::Malformed
            }
        }
    }

    fn write_record<T: Serialize>(&mut self, key: &str, records: &T) {
        let payload = match serde_json::to_vec_pretty(records) {
            Ok(p) => p,
            Err(e) => {
                self.report(
                    RecoveryEntry::new(RecoveryCategory::Write, format!("{} record not saved", key))
                        .field("Key", key)
                        .field("Error", e.to_string()),
                );
                return;
            }
        };
        if self.is_held(key) {
            self.report(
                RecoveryEntry::new(
                    RecoveryCategory::Write,
                    format!("{} record not saved, stored copy could not be read", key),
                )
                .field("Key", key)
                .body(String::from_utf8_lossy(&payload)),
            );
            return;
        }
        if let Err(e) = self.kv.set(key, &payload) {
            self.report(
                RecoveryEntry::new(RecoveryCategory::Write, format!("{} record not saved", key))
                    .field("Key", key)
                    .field("Error", e.to_string())
                    .body(String::from_utf8_lossy(&payload)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::kv::{DirStore, MemoryStore};
    use crate::io::recovery::RecoveryLog;
    use crate::model::list::DEFAULT_LIST_ID;
    use crate::model::task::{Priority, TaskStatus};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    fn task(id: &str, due: Option<DateTime<Utc>>) -> Task {
        Task {
            id: id.into(),
            title: format!("Task {}", id),
            description: Some("details".into()),
            due_date: due,
            status: TaskStatus::Pending,
            priority: Priority::Low,
            list_id: DEFAULT_LIST_ID.into(),
            created_at: at(8),
            updated_at: at(9),
        }
    }

    #[test]
    fn first_load_seeds_lists_once() {
        let mut storage = Storage::new(MemoryStore::new());
        let lists = storage.load_lists(at(1));
        assert_eq!(lists.len(), 3);
        assert!(storage.kv().contains(LISTS_KEY));

        // User deletes down to one list; the seed must not come back
        storage.save_lists(&lists[..1]);
        let reloaded = storage.load_lists(at(2));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].id, DEFAULT_LIST_ID);
    }

    #[test]
    fn missing_tasks_record_is_empty_and_not_written() {
        let mut storage = Storage::new(MemoryStore::new());
        assert!(storage.load_tasks().is_empty());
        assert!(!storage.kv().contains(TASKS_KEY));
    }

    #[test]
    fn tasks_round_trip() {
        let mut storage = Storage::new(MemoryStore::new());
        let tasks = vec![task("a", Some(at(12))), task("b", None)];
        storage.save_tasks(&tasks);
        assert_eq!(storage.load_tasks(), tasks);
    }

    #[test]
    fn saved_record_has_explicit_null_due_date() {
        let mut storage = Storage::new(MemoryStore::new());
        storage.save_tasks(&[task("b", None)]);
        let raw = storage.kv().get(TASKS_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert!(json[0]["dueDate"].is_null());
        assert_eq!(json[0]["listId"], "default");
    }

    #[test]
    fn malformed_tasks_are_logged_and_treated_as_empty() {
        let tmp = TempDir::new().unwrap();
        let mut kv = DirStore::new(tmp.path());
        kv.set(TASKS_KEY, b"[{\"id\": ").unwrap();
        let mut storage = Storage::new(kv);

        assert!(storage.load_tasks().is_empty());

        let entries = RecoveryLog::in_dir(tmp.path()).entries(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, RecoveryCategory::Parse);
        assert_eq!(entries[0].body, "[{\"id\": ");
    }

    #[test]
    fn malformed_lists_do_not_reseed() {
        let mut kv = MemoryStore::new();
        kv.set(LISTS_KEY, b"{oops").unwrap();
        let mut storage = Storage::new(kv);
        assert!(storage.load_lists(at(1)).is_empty());
        assert_eq!(storage.kv().get(LISTS_KEY).unwrap().unwrap(), b"{oops");
    }

    #[test]
    fn legacy_millisecond_dates_rehydrate() {
        let mut kv = MemoryStore::new();
        kv.set(
            TASKS_KEY,
            br#"[{"id":"x","title":"t","dueDate":"2025-06-01T00:00:00.000Z","status":"pending","priority":"high","listId":"work","createdAt":"2025-05-30T12:00:00.000Z","updatedAt":"2025-05-30T12:00:00.000Z"}]"#,
        )
        .unwrap();
        let tasks = Storage::new(kv).load_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].due_date,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
        );
    }
}
