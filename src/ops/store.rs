//! The canonical task and list collections and every mutation on them.
//!
//! A [`Store`] is constructed explicitly by loading from a key-value
//! backend. Each successful mutation is applied in memory, saved through the
//! [`Storage`] gateway, and then announced to subscribers.
//!
//! # Invariants
//! - The default list always exists and cannot be deleted.
//! - Every task's `list_id` names an existing list.
//! - Ids are never reused; `updated_at >= created_at` for every task.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use super::derive::{self, CompletionStats, ListSummary};
use crate::io::kv::KvStore;
use crate::io::recovery::{RecoveryCategory, RecoveryEntry};
use crate::io::storage::Storage;
use crate::model::list::{DEFAULT_LIST_ID, ListPatch, TaskList, default_list};
use crate::model::task::{NewTask, Priority, Task, TaskPatch, TaskStatus};
use crate::model::view::ViewOptions;

/// Title given to tasks created with a blank title
pub const UNTITLED_TASK: &str = "Untitled";
/// Name given to lists created with a blank name
pub const UNTITLED_LIST: &str = "Untitled list";

// ---------------------------------------------------------------------------
// Errors and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Task,
    List,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Task => write!(f, "task"),
            EntityKind::List => write!(f, "list"),
        }
    }
}

/// Error type for store mutations. Neither variant changes any state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("not allowed: {0}")]
    Forbidden(String),
}

impl StoreError {
    fn task_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: EntityKind::Task,
            id: id.to_string(),
        }
    }

    fn list_not_found(id: &str) -> Self {
        StoreError::NotFound {
            kind: EntityKind::List,
            id: id.to_string(),
        }
    }
}

/// Announced to subscribers after a mutation has been applied and saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    TaskCreated(String),
    TaskUpdated(String),
    TaskDeleted(String),
    ListCreated(String),
    ListUpdated(String),
    /// `reassigned` holds the ids of tasks moved to the default list
    ListDeleted { id: String, reassigned: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&StoreEvent)>;

/// Result of deleting a list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDeletion {
    pub list: TaskList,
    pub reassigned: Vec<String>,
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for timestamps
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock(Rc<Cell<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock(Rc::new(Cell::new(start)))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.0.set(at);
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct Store<S: KvStore> {
    storage: Storage<S>,
    clock: Box<dyn Clock>,
    tasks: IndexMap<String, Task>,
    lists: IndexMap<String, TaskList>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<S: KvStore> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("tasks", &self.tasks.len())
            .field("lists", &self.lists.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<S: KvStore> Store<S> {
    /// Load both collections from `kv` using the system clock
    pub fn load(kv: S) -> Self {
        Self::load_with_clock(kv, SystemClock)
    }

    /// Load both collections, repairing anything that breaks the store's
    /// invariants (missing default list, tasks pointing at unknown lists).
    pub fn load_with_clock(kv: S, clock: impl Clock + 'static) -> Self {
        let mut storage = Storage::new(kv);
        let now = clock.now();
        let loaded_lists = storage.load_lists(now);
        let loaded_tasks = storage.load_tasks();

        let mut store = Store {
            storage,
            clock: Box::new(clock),
            tasks: IndexMap::with_capacity(loaded_tasks.len()),
            lists: IndexMap::with_capacity(loaded_lists.len() + 1),
            listeners: Vec::new(),
            next_subscription: 0,
        };

        let mut duplicates = 0;
        for list in loaded_lists {
            if store.lists.contains_key(&list.id) {
                duplicates += 1;
            } else {
                store.lists.insert(list.id.clone(), list);
            }
        }
        for task in loaded_tasks {
            if store.tasks.contains_key(&task.id) {
                duplicates += 1;
            } else {
                store.tasks.insert(task.id.clone(), task);
            }
        }
        if duplicates > 0 {
            store.storage.report(
                RecoveryEntry::new(
                    RecoveryCategory::Repair,
                    format!("{} duplicate records dropped", duplicates),
                ),
            );
        }

        store.repair_default_list(now);
        store.repair_timestamps();
        store.repair_orphans();
        store
    }

    fn repair_default_list(&mut self, now: DateTime<Utc>) {
        if self.lists.contains_key(DEFAULT_LIST_ID) {
            return;
        }
        self.lists
            .shift_insert(0, DEFAULT_LIST_ID.to_string(), default_list(now));
        self.storage.report(RecoveryEntry::new(
            RecoveryCategory::Repair,
            "default list was missing and has been restored",
        ));
        self.storage.save_lists(self.lists.values());
    }

    /// Hand-edited records can carry an `updatedAt` before `createdAt`.
    fn repair_timestamps(&mut self) {
        let mut clamped = Vec::new();
        for task in self.tasks.values_mut() {
            if task.updated_at < task.created_at {
                task.updated_at = task.created_at;
                clamped.push(task.id.clone());
            }
        }
        if clamped.is_empty() {
            return;
        }
        self.storage.report(
            RecoveryEntry::new(
                RecoveryCategory::Repair,
                format!(
                    "{} tasks were updated before they were created; updatedAt reset to createdAt",
                    clamped.len()
                ),
            )
            .field("Tasks", clamped.join(", ")),
        );
        self.storage.save_tasks(self.tasks.values());
    }

    fn repair_orphans(&mut self) {
        let orphans: Vec<String> = self
            .tasks
            .values()
            .filter(|t| !self.lists.contains_key(&t.list_id))
            .map(|t| t.id.clone())
            .collect();
        if orphans.is_empty() {
            return;
        }
        let now = self.clock.now();
        for id in &orphans {
            if let Some(task) = self.tasks.get_mut(id) {
                task.list_id = DEFAULT_LIST_ID.to_string();
                touch(task, now);
            }
        }
        self.storage.report(
            RecoveryEntry::new(
                RecoveryCategory::Repair,
                format!(
                    "{} tasks pointed at missing lists and were moved to the default list",
                    orphans.len()
                ),
            )
            .field("Tasks", orphans.join(", ")),
        );
        self.storage.save_tasks(self.tasks.values());
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register a listener called after every successful mutation
    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: StoreEvent) {
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    // -----------------------------------------------------------------------
    // Task mutations
    // -----------------------------------------------------------------------

    pub fn create_task(&mut self, input: NewTask) -> Task {
        let now = self.clock.now();
        let id = self.fresh_id(|s, id| s.tasks.contains_key(id));
        let title = normalize_title(&input.title).unwrap_or_else(|| UNTITLED_TASK.to_string());
        let task = Task {
            id: id.clone(),
            title,
            description: normalize_description(input.description),
            due_date: input.due_date,
            status: input.status,
            priority: input.priority,
            list_id: self.resolve_list_id(&input.list_id),
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(id.clone(), task.clone());
        self.storage.save_tasks(self.tasks.values());
        self.emit(StoreEvent::TaskCreated(id));
        task
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        if !self.tasks.contains_key(id) {
            return Err(StoreError::task_not_found(id));
        }
        let list_id = patch.list_id.as_deref().map(|l| self.resolve_list_id(l));
        let now = self.clock.now();
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::task_not_found(id))?;

        if let Some(title) = patch.title.as_deref().and_then(normalize_title) {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = normalize_description(description);
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(list_id) = list_id {
            task.list_id = list_id;
        }
        touch(task, now);
        let updated = task.clone();

        self.storage.save_tasks(self.tasks.values());
        self.emit(StoreEvent::TaskUpdated(updated.id.clone()));
        Ok(updated)
    }

    /// Hard removal
    pub fn delete_task(&mut self, id: &str) -> Result<Task, StoreError> {
        let task = self
            .tasks
            .shift_remove(id)
            .ok_or_else(|| StoreError::task_not_found(id))?;
        self.storage.save_tasks(self.tasks.values());
        self.emit(StoreEvent::TaskDeleted(task.id.clone()));
        Ok(task)
    }

    pub fn set_task_status(&mut self, id: &str, status: TaskStatus) -> Result<Task, StoreError> {
        self.update_task(id, TaskPatch::status(status))
    }

    pub fn set_task_priority(&mut self, id: &str, priority: Priority) -> Result<Task, StoreError> {
        self.update_task(id, TaskPatch::priority(priority))
    }

    /// pending ⇄ completed
    pub fn toggle_task_status(&mut self, id: &str) -> Result<Task, StoreError> {
        let status = self
            .task(id)
            .ok_or_else(|| StoreError::task_not_found(id))?
            .status;
        self.set_task_status(id, status.toggled())
    }

    /// low → medium → high → low
    pub fn cycle_priority(&mut self, id: &str) -> Result<Task, StoreError> {
        let priority = self
            .task(id)
            .ok_or_else(|| StoreError::task_not_found(id))?
            .priority;
        self.set_task_priority(id, priority.next())
    }

    // -----------------------------------------------------------------------
    // List mutations
    // -----------------------------------------------------------------------

    pub fn create_list(&mut self, name: &str, color: &str) -> TaskList {
        let id = self.fresh_id(|s, id| s.lists.contains_key(id));
        let list = TaskList {
            id: id.clone(),
            name: normalize_title(name).unwrap_or_else(|| UNTITLED_LIST.to_string()),
            color: color.to_string(),
            created_at: self.clock.now(),
        };
        self.lists.insert(id.clone(), list.clone());
        self.storage.save_lists(self.lists.values());
        self.emit(StoreEvent::ListCreated(id));
        list
    }

    pub fn update_list(&mut self, id: &str, patch: ListPatch) -> Result<TaskList, StoreError> {
        let list = self
            .lists
            .get_mut(id)
            .ok_or_else(|| StoreError::list_not_found(id))?;
        if let Some(name) = patch.name.as_deref().and_then(normalize_title) {
            list.name = name;
        }
        if let Some(color) = patch.color {
            list.color = color;
        }
        let updated = list.clone();
        self.storage.save_lists(self.lists.values());
        self.emit(StoreEvent::ListUpdated(updated.id.clone()));
        Ok(updated)
    }

    /// Delete a list, moving its tasks to the default list. The default list
    /// itself is refused.
    pub fn delete_list(&mut self, id: &str) -> Result<ListDeletion, StoreError> {
        match self.lists.get(id) {
            None => return Err(StoreError::list_not_found(id)),
            Some(list) if list.is_default() => {
                return Err(StoreError::Forbidden(
                    "the default list cannot be deleted".to_string(),
                ));
            }
            Some(_) => {}
        }

        let now = self.clock.now();
        let mut reassigned = Vec::new();
        for task in self.tasks.values_mut().filter(|t| t.list_id == id) {
            task.list_id = DEFAULT_LIST_ID.to_string();
            touch(task, now);
            reassigned.push(task.id.clone());
        }
        let list = self
            .lists
            .shift_remove(id)
            .ok_or_else(|| StoreError::list_not_found(id))?;

        if !reassigned.is_empty() {
            self.storage.save_tasks(self.tasks.values());
        }
        self.storage.save_lists(self.lists.values());
        self.emit(StoreEvent::ListDeleted {
            id: list.id.clone(),
            reassigned: reassigned.clone(),
        });
        Ok(ListDeletion { list, reassigned })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn tasks(&self) -> impl Iterator<Item = &Task> + Clone {
        self.tasks.values()
    }

    pub fn lists(&self) -> impl Iterator<Item = &TaskList> + Clone {
        self.lists.values()
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn list(&self, id: &str) -> Option<&TaskList> {
        self.lists.get(id)
    }

    /// Owned copies of both collections, in collection order
    pub fn snapshot(&self) -> (Vec<Task>, Vec<TaskList>) {
        (
            self.tasks.values().cloned().collect(),
            self.lists.values().cloned().collect(),
        )
    }

    pub fn tasks_for_list(&self, list_id: &str) -> Vec<&Task> {
        derive::tasks_for_list(self.tasks.values(), list_id)
    }

    pub fn filter_and_sort(&self, list_id: &str, options: &ViewOptions) -> Vec<&Task> {
        derive::view(self.tasks.values(), list_id, options)
    }

    pub fn completion_stats(&self, list_id: &str) -> CompletionStats {
        derive::completion_stats(self.tasks.values(), list_id)
    }

    pub fn list_summaries(&self) -> Vec<ListSummary<'_>> {
        derive::list_summaries(self.tasks.values(), self.lists.values())
    }

    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// An id that `taken` rejects is never handed out
    fn fresh_id(&self, taken: impl Fn(&Self, &str) -> bool) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !taken(self, &id) {
                return id;
            }
        }
    }

    fn resolve_list_id(&self, list_id: &str) -> String {
        let trimmed = list_id.trim();
        if self.lists.contains_key(trimmed) {
            trimmed.to_string()
        } else {
            DEFAULT_LIST_ID.to_string()
        }
    }
}

/// Refresh `updated_at`, strictly later than before even if the clock
/// has not moved
fn touch(task: &mut Task, now: DateTime<Utc>) {
    task.updated_at = if now > task.updated_at {
        now
    } else {
        task.updated_at + Duration::microseconds(1)
    };
}

fn normalize_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description.filter(|d| !d.trim().is_empty())
}
