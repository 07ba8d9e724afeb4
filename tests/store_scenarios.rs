//! End-to-end store behaviour over an on-disk data directory.

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use ticklist::io::kv::{DirStore, KvStore, LISTS_KEY, TASKS_KEY};
use ticklist::io::recovery::{RecoveryCategory, RecoveryLog};
use ticklist::model::{
    DEFAULT_LIST_ID, ListPatch, NewTask, Priority, SortDirection, SortKey, StatusFilter, TaskPatch,
    TaskStatus, ViewOptions,
};
use ticklist::ops::derive;
use ticklist::ops::store::{ManualClock, Store, StoreError};

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap())
}

fn open(tmp: &TempDir, clock: &ManualClock) -> Store<DirStore> {
    Store::load_with_clock(DirStore::new(tmp.path()), clock.clone())
}

fn assert_no_dangling(store: &Store<DirStore>) {
    for task in store.tasks() {
        assert!(store.list(&task.list_id).is_some(), "dangling task {}", task.id);
    }
}

#[test]
fn work_list_scenario() {
    let tmp = TempDir::new().unwrap();
    let clock = clock();
    let mut store = open(&tmp, &clock);

    let work = store.create_list("Work", "#10B981");
    assert!(!work.id.is_empty());
    assert_ne!(work.id, "work");
    assert_eq!(work.created_at, Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap());

    let yesterday = Utc.with_ymd_and_hms(2025, 4, 30, 9, 0, 0).unwrap();
    let task = store.create_task(
        NewTask::new("Ship report")
            .with_priority(Priority::High)
            .in_list(work.id.clone())
            .due(yesterday),
    );
    let ids: Vec<_> = store.tasks_for_list(&work.id).iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids, vec![task.id.clone()]);

    let now = Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap();
    assert!(derive::is_overdue(store.task(&task.id).unwrap(), now));

    clock.advance(Duration::minutes(1));
    let completed = store.set_task_status(&task.id, TaskStatus::Completed).unwrap();
    assert!(!derive::is_overdue(&completed, now));

    clock.advance(Duration::minutes(1));
    store.delete_list(&work.id).unwrap();
    let moved = store.task(&task.id).unwrap();
    assert_eq!(moved.list_id, DEFAULT_LIST_ID);
    assert!(moved.updated_at > completed.updated_at);
    assert_no_dangling(&store);
}

#[test]
fn first_run_seeds_three_lists_exactly_once() {
    let tmp = TempDir::new().unwrap();
    let clock = clock();
    {
        let mut store = open(&tmp, &clock);
        let names: Vec<_> = store.lists().map(|l| l.name.clone()).collect();
        assert_eq!(names, vec!["General", "Work", "Personal"]);
        store.delete_list("work").unwrap();
        store.delete_list("personal").unwrap();
    }
    let store = open(&tmp, &clock);
    let ids: Vec<_> = store.lists().map(|l| l.id.clone()).collect();
    assert_eq!(ids, vec![DEFAULT_LIST_ID]);
}

#[test]
fn reload_reproduces_collections() {
    let tmp = TempDir::new().unwrap();
    let clock = clock();
    let mut store = open(&tmp, &clock);

    let errands = store.create_list("Errands", "#EC4899");
    let due =
        Utc.with_ymd_and_hms(2025, 5, 3, 17, 45, 12).unwrap() + Duration::nanoseconds(123_456_789);
    store.create_task(
        NewTask::new("Buy stamps")
            .in_list(errands.id.clone())
            .with_description("the nice ones")
            .due(due),
    );
    clock.advance(Duration::seconds(2));
    let t = store.create_task(NewTask::new("Call mum").with_priority(Priority::Low));
    store
        .update_task(
            &t.id,
            TaskPatch {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
        )
        .unwrap();
    store
        .update_list(
            &errands.id,
            ListPatch {
                name: Some("Errands & shopping".into()),
                color: None,
            },
        )
        .unwrap();

    let reloaded = open(&tmp, &clock);
    assert_eq!(reloaded.snapshot(), store.snapshot());
}

#[test]
fn default_list_deletion_refused_in_any_state() {
    let tmp = TempDir::new().unwrap();
    let clock = clock();
    let mut store = open(&tmp, &clock);
    for i in 0..3 {
        store.create_task(NewTask::new(format!("task {}", i)));
    }
    store.delete_list("work").unwrap();

    let before = store.snapshot();
    let tasks_on_disk = store.storage().kv().get(TASKS_KEY).unwrap();
    assert!(matches!(store.delete_list(DEFAULT_LIST_ID), Err(StoreError::Forbidden(_))));
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.storage().kv().get(TASKS_KEY).unwrap(), tasks_on_disk);
}

#[test]
fn random_walk_never_leaves_dangling_tasks() {
    let tmp = TempDir::new().unwrap();
    let clock = clock();
    let mut store = open(&tmp, &clock);
    let mut lists = vec!["work".to_string(), "personal".to_string()];

    for step in 0..60usize {
        clock.advance(Duration::seconds(1));
        match step % 6 {
            0 => {
                let l = store.create_list(&format!("list {}", step), "#8B5CF6");
                lists.push(l.id);
            }
            1 | 2 => {
                let target = lists.get(step % lists.len().max(1)).cloned().unwrap_or_default();
                store.create_task(NewTask::new(format!("t{}", step)).in_list(target));
            }
            3 => {
                let found = store.tasks().nth(step % 3).map(|t| t.id.clone());
                if let Some(id) = found {
                    let target = lists.get(step % lists.len().max(1)).cloned();
                    let patch = TaskPatch {
                        list_id: target,
                        ..Default::default()
                    };
                    store.update_task(&id, patch).unwrap();
                }
            }
            4 => {
                if !lists.is_empty() {
                    let victim = lists.remove(step % lists.len());
                    store.delete_list(&victim).unwrap();
                }
            }
            _ => {
                let found = store.tasks().next().map(|t| t.id.clone());
                if let Some(id) = found {
                    store.toggle_task_status(&id).unwrap();
                }
            }
        }
        assert_no_dangling(&store);
        for task in store.tasks() {
            assert!(task.updated_at >= task.created_at);
        }
    }
}

#[test]
fn sorted_view_is_stable_across_calls() {
    let tmp = TempDir::new().unwrap();
    let clock = clock();
    let mut store = open(&tmp, &clock);
    for (i, days) in [Some(3), None, Some(1), None, Some(2)].into_iter().enumerate() {
        let mut t = NewTask::new(format!("t{}", i)).in_list("work");
        if let Some(d) = days {
            t = t.due(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap() + Duration::days(d));
        }
        store.create_task(t);
    }

    let options = ViewOptions {
        filter: StatusFilter::All,
        sort: SortKey::DueDate,
        direction: SortDirection::Asc,
    };
    let titles = |options: &ViewOptions| -> Vec<String> {
        let view = store.filter_and_sort("work", options);
        view.iter().map(|t| t.title.clone()).collect()
    };
    let first = titles(&options);
    let second = titles(&options);
    assert_eq!(first, vec!["t2", "t4", "t0", "t1", "t3"]);
    assert_eq!(first, second);

    let desc = ViewOptions {
        direction: SortDirection::Desc,
        ..options
    };
    assert_eq!(titles(&desc), vec!["t1", "t3", "t0", "t4", "t2"]);
}

#[test]
fn corrupt_records_start_clean_and_are_logged() {
    let tmp = TempDir::new().unwrap();
    let mut kv = DirStore::new(tmp.path());
    kv.set(TASKS_KEY, b"{ this is not json").unwrap();
    kv.set(LISTS_KEY, b"[{\"id\": 7}]").unwrap();

    let store = Store::load_with_clock(kv, clock());
    assert_eq!(store.tasks().count(), 0);
    let ids: Vec<_> = store.lists().map(|l| l.id.clone()).collect();
    assert_eq!(ids, vec![DEFAULT_LIST_ID]);

    let entries = RecoveryLog::in_dir(tmp.path()).entries(None);
    let parse_failures = entries
        .iter()
        .filter(|e| e.category == RecoveryCategory::Parse)
        .count();
    assert_eq!(parse_failures, 2);
    assert!(entries.iter().any(|e| e.category == RecoveryCategory::Repair));
    assert!(entries.iter().any(|e| e.body == "{ this is not json"));
}

#[test]
fn completion_stats_for_empty_list() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp, &clock());
    let stats = store.completion_stats("personal");
    assert_eq!((stats.completed, stats.total, stats.percentage), (0, 0, 0));
}
