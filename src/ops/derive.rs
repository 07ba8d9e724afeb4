//! Read-only views over the task and list collections.
//!
//! Everything here is a pure function of its arguments. Views borrow from
//! the collections they are given and never hand out mutable access.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::model::list::{LIST_PALETTE, TaskList};
use crate::model::task::{Task, TaskStatus};
use crate::model::view::{SortDirection, SortKey, StatusFilter, ViewOptions};

/// All tasks belonging to `list_id`, in collection order
pub fn tasks_for_list<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    list_id: &str,
) -> Vec<&'a Task> {
    tasks.into_iter().filter(|t| t.list_id == list_id).collect()
}

/// Tasks of one list, filtered by status and stably sorted.
///
/// Tasks without a due date are treated as infinitely late: last when
/// ascending, first when descending. Equal keys keep collection order.
pub fn filter_and_sort<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    list_id: &str,
    filter: StatusFilter,
    key: SortKey,
    direction: SortDirection,
) -> Vec<&'a Task> {
    let mut view: Vec<&Task> = tasks
        .into_iter()
        .filter(|t| t.list_id == list_id && matches_filter(t, filter))
        .collect();
    view.sort_by(|a, b| compare(a, b, key, direction));
    view
}

/// [`filter_and_sort`] with the parameters bundled
pub fn view<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    list_id: &str,
    options: &ViewOptions,
) -> Vec<&'a Task> {
    filter_and_sort(tasks, list_id, options.filter, options.sort, options.direction)
}

fn matches_filter(task: &Task, filter: StatusFilter) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Pending => task.status == TaskStatus::Pending,
        StatusFilter::Completed => task.status == TaskStatus::Completed,
    }
}

/// Ordering of two tasks under a sort key and direction
pub fn compare(a: &Task, b: &Task, key: SortKey, direction: SortDirection) -> Ordering {
    let ascending = match key {
        SortKey::DueDate => match (&a.due_date, &b.due_date) {
            (Some(x), Some(y)) => x.cmp(y),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        },
        SortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
    };
    match direction {
        SortDirection::Asc => ascending,
        SortDirection::Desc => ascending.reverse(),
    }
}

/// Completion figures for one list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CompletionStats {
    pub completed: usize,
    pub total: usize,
    /// round(completed / total * 100), 0 for an empty list
    pub percentage: u32,
}

impl CompletionStats {
    pub fn new(completed: usize, total: usize) -> Self {
        CompletionStats {
            completed,
            total,
            percentage: percentage(completed, total),
        }
    }

    pub fn pending(&self) -> usize {
        self.total - self.completed
    }
}

/// `round(part / total * 100)` computed in `f64`, so ratios that land just
/// under a half in binary (57/200) round down.
fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

pub fn completion_stats<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    list_id: &str,
) -> CompletionStats {
    let (completed, total) = tasks
        .into_iter()
        .filter(|t| t.list_id == list_id)
        .fold((0, 0), |(done, total), t| {
            (done + usize::from(t.is_completed()), total + 1)
        });
    CompletionStats::new(completed, total)
}

/// Pending with a due date strictly before `now`
pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.status == TaskStatus::Pending && task.due_date.is_some_and(|due| due < now)
}

/// "Today", "Tomorrow", or a short date like "May 3", judged by the calendar
/// day of `now`'s time zone.
pub fn due_label<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let local = due.with_timezone(&now.timezone());
    let today = now.date_naive();
    let day = local.date_naive();
    if day == today {
        "Today".to_string()
    } else if today.succ_opt() == Some(day) {
        "Tomorrow".to_string()
    } else {
        local.format("%b %-d").to_string()
    }
}

/// One row of the list overview
#[derive(Debug, Clone, Serialize)]
pub struct ListSummary<'a> {
    pub list: &'a TaskList,
    #[serde(flatten)]
    pub stats: CompletionStats,
}

/// Per-list counts in list order, computed in a single pass over the tasks
pub fn list_summaries<'a>(
    tasks: impl IntoIterator<Item = &'a Task>,
    lists: impl IntoIterator<Item = &'a TaskList>,
) -> Vec<ListSummary<'a>> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for task in tasks {
        let entry = counts.entry(task.list_id.as_str()).or_default();
        entry.1 += 1;
        if task.is_completed() {
            entry.0 += 1;
        }
    }
    lists
        .into_iter()
        .map(|list| {
            let (completed, total) = counts.get(list.id.as_str()).copied().unwrap_or_default();
            ListSummary {
                list,
                stats: CompletionStats::new(completed, total),
            }
        })
        .collect()
}

/// Color for a new list: the first palette entry no list uses yet, otherwise
/// cycling through the palette by list count.
pub fn suggest_color<'a>(lists: impl IntoIterator<Item = &'a TaskList>) -> &'static str {
    let used: Vec<&str> = lists.into_iter().map(|l| l.color.as_str()).collect();
    LIST_PALETTE
        .iter()
        .find(|c| !used.iter().any(|u| u.eq_ignore_ascii_case(c)))
        .copied()
        .unwrap_or(LIST_PALETTE[used.len() % LIST_PALETTE.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::list::seed_lists;
    use crate::model::task::Priority;
    use chrono::{Duration, FixedOffset};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
    }

    fn task(id: &str, list: &str, created_min: i64) -> Task {
        let created = base() + Duration::minutes(created_min);
        Task {
            id: id.into(),
            title: id.into(),
            description: None,
            due_date: None,
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            list_id: list.into(),
            created_at: created,
            updated_at: created,
        }
    }

    fn with_due(mut t: Task, days: i64) -> Task {
        t.due_date = Some(base() + Duration::days(days));
        t
    }

    fn with_priority(mut t: Task, p: Priority) -> Task {
        t.priority = p;
        t
    }

    fn done(mut t: Task) -> Task {
        t.status = TaskStatus::Completed;
        t
    }

    fn ids(view: &[&Task]) -> Vec<String> {
        view.iter().map(|t| t.id.clone()).collect()
    }

    /// Ids of every task in list `l`, sorted
    fn sorted(tasks: &[Task], key: SortKey, direction: SortDirection) -> Vec<String> {
        ids(&filter_and_sort(tasks, "l", StatusFilter::All, key, direction))
    }

    #[test]
    fn tasks_for_list_filters_by_list() {
        let tasks = vec![task("a", "work", 0), task("b", "home", 1), task("c", "work", 2)];
        assert_eq!(ids(&tasks_for_list(&tasks, "work")), vec!["a", "c"]);
        assert!(tasks_for_list(&tasks, "nope").is_empty());
    }

    #[test]
    fn due_date_ascending_puts_undated_last() {
        let tasks = vec![
            task("none1", "l", 0),
            with_due(task("late", "l", 1), 5),
            task("none2", "l", 2),
            with_due(task("soon", "l", 3), 1),
        ];
        let v = sorted(&tasks, SortKey::DueDate, SortDirection::Asc);
        assert_eq!(v, vec!["soon", "late", "none1", "none2"]);
    }

    #[test]
    fn due_date_descending_puts_undated_first() {
        let tasks = vec![
            with_due(task("soon", "l", 0), 1),
            task("none1", "l", 1),
            with_due(task("late", "l", 2), 5),
            task("none2", "l", 3),
        ];
        let v = sorted(&tasks, SortKey::DueDate, SortDirection::Desc);
        assert_eq!(v, vec!["none1", "none2", "late", "soon"]);
    }

    #[test]
    fn priority_sort_is_stable() {
        let tasks = vec![
            with_priority(task("m1", "l", 0), Priority::Medium),
            with_priority(task("h", "l", 1), Priority::High),
            with_priority(task("l", "l", 2), Priority::Low),
            with_priority(task("m2", "l", 3), Priority::Medium),
        ];
        let asc = sorted(&tasks, SortKey::Priority, SortDirection::Asc);
        assert_eq!(asc, vec!["l", "m1", "m2", "h"]);
        let desc = sorted(&tasks, SortKey::Priority, SortDirection::Desc);
        assert_eq!(desc, vec!["h", "m1", "m2", "l"]);
    }

    #[test]
    fn created_at_ties_keep_insertion_order() {
        let tasks = vec![task("b", "l", 5), task("a1", "l", 0), task("a2", "l", 0)];
        let asc = sorted(&tasks, SortKey::CreatedAt, SortDirection::Asc);
        assert_eq!(asc, vec!["a1", "a2", "b"]);
        let desc = sorted(&tasks, SortKey::CreatedAt, SortDirection::Desc);
        assert_eq!(desc, vec!["b", "a1", "a2"]);
    }

    #[test]
    fn status_filter() {
        let tasks = vec![task("p", "l", 0), done(task("c", "l", 1)), task("other", "x", 2)];
        let (key, asc) = (SortKey::CreatedAt, SortDirection::Asc);
        let pending = filter_and_sort(&tasks, "l", StatusFilter::Pending, key, asc);
        assert_eq!(ids(&pending), vec!["p"]);
        let completed = filter_and_sort(&tasks, "l", StatusFilter::Completed, key, asc);
        assert_eq!(ids(&completed), vec!["c"]);
        let all = view(&tasks, "l", &ViewOptions::default());
        assert_eq!(ids(&all), vec!["c", "p"]);
    }

    #[test]
    fn filter_and_sort_is_idempotent_and_leaves_input_alone() {
        let tasks = vec![
            with_due(task("a", "l", 0), 3),
            task("b", "l", 1),
            with_due(task("c", "l", 2), -1),
        ];
        let before = tasks.clone();
        let first = sorted(&tasks, SortKey::DueDate, SortDirection::Asc);
        let second = sorted(&tasks, SortKey::DueDate, SortDirection::Asc);
        assert_eq!(first, second);
        assert_eq!(tasks, before);
    }

    #[test]
    fn completion_stats_rounding_and_empty() {
        assert_eq!(completion_stats(&Vec::<Task>::new(), "l"), CompletionStats::default());

        let tasks = vec![done(task("a", "l", 0)), task("b", "l", 1), task("c", "l", 2)];
        let stats = completion_stats(&tasks, "l");
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.percentage, 33);
        assert_eq!(stats.pending(), 2);

        let tasks = vec![done(task("a", "l", 0)), done(task("b", "l", 1)), task("c", "l", 2)];
        assert_eq!(completion_stats(&tasks, "l").percentage, 67);

        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(3, 3), 100);
        assert_eq!(percentage(57, 200), 28);
        assert_eq!(percentage(0, 7), 0);
    }

    #[test]
    fn overdue_requires_pending_and_past_due() {
        let now = base();
        let past = with_due(task("p", "l", 0), -1);
        assert!(is_overdue(&past, now));
        assert!(!is_overdue(&done(past.clone()), now));
        assert!(!is_overdue(&with_due(task("f", "l", 0), 1), now));
        assert!(!is_overdue(&task("n", "l", 0), now));

        let mut exactly_now = task("e", "l", 0);
        exactly_now.due_date = Some(now);
        assert!(!is_overdue(&exactly_now, now));
    }

    #[test]
    fn due_labels() {
        let now = base();
        assert_eq!(due_label(&(now + Duration::hours(3)), &now), "Today");
        assert_eq!(due_label(&(now + Duration::days(1)), &now), "Tomorrow");
        assert_eq!(due_label(&(now + Duration::days(2)), &now), "May 3");
        assert_eq!(due_label(&(now - Duration::days(1)), &now), "Apr 30");
    }

    #[test]
    fn due_label_uses_callers_time_zone() {
        // 23:30 UTC on May 1 is already May 2 in UTC+2
        let due = Utc.with_ymd_and_hms(2025, 5, 1, 23, 30, 0).unwrap();
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now_local = tz.with_ymd_and_hms(2025, 5, 2, 9, 0, 0).unwrap();
        assert_eq!(due_label(&due, &now_local), "Today");
    }

    #[test]
    fn summaries_follow_list_order() {
        let lists = seed_lists(base());
        let tasks = vec![
            task("a", "work", 0),
            done(task("b", "work", 1)),
            task("c", "default", 2),
        ];
        let rows = list_summaries(&tasks, &lists);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].list.id, "default");
        assert_eq!(rows[0].stats.total, 1);
        assert_eq!(rows[1].stats, CompletionStats::new(1, 2));
        assert_eq!(rows[1].stats.percentage, 50);
        assert_eq!(rows[2].stats.total, 0);
    }

    #[test]
    fn suggest_color_skips_used_colors() {
        let lists = seed_lists(base());
        assert_eq!(suggest_color(&lists), "#EF4444");
        assert_eq!(suggest_color(&[]), "#4F46E5");
    }
}
