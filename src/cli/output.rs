use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::model::list::TaskList;
use crate::model::task::{Priority, Task, TaskStatus};
use crate::ops::derive::{self, CompletionStats, ListSummary};
use crate::util::unicode::pad_to_width;

/// Characters of a task id shown in tables
pub const SHORT_ID_LEN: usize = 8;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    pub overdue: bool,
}

#[derive(Serialize)]
pub struct ListJson<'a> {
    #[serde(flatten)]
    pub list: &'a TaskList,
    #[serde(flatten)]
    pub stats: CompletionStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListViewJson<'a> {
    pub list: &'a TaskList,
    pub stats: CompletionStats,
    pub tasks: Vec<TaskJson<'a>>,
}

#[derive(Serialize)]
pub struct StatsJson<'a> {
    pub lists: Vec<ListJson<'a>>,
    pub totals: CompletionStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeletedJson<'a> {
    pub deleted: &'a TaskList,
    pub reassigned: &'a [String],
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task, now: DateTime<Utc>) -> TaskJson<'_> {
    TaskJson {
        task,
        overdue: derive::is_overdue(task, now),
    }
}

pub fn summary_to_json<'a>(summary: &ListSummary<'a>) -> ListJson<'a> {
    ListJson {
        list: summary.list,
        stats: summary.stats,
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn status_box(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "[ ]",
        TaskStatus::Completed => "[x]",
    }
}

fn priority_mark(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "!!!",
        Priority::Medium => "!! ",
        Priority::Low => "!  ",
    }
}

/// `[ ] 1a2b3c4d !!  Title  (due Tomorrow)`
pub fn format_task_line(task: &Task, now: &DateTime<Local>) -> String {
    let mut line = format!(
        "{} {} {} {}",
        status_box(task.status),
        short_id(&task.id),
        priority_mark(task.priority),
        task.title
    );
    if let Some(due) = &task.due_date {
        let label = derive::due_label(due, now);
        if derive::is_overdue(task, now.with_timezone(&Utc)) {
            line.push_str(&format!("  (overdue: {})", label));
        } else {
            line.push_str(&format!("  (due {})", label));
        }
    }
    line
}

/// Multi-line detail block for `tl show`
pub fn format_task_detail(task: &Task, list: Option<&TaskList>, now: &DateTime<Local>) -> String {
    let mut out = format!("{} {}\n", status_box(task.status), task.title);
    out.push_str(&format!("  id:       {}\n", task.id));
    let list_name = list.map(|l| l.name.as_str()).unwrap_or(task.list_id.as_str());
    out.push_str(&format!("  list:     {}\n", list_name));
    out.push_str(&format!("  status:   {}\n", task.status));
    out.push_str(&format!("  priority: {}\n", task.priority));
    match &task.due_date {
        Some(due) => {
            let overdue = if derive::is_overdue(task, now.with_timezone(&Utc)) {
                " (overdue)"
            } else {
                ""
            };
            out.push_str(&format!(
                "  due:      {} {}{}\n",
                derive::due_label(due, now),
                due.with_timezone(&now.timezone()).format("%Y-%m-%d"),
                overdue
            ));
        }
        None => out.push_str("  due:      -\n"),
    }
    out.push_str(&format!(
        "  created:  {}\n",
        task.created_at.with_timezone(&now.timezone()).format("%Y-%m-%d %H:%M")
    ));
    out.push_str(&format!(
        "  updated:  {}\n",
        task.updated_at.with_timezone(&now.timezone()).format("%Y-%m-%d %H:%M")
    ));
    if let Some(desc) = &task.description {
        out.push('\n');
        for line in desc.lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }
    out
}

/// `name  3/5  60%  color  id` rows, name column aligned
pub fn format_summary_table(summaries: &[ListSummary<'_>]) -> Vec<String> {
    let name_w = summaries
        .iter()
        .map(|s| crate::util::unicode::display_width(&s.list.name))
        .max()
        .unwrap_or(0);
    summaries
        .iter()
        .map(|s| {
            format!(
                "{}  {:>3}/{:<3} {:>3}%  {}  {}",
                pad_to_width(&s.list.name, name_w),
                s.stats.completed,
                s.stats.total,
                s.stats.percentage,
                s.list.color,
                s.list.id
            )
        })
        .collect()
}

pub fn format_stats(stats: &CompletionStats) -> String {
    format!(
        "{} of {} completed ({}%), {} pending",
        stats.completed,
        stats.total,
        stats.percentage,
        stats.pending()
    )
}
