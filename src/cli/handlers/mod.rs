mod lists;
pub use lists::{cmd_list, cmd_lists};

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::kv::DirStore;
use crate::io::recovery::RecoveryLog;
use crate::model::config::Config;
use crate::model::list::{DEFAULT_LIST_ID, TaskList};
use crate::model::task::{NewTask, Priority, Task, TaskPatch, TaskStatus};
use crate::model::view::{SortDirection, SortKey, StatusFilter};
use crate::ops::derive;
use crate::ops::store::Store;

type HandlerResult = Result<(), Box<dyn std::error::Error>>;

/// Errors resolving command-line arguments against the store
#[derive(Debug, thiserror::Error)]
pub enum ArgError {
    #[error("no task matches '{0}'")]
    NoSuchTask(String),
    #[error("'{query}' matches {count} tasks; use more characters")]
    AmbiguousTask { query: String, count: usize },
    #[error("no list matches '{0}'")]
    NoSuchList(String),
    #[error("'{query}' matches {count} lists; use the list id")]
    AmbiguousList { query: String, count: usize },
    #[error("invalid date '{0}': expected YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),
    #[error("invalid {what} '{value}'")]
    InvalidValue { what: &'static str, value: String },
}

/// Everything a handler needs: the loaded store plus config
pub struct Context {
    pub store: Store<DirStore>,
    pub config: Config,
    pub data_dir: PathBuf,
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> HandlerResult {
    let config_path = cli.config.clone().unwrap_or_else(config_io::config_path);
    let config = config_io::read_config(&config_path)?;
    let data_dir = config_io::resolve_data_dir(cli.data_dir.as_deref(), &config);
    let store = Store::load(DirStore::new(&data_dir));
    let mut ctx = Context {
        store,
        config,
        data_dir,
        json: cli.json,
    };

    match cli.command {
        None => cmd_ls(&ctx, LsArgs::default()),
        Some(cmd) => match cmd {
            // Read commands
            Commands::Lists => cmd_lists(&ctx),
            Commands::Ls(args) => cmd_ls(&ctx, args),
            Commands::Show(args) => cmd_show(&ctx, args),
            Commands::Stats(args) => cmd_stats(&ctx, args),
            Commands::Recovery(args) => cmd_recovery(&ctx, args),

            // Write commands
            Commands::List(args) => cmd_list(&mut ctx, args),
            Commands::Add(args) => cmd_add(&mut ctx, args),
            Commands::Edit(args) => cmd_edit(&mut ctx, args),
            Commands::Done(args) => cmd_set_status(&mut ctx, args, TaskStatus::Completed),
            Commands::Reopen(args) => cmd_set_status(&mut ctx, args, TaskStatus::Pending),
            Commands::Toggle(args) => cmd_toggle(&mut ctx, args),
            Commands::Priority(args) => cmd_priority(&mut ctx, args),
            Commands::Bump(args) => cmd_bump(&mut ctx, args),
            Commands::Rm(args) => cmd_rm(&mut ctx, args),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve a task by full id or unique id prefix
pub fn resolve_task(store: &Store<DirStore>, query: &str) -> Result<String, ArgError> {
    let query = query.trim();
    if store.task(query).is_some() {
        return Ok(query.to_string());
    }
    let matches: Vec<&Task> = if query.is_empty() {
        Vec::new()
    } else {
        store.tasks().filter(|t| t.id.starts_with(query)).collect()
    };
    match matches.as_slice() {
        [] => Err(ArgError::NoSuchTask(query.to_string())),
        [task] => Ok(task.id.clone()),
        many => Err(ArgError::AmbiguousTask {
            query: query.to_string(),
            count: many.len(),
        }),
    }
}

/// Resolve a list by id, then by case-insensitive name
pub fn resolve_list(store: &Store<DirStore>, query: &str) -> Result<String, ArgError> {
    let query = query.trim();
    if store.list(query).is_some() {
        return Ok(query.to_string());
    }
    let matches: Vec<&TaskList> = store
        .lists()
        .filter(|l| {
            l.name.eq_ignore_ascii_case(query) || (!query.is_empty() && l.id.starts_with(query))
        })
        .collect();
    match matches.as_slice() {
        [] => Err(ArgError::NoSuchList(query.to_string())),
        [list] => Ok(list.id.clone()),
        many => Err(ArgError::AmbiguousList {
            query: query.to_string(),
            count: many.len(),
        }),
    }
}

/// `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp
pub fn parse_due(value: &str) -> Result<DateTime<Utc>, ArgError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ArgError::InvalidDate(value.to_string()))
}

fn parse_priority(value: &str) -> Result<Priority, ArgError> {
    Priority::parse(value).ok_or_else(|| ArgError::InvalidValue {
        what: "priority",
        value: value.to_string(),
    })
}

fn print_task(ctx: &Context, task: &Task) -> HandlerResult {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&task_to_json(task, Utc::now()))?);
    } else {
        println!("{}", format_task_line(task, &Local::now()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_ls(ctx: &Context, args: LsArgs) -> HandlerResult {
    let store = &ctx.store;
    let list_id = match &args.list {
        Some(q) => resolve_list(store, q)?,
        None => DEFAULT_LIST_ID.to_string(),
    };
    let list = store
        .list(&list_id)
        .ok_or_else(|| ArgError::NoSuchList(list_id.clone()))?;

    let mut options = ctx.config.view.options();
    if let Some(s) = &args.status {
        options.filter = StatusFilter::parse(s).ok_or_else(|| ArgError::InvalidValue {
            what: "status filter",
            value: s.clone(),
        })?;
    }
    if let Some(s) = &args.sort {
        options.sort = SortKey::parse(s).ok_or_else(|| ArgError::InvalidValue {
            what: "sort key",
            value: s.clone(),
        })?;
    }
    if args.asc {
        options.direction = SortDirection::Asc;
    } else if args.desc {
        options.direction = SortDirection::Desc;
    }

    let tasks = store.filter_and_sort(&list_id, &options);
    let stats = store.completion_stats(&list_id);

    if ctx.json {
        let now = Utc::now();
        let output = ListViewJson {
            list,
            stats,
            tasks: tasks.iter().map(|t| task_to_json(t, now)).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{} ({})", list.name, format_stats(&stats));
    if tasks.is_empty() {
        println!("  no tasks");
        return Ok(());
    }
    let now = Local::now();
    for task in tasks {
        println!("  {}", format_task_line(task, &now));
    }
    Ok(())
}

fn cmd_show(ctx: &Context, args: IdArgs) -> HandlerResult {
    let id = resolve_task(&ctx.store, &args.id)?;
    let task = ctx
        .store
        .task(&id)
        .ok_or_else(|| ArgError::NoSuchTask(id.clone()))?;
    if ctx.json {
        return print_task(ctx, task);
    }
    let list = ctx.store.list(&task.list_id);
    print!("{}", format_task_detail(task, list, &Local::now()));
    Ok(())
}

fn cmd_stats(ctx: &Context, args: StatsArgs) -> HandlerResult {
    let store = &ctx.store;
    if let Some(q) = &args.list {
        let list_id = resolve_list(store, q)?;
        let stats = store.completion_stats(&list_id);
        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("{}", format_stats(&stats));
        }
        return Ok(());
    }

    let summaries = store.list_summaries();
    let totals = derive::CompletionStats::new(
        summaries.iter().map(|s| s.stats.completed).sum(),
        summaries.iter().map(|s| s.stats.total).sum(),
    );
    if ctx.json {
        let output = StatsJson {
            lists: summaries.iter().map(summary_to_json).collect(),
            totals,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in format_summary_table(&summaries) {
            println!("{}", line);
        }
        println!();
        println!("Total: {}", format_stats(&totals));
    }
    Ok(())
}

fn cmd_recovery(ctx: &Context, args: RecoveryArgs) -> HandlerResult {
    let log = RecoveryLog::in_dir(&ctx.data_dir);
    if args.prune {
        let removed = log.prune(None, args.all)?;
        if ctx.json {
            println!("{}", serde_json::json!({ "removed": removed }));
        } else {
            println!("removed {} entries from {}", removed, log.path().display());
        }
        return Ok(());
    }

    let entries = log.entries(args.limit);
    if ctx.json {
        let values: Vec<_> = entries.iter().map(|e| e.to_json()).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else if entries.is_empty() {
        println!("recovery log is empty");
    } else {
        for entry in &entries {
            print!("{}", entry.to_display_markdown());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(ctx: &mut Context, args: AddArgs) -> HandlerResult {
    let mut input = NewTask::new(args.title);
    if let Some(q) = &args.list {
        input.list_id = resolve_list(&ctx.store, q)?;
    }
    if let Some(due) = &args.due {
        input.due_date = Some(parse_due(due)?);
    }
    if let Some(p) = &args.priority {
        input.priority = parse_priority(p)?;
    }
    if let Some(s) = &args.status {
        let status = TaskStatus::parse(s).ok_or_else(|| ArgError::InvalidValue {
            what: "status",
            value: s.clone(),
        })?;
        input = input.with_status(status);
    }
    input.description = args.description;

    let task = ctx.store.create_task(input);
    if ctx.json {
        print_task(ctx, &task)
    } else {
        println!("{}", task.id);
        Ok(())
    }
}

fn cmd_edit(ctx: &mut Context, args: EditArgs) -> HandlerResult {
    let id = resolve_task(&ctx.store, &args.id)?;
    let mut patch = TaskPatch {
        title: args.title,
        ..Default::default()
    };
    if args.no_desc {
        patch.description = Some(None);
    } else if let Some(desc) = args.description {
        patch.description = Some(Some(desc));
    }
    if args.no_due {
        patch.due_date = Some(None);
    } else if let Some(due) = &args.due {
        patch.due_date = Some(Some(parse_due(due)?));
    }
    if let Some(p) = &args.priority {
        patch.priority = Some(parse_priority(p)?);
    }
    if let Some(q) = &args.list {
        patch.list_id = Some(resolve_list(&ctx.store, q)?);
    }

    let task = ctx.store.update_task(&id, patch)?;
    print_task(ctx, &task)
}

fn cmd_set_status(ctx: &mut Context, args: IdArgs, status: TaskStatus) -> HandlerResult {
    let id = resolve_task(&ctx.store, &args.id)?;
    let task = ctx.store.set_task_status(&id, status)?;
    print_task(ctx, &task)
}

fn cmd_toggle(ctx: &mut Context, args: IdArgs) -> HandlerResult {
    let id = resolve_task(&ctx.store, &args.id)?;
    let task = ctx.store.toggle_task_status(&id)?;
    print_task(ctx, &task)
}

fn cmd_priority(ctx: &mut Context, args: PriorityArgs) -> HandlerResult {
    let id = resolve_task(&ctx.store, &args.id)?;
    let priority = parse_priority(&args.priority)?;
    let task = ctx.store.set_task_priority(&id, priority)?;
    print_task(ctx, &task)
}

fn cmd_bump(ctx: &mut Context, args: IdArgs) -> HandlerResult {
    let id = resolve_task(&ctx.store, &args.id)?;
    let task = ctx.store.cycle_priority(&id)?;
    print_task(ctx, &task)
}

fn cmd_rm(ctx: &mut Context, args: IdArgs) -> HandlerResult {
    let id = resolve_task(&ctx.store, &args.id)?;
    let task = ctx.store.delete_task(&id)?;
    if ctx.json {
        println!("{}", serde_json::json!({ "deleted": task.id }));
    } else {
        println!("deleted {} {}", short_id(&task.id), task.title);
    }
    Ok(())
}
