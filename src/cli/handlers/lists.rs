use crate::cli::commands::{ListAction, ListCmd};
use crate::cli::output::*;
use crate::model::list::{ListPatch, TaskList};
use crate::ops::derive;

use super::{Context, HandlerResult, resolve_list};

pub fn cmd_lists(ctx: &Context) -> HandlerResult {
    let summaries = ctx.store.list_summaries();
    if ctx.json {
        let output: Vec<_> = summaries.iter().map(summary_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in format_summary_table(&summaries) {
            println!("{}", line);
        }
    }
    Ok(())
}

pub fn cmd_list(ctx: &mut Context, args: ListCmd) -> HandlerResult {
    match args.action {
        ListAction::Add { name, color } => {
            let color =
                color.unwrap_or_else(|| derive::suggest_color(ctx.store.lists()).to_string());
            let list = ctx.store.create_list(&name, &color);
            print_list(ctx, &list)
        }
        ListAction::Rename { list, name } => {
            let id = resolve_list(&ctx.store, &list)?;
            let patch = ListPatch {
                name: Some(name),
                color: None,
            };
            let list = ctx.store.update_list(&id, patch)?;
            print_list(ctx, &list)
        }
        ListAction::Color { list, color } => {
            let id = resolve_list(&ctx.store, &list)?;
            let patch = ListPatch {
                name: None,
                color: Some(color),
            };
            let list = ctx.store.update_list(&id, patch)?;
            print_list(ctx, &list)
        }
        ListAction::Rm { list } => {
            let id = resolve_list(&ctx.store, &list)?;
            let deletion = ctx.store.delete_list(&id)?;
            if ctx.json {
                let output = ListDeletedJson {
                    deleted: &deletion.list,
                    reassigned: &deletion.reassigned,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if deletion.reassigned.is_empty() {
                println!("deleted list {}", deletion.list.name);
            } else {
                println!(
                    "deleted list {}; moved {} tasks to the default list",
                    deletion.list.name,
                    deletion.reassigned.len()
                );
            }
            Ok(())
        }
    }
}

fn print_list(ctx: &Context, list: &TaskList) -> HandlerResult {
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(list)?);
    } else {
        println!("{}  {}  {}", list.id, list.name, list.color);
    }
    Ok(())
}
