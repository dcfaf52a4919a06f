//! List command - Show the contents of a project.

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde_json::{json, Value as JsonValue};
use serde_yaml::Value;
use stackpack_iac::select_stack;
use stackpack_model::{Project, Stack};

use super::ProjectArgs;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ListTarget {
    Stacks,
    Resources,
    Parameters,
}

#[derive(Args)]
pub struct ListArgs {
    /// What to list
    #[arg(value_enum)]
    target: ListTarget,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    project: ProjectArgs,
}

pub fn execute(args: ListArgs) -> Result<()> {
    let loaded = args.project.load(&[])?;
    let rows = match args.target {
        ListTarget::Stacks => stack_rows(&loaded.project),
        ListTarget::Resources => {
            resource_rows(select_stack(&loaded.project, args.project.stack_name.as_deref())?)
        }
        ListTarget::Parameters => {
            parameter_rows(select_stack(&loaded.project, args.project.stack_name.as_deref())?)
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_table(&rows);
    }
    Ok(())
}

fn stack_rows(project: &Project) -> Vec<JsonValue> {
    let mut rows = Vec::new();
    for stack in &project.stacks {
        collect_stack(stack, None, &mut rows);
    }
    rows
}

fn collect_stack(stack: &Stack, parent: Option<&str>, rows: &mut Vec<JsonValue>) {
    rows.push(json!({
        "StackName": stack.stack_id(),
        "Parent": parent.unwrap_or("-"),
        "Resources": stack.resources().map_or(0, |r| r.resources().count()),
        "Assets": stack.assets.len(),
    }));
    for (_, child) in stack.nested_stacks() {
        collect_stack(child, Some(stack.stack_id()), rows);
    }
}

fn resource_rows(stack: &Stack) -> Vec<JsonValue> {
    stack
        .resources()
        .into_iter()
        .flat_map(|section| section.resources())
        .map(|resource| {
            json!({
                "LogicalResourceId": resource.key().unwrap_or_default(),
                "Type": resource.resource_type().unwrap_or("-"),
                "Assets": resource.assets.len(),
            })
        })
        .collect()
}

fn parameter_rows(stack: &Stack) -> Vec<JsonValue> {
    stack
        .get_overrideable_parameters()
        .into_iter()
        .map(|(name, parameter)| {
            json!({
                "ParameterKey": name,
                "Type": parameter.lookup("Type").map_or_else(|| "-".to_string(), display),
                "Default": parameter.lookup("Default").map_or_else(|| "-".to_string(), display),
            })
        })
        .collect()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn cell(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_table(rows: &[JsonValue]) {
    let Some(columns) = rows.first().and_then(JsonValue::as_object) else {
        println!("(none)");
        return;
    };
    let headers: Vec<&String> = columns.keys().collect();
    let widths: Vec<usize> = headers
        .iter()
        .map(|h| {
            rows.iter()
                .map(|r| r.get(h.as_str()).map_or(0, |v| cell(v).len()))
                .max()
                .unwrap_or(0)
                .max(h.len())
        })
        .collect();

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(widths.iter().copied())
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };
    println!("{}", line(headers.iter().map(|h| h.to_string()).collect()));
    for row in rows {
        println!(
            "{}",
            line(headers.iter().map(|h| row.get(h.as_str()).map(cell).unwrap_or_default()).collect())
        );
    }
}
