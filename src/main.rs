use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::path::PathBuf;
use std::process;
use taskboard::{Config, Query, TaskError, TaskInput, TaskStore, TaskView, View};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Taskboard - track tasks with deadlines from the terminal")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Directory holding the task store (overrides config and TASKBOARD_STORE_PATH)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Config file (default: <config dir>/taskboard/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        /// 5 to 25 characters
        #[arg(long)]
        title: String,

        /// 20 to 100 characters
        #[arg(long)]
        desc: String,

        /// Later than now, e.g. 2026-10-20T17:00
        #[arg(long)]
        deadline: String,
    },

    /// List tasks
    List {
        /// Only tasks that are neither completed nor overdue
        #[arg(long)]
        active: bool,

        /// Case-insensitive text to look for
        #[arg(long)]
        search: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Edit a task; omitted fields keep their current value
    Edit {
        /// Position from the latest listing, or an id prefix
        target: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        desc: Option<String>,

        #[arg(long)]
        deadline: Option<String>,
    },

    /// Toggle a task between done and not done
    Done {
        /// Position from the latest listing, or an id prefix
        target: String,
    },

    /// Delete a task
    Delete {
        /// Position from the latest listing, or an id prefix
        target: String,
    },
}

fn main() {
    if let Err(e) = run() {
        if let Some(errors) = e.downcast_ref::<TaskError>().and_then(TaskError::field_errors) {
            for error in errors.iter() {
                eprintln!("{}: {}", error.field().to_string().red().bold(), error);
            }
            process::exit(1);
        }

        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(2);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // Setup tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(config.log_level()?)
        .init();

    let store_path = config.store_path(cli.store_path.as_deref())?;
    let backend = config.open_backend(&store_path)?;
    let mut store = TaskStore::open(backend, &config.slot)?;

    match cli.command {
        Commands::Add { title, desc, deadline } => {
            let input = TaskInput::new(&title, &desc, &deadline).map_err(TaskError::from)?;
            let position = store.add(input)?;
            let task = store.get(position)?;
            println!("Added task {} ({})", position, task.id);
        }
        Commands::List { active, search, json } => {
            let now = Utc::now();
            let view = if active { View::Active } else { View::All };
            let query = Query::new(view, search.unwrap_or_default());
            let shown = query.apply(&store.list_at(now), now);

            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else if shown.is_empty() {
                println!("No tasks");
            } else {
                for view in &shown {
                    println!("{}", render(view));
                }
                println!("{}", summary(&shown).dimmed());
            }
        }
        Commands::Edit {
            target,
            title,
            desc,
            deadline,
        } => {
            let position = store.locate(&target)?;
            let current = store.get(position)?.clone();
            store.update(
                position,
                &title.unwrap_or(current.title),
                &desc.unwrap_or(current.description),
                &deadline.unwrap_or(current.deadline),
            )?;
            println!("Updated task {}", position);
        }
        Commands::Done { target } => {
            let position = store.locate(&target)?;
            let completed = store.toggle_complete(position)?;
            let state = if completed { "done" } else { "not done" };
            println!("Marked task {} as {}", position, state);
        }
        Commands::Delete { target } => {
            let position = store.locate(&target)?;
            let removed = store.remove(position)?;
            println!("Deleted task {}: {}", position, removed.title);
        }
    }

    Ok(())
}

/// One listing line: position, the searchable task text, short id
fn render(view: &TaskView) -> String {
    let text = view.to_string();
    let text = if view.overdue {
        text.red().to_string()
    } else if view.task.completed {
        text.dimmed().to_string()
    } else {
        text
    };

    let id = view.task.id.to_string();
    format!("{} {}  {}", format!("{:>3}", view.position).cyan(), text, id[..8].dimmed())
}

fn summary(shown: &[TaskView]) -> String {
    let done = shown.iter().filter(|v| v.task.completed).count();
    let overdue = shown.iter().filter(|v| v.overdue).count();
    format!("{} shown, {} done, {} overdue", shown.len(), done, overdue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use taskboard::{Task, TaskId};

    fn view(deadline: DateTime<Utc>, completed: bool, now: DateTime<Utc>) -> TaskView {
        let task = Task {
            title: "Buy groceries for week".to_string(),
            description: "Milk eggs bread cheese and other weekly essentials needed".to_string(),
            deadline: deadline.to_rfc3339(),
            completed,
            id: TaskId::new(),
        };
        TaskView::new(2, task, now)
    }

    #[test]
    fn test_render_matches_search_text() {
        colored::control::set_override(false);
        let now = Utc::now();

        for view in [
            view(now + Duration::days(1), false, now),
            view(now - Duration::days(1), false, now),
            view(now - Duration::days(1), true, now),
        ] {
            let id = view.task.id.to_string();
            assert_eq!(render(&view), format!("  2 {}  {}", view.display_text(), &id[..8]));
        }
    }

    #[test]
    fn test_render_marks_state() {
        colored::control::set_override(false);
        let now = Utc::now();

        assert!(render(&view(now - Duration::days(1), false, now)).contains("Overdue!"));
        assert!(render(&view(now - Duration::days(1), true, now)).contains("[DONE]  Buy groceries"));
    }

    #[test]
    fn test_summary_counts() {
        let now = Utc::now();
        let shown = vec![
            view(now + Duration::days(1), false, now),
            view(now - Duration::days(1), false, now),
            view(now - Duration::days(1), true, now),
        ];
        assert_eq!(summary(&shown), "3 shown, 1 done, 1 overdue");
    }
}
