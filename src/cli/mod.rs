#![forbid(unsafe_code)]

use std::io::IsTerminal as _;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser, Subcommand};

use crate::api::http::HttpTaskApi;
use crate::auth::{AuthProvider as _, Session, SessionAuth, User};
use crate::config::{self, Config, ConfigPaths};
use crate::logging;
use crate::output::table::{Table, truncate};
use crate::task::import;
use crate::task::list::{ConfirmedDelete, TaskController};
use crate::task::model::{NewTask, Priority, Task, TaskUpdate};
use crate::task::view::{StatusFilter, TaskCounts, TaskStats};
use crate::tui;

#[derive(Debug, Parser)]
#[command(
    name = "todui",
    version,
    about = "Terminal client for a REST to-do service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "ls")]
    List(ListArgs),
    Add(AddArgs),
    Import(ImportArgs),
    Edit(EditArgs),
    Toggle(IdArgs),
    Show(ShowArgs),
    #[command(alias = "delete")]
    Rm(RmArgs),
    Stats(StatsArgs),
    Login(LoginArgs),
    Logout,
    Whoami,
    Config(ConfigArgs),
    Completion(CompletionArgs),
    Version,
}

#[derive(Debug, Default, Parser)]
pub struct ListArgs {
    /// Case-insensitive search in title and description
    #[arg(short = 'q', long = "query", default_value = "")]
    pub query: String,
    /// all, active or completed (defaults to ui.default_filter)
    #[arg(short = 'f', long = "filter")]
    pub filter: Option<StatusFilter>,
    /// Show description and timestamps
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    /// Output in JSON format
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,
    /// Output in CSV format
    #[arg(long = "csv")]
    pub csv: bool,
}

#[derive(Debug, Parser)]
pub struct AddArgs {
    pub title: String,
    #[arg(short = 'd', long = "description")]
    pub description: Option<String>,
    /// low, medium or high
    #[arg(short = 'p', long = "priority")]
    pub priority: Option<Priority>,
    /// Due date (YYYY-MM-DD)
    #[arg(long = "due")]
    pub due: Option<String>,
    #[arg(short = 'c', long = "category")]
    pub category: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// YAML or JSON task file
    pub file: PathBuf,
}

#[derive(Debug, Parser)]
pub struct EditArgs {
    pub id: i64,
    #[arg(long = "title")]
    pub title: Option<String>,
    #[arg(long = "description")]
    pub description: Option<String>,
    #[arg(long = "priority")]
    pub priority: Option<Priority>,
    #[arg(long = "due", conflicts_with = "clear_due")]
    pub due: Option<String>,
    /// Remove the due date
    #[arg(long = "clear-due")]
    pub clear_due: bool,
    #[arg(long = "category", conflicts_with = "clear_category")]
    pub category: Option<String>,
    /// Remove the category
    #[arg(long = "clear-category")]
    pub clear_category: bool,
}

#[derive(Debug, Parser)]
pub struct IdArgs {
    pub id: i64,
}

#[derive(Debug, Parser)]
pub struct ShowArgs {
    pub id: i64,
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct RmArgs {
    pub id: i64,
    /// Skip the confirmation prompt
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,
}

#[derive(Debug, Parser)]
pub struct StatsArgs {
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct LoginArgs {
    #[arg(long = "user-id")]
    pub user_id: String,
    /// Bearer token issued by the auth service
    #[arg(long = "token")]
    pub token: String,
    #[arg(long = "name")]
    pub name: Option<String>,
    #[arg(long = "email")]
    pub email: Option<String>,
}

#[derive(Debug, Parser)]
pub struct CompletionArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub cmd: ConfigCmd,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    List,
    Set(ConfigSetArgs),
    Get(ConfigGetArgs),
}

#[derive(Debug, Parser)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Parser)]
pub struct ConfigGetArgs {
    pub key: String,
}

pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // These work even with a broken config file.
    let cmd = match cli.cmd {
        Some(Commands::Completion(args)) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "todui", &mut std::io::stdout());
            return Ok(ExitCode::SUCCESS);
        }
        Some(Commands::Config(args)) => return cmd_config(args),
        Some(Commands::Version) => return Ok(cmd_version()),
        other => other,
    };

    let (cfg, paths) = load_cfg().await?;
    let dashboard = cmd.is_none() && tui::is_tty();
    init_logging(&cfg, &paths, dashboard)?;

    match cmd {
        None if dashboard => cmd_dashboard(&cfg).await,
        None => cmd_list(&cfg, ListArgs::default()).await,
        Some(Commands::List(args)) => cmd_list(&cfg, args).await,
        Some(Commands::Add(args)) => cmd_add(&cfg, args).await,
        Some(Commands::Import(args)) => cmd_import(&cfg, args).await,
        Some(Commands::Edit(args)) => cmd_edit(&cfg, args).await,
        Some(Commands::Toggle(args)) => cmd_toggle(&cfg, args).await,
        Some(Commands::Show(args)) => cmd_show(&cfg, args).await,
        Some(Commands::Rm(args)) => cmd_rm(&cfg, args).await,
        Some(Commands::Stats(args)) => cmd_stats(&cfg, args).await,
        Some(Commands::Login(args)) => cmd_login(&cfg, args),
        Some(Commands::Logout) => cmd_logout(&cfg),
        Some(Commands::Whoami) => cmd_whoami(&cfg),
        Some(Commands::Completion(_) | Commands::Config(_) | Commands::Version) => {
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn load_cfg() -> anyhow::Result<(Config, ConfigPaths)> {
    tokio::task::spawn_blocking(config::load).await?
}

fn init_logging(cfg: &Config, paths: &ConfigPaths, dashboard: bool) -> anyhow::Result<()> {
    let file = match cfg.log_path()? {
        Some(p) => Some(p),
        // Keep the alternate screen free of log lines.
        None if dashboard => Some(paths.config_dir().join("todui.log")),
        None => None,
    };
    logging::init(&cfg.log, file.as_deref())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<ExitCode> {
    match args.cmd {
        ConfigCmd::List => {
            print!("{}", config::list_resolved_toml()?);
        }
        ConfigCmd::Set(set) => {
            config::set_value_string(&set.key, &set.value)?;
            println!("Set {} = {}", set.key, set.value);
        }
        ConfigCmd::Get(get) => match config::get_value_string(&get.key)? {
            Some(v) => println!("{v}"),
            None => anyhow::bail!(
                "configuration key '{}' not found - use 'todui config list' to see available keys",
                get.key
            ),
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn load_auth(cfg: &Config) -> anyhow::Result<SessionAuth> {
    let path = cfg.session_path()?;
    Ok(SessionAuth::load(path)?)
}

/// Controller for the signed-in user. The task list is not fetched yet.
fn connect(cfg: &Config) -> anyhow::Result<(TaskController<HttpTaskApi>, User)> {
    let auth = load_auth(cfg)?;
    let user = auth.require_user()?.clone();
    let api = HttpTaskApi::new(
        &cfg.api.base_url,
        auth.token().map(str::to_owned),
        cfg.timeout(),
    )?;
    tracing::debug!(user_id = %user.id, base_url = %api.base_url(), "connected");
    Ok((TaskController::new(api, user.id.clone()), user))
}

async fn connect_loaded(cfg: &Config) -> anyhow::Result<TaskController<HttpTaskApi>> {
    let (mut controller, _user) = connect(cfg)?;
    controller.load().await?;
    Ok(controller)
}

async fn cmd_dashboard(cfg: &Config) -> anyhow::Result<ExitCode> {
    let (controller, user) = connect(cfg)?;
    tui::dashboard::run(controller, &cfg.ui, &user_label(&user)).await?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_list(cfg: &Config, args: ListArgs) -> anyhow::Result<ExitCode> {
    let controller = connect_loaded(cfg).await?;
    let filter = args.filter.unwrap_or_else(|| cfg.default_filter());
    let view = controller.list().view(&args.query, filter);

    if args.json {
        let out = serde_json::json!({
            "tasks": view.visible,
            "counts": view.counts,
        });
        let mut s = serde_json::to_string_pretty(&out)?;
        s.push('\n');
        print!("{s}");
        return Ok(ExitCode::SUCCESS);
    }

    if args.csv {
        let mut t = Table::new([
            "id",
            "title",
            "status",
            "priority",
            "due_date",
            "category",
            "created_at",
        ]);
        for task in &view.visible {
            t.row([
                task.id.to_string(),
                task.title.clone(),
                status_str(task).to_owned(),
                task.priority.to_string(),
                task.due_date.clone().unwrap_or_default(),
                task.category.clone().unwrap_or_default(),
                task.created_at.clone(),
            ]);
        }
        t.print_csv()?;
        return Ok(ExitCode::SUCCESS);
    }

    if view.is_empty_list() {
        println!("No tasks yet.");
    } else if view.has_no_matches() {
        println!("No tasks match.");
    } else {
        let mut t = if args.verbose {
            Table::new([
                "ID",
                "",
                "TITLE",
                "PRIORITY",
                "DUE",
                "CATEGORY",
                "DESCRIPTION",
                "CREATED",
            ])
        } else {
            Table::new(["ID", "", "TITLE", "PRIORITY", "DUE", "CATEGORY"])
        }
        .align_right(0);

        for task in &view.visible {
            let mut row = vec![
                task.id.to_string(),
                status_mark(task, cfg.ui.icons).to_owned(),
                truncate(&task.title, 50),
                task.priority.to_string(),
                task.due().map_or_else(|| "-".to_owned(), |d| d.to_string()),
                task.category.clone().unwrap_or_else(|| "-".to_owned()),
            ];
            if args.verbose {
                row.push(if task.description.is_empty() {
                    "-".to_owned()
                } else {
                    truncate(&task.description, 60)
                });
                row.push(format_created(&task.created_at));
            }
            t.row(row);
        }
        t.print()?;
    }

    println!();
    println!("{}", format_counts(view.counts));
    Ok(ExitCode::SUCCESS)
}

async fn cmd_add(cfg: &Config, args: AddArgs) -> anyhow::Result<ExitCode> {
    let (mut controller, _user) = connect(cfg)?;
    let new = NewTask {
        title: args.title,
        description: args.description.unwrap_or_default(),
        priority: args.priority,
        due_date: args.due,
        category: args.category,
    };
    let task = controller.create(new).await?;
    println!("Created task #{}: {}", task.id, task.title);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_import(cfg: &Config, args: ImportArgs) -> anyhow::Result<ExitCode> {
    let entries = import::load_task_file(&args.file)
        .with_context(|| format!("failed to import {}", args.file.display()))?;
    if entries.is_empty() {
        println!("No tasks in {}.", args.file.display());
        return Ok(ExitCode::SUCCESS);
    }

    let (mut controller, _user) = connect(cfg)?;
    let total = entries.len();
    let mut failed = 0usize;
    for new in entries {
        let title = new.title.clone();
        match controller.create(new).await {
            Ok(task) => println!("  ✓ #{} {}", task.id, task.title),
            Err(e) => {
                failed += 1;
                eprintln!("  ✗ {}: {}", title.trim(), e.user_message());
            }
        }
    }

    println!("Imported {} of {total} task(s).", total - failed);
    if failed > 0 {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_edit(cfg: &Config, args: EditArgs) -> anyhow::Result<ExitCode> {
    let due_date = if args.clear_due {
        Some(None)
    } else {
        args.due.map(Some)
    };
    let fields = TaskUpdate {
        title: args.title,
        description: args.description,
        completed: None,
        priority: args.priority,
        due_date,
        category: if args.clear_category {
            Some(None)
        } else {
            args.category.map(Some)
        },
    };
    if fields.is_empty() {
        anyhow::bail!("nothing to update - pass at least one field to change");
    }

    let mut controller = connect_loaded(cfg).await?;
    let task = controller.update(args.id, fields).await?;
    println!("Updated task #{}: {}", task.id, task.title);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_toggle(cfg: &Config, args: IdArgs) -> anyhow::Result<ExitCode> {
    let mut controller = connect_loaded(cfg).await?;
    let task = controller.toggle(args.id).await?;
    println!(
        "Task #{} marked as {}: {}",
        task.id,
        status_str(task),
        task.title
    );
    Ok(ExitCode::SUCCESS)
}

async fn cmd_show(cfg: &Config, args: ShowArgs) -> anyhow::Result<ExitCode> {
    let controller = connect_loaded(cfg).await?;
    let task = controller
        .list()
        .get(args.id)
        .ok_or(crate::error::TodoError::TaskNotFound(args.id))?;

    if args.json {
        let mut s = serde_json::to_string_pretty(task)?;
        s.push('\n');
        print!("{s}");
        return Ok(ExitCode::SUCCESS);
    }
    print_task_details(cfg, task);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_rm(cfg: &Config, args: RmArgs) -> anyhow::Result<ExitCode> {
    let mut controller = connect_loaded(cfg).await?;
    let task = controller
        .list()
        .get(args.id)
        .ok_or(crate::error::TodoError::TaskNotFound(args.id))?;

    if !args.yes && cfg.ui.confirm_delete {
        if !std::io::stdin().is_terminal() {
            anyhow::bail!("refusing to delete without confirmation - pass --yes");
        }
        if !confirm_delete(task)? {
            println!("Cancelled.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let removed = controller.delete(ConfirmedDelete::new(args.id)).await?;
    println!("Deleted task #{}: {}", removed.id, removed.title);
    Ok(ExitCode::SUCCESS)
}

fn confirm_delete(task: &Task) -> anyhow::Result<bool> {
    println!("Task #{}: {}", task.id, task.title);
    print!("Are you sure you want to delete this task? (y/N): ");
    std::io::Write::flush(&mut std::io::stdout())?;
    let mut input = String::new();
    let _ = std::io::stdin().read_line(&mut input)?;
    let resp = input.trim().to_lowercase();
    Ok(resp == "y" || resp == "yes")
}

async fn cmd_stats(cfg: &Config, args: StatsArgs) -> anyhow::Result<ExitCode> {
    let controller = connect_loaded(cfg).await?;
    let today = time::OffsetDateTime::now_utc().date();
    let stats = TaskStats::compute(controller.list().tasks(), today);

    if args.json {
        let mut s = serde_json::to_string_pretty(&stats)?;
        s.push('\n');
        print!("{s}");
        return Ok(ExitCode::SUCCESS);
    }

    println!("Total:     {}", stats.total);
    println!(
        "Completed: {} ({}%)",
        stats.completed, stats.completion_rate
    );
    println!("Active:    {}", stats.active);
    println!("Overdue:   {}", stats.overdue);
    println!();
    println!("Active by priority:");
    for p in Priority::ALL {
        println!("  {:<8}{}", p.as_str(), stats.by_priority.get(p));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_login(cfg: &Config, args: LoginArgs) -> anyhow::Result<ExitCode> {
    let path = cfg.session_path()?;
    let session = Session {
        token: args.token.trim().to_owned(),
        user: User {
            id: args.user_id.trim().to_owned(),
            name: args.name.unwrap_or_default(),
            email: args.email.unwrap_or_default(),
        },
    };
    let auth = SessionAuth::login(path, session)?;
    if let Some(user) = auth.user() {
        println!("Logged in as {}", user_label(user));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_logout(cfg: &Config) -> anyhow::Result<ExitCode> {
    let mut auth = load_auth(cfg)?;
    if !auth.is_authenticated() {
        println!("Not logged in.");
        return Ok(ExitCode::SUCCESS);
    }
    auth.logout()?;
    println!("Logged out.");
    Ok(ExitCode::SUCCESS)
}

fn cmd_whoami(cfg: &Config) -> anyhow::Result<ExitCode> {
    let auth = load_auth(cfg)?;
    let user = auth.require_user()?;
    println!("User:    {}", user.id);
    if !user.name.is_empty() {
        println!("Name:    {}", user.name);
    }
    if !user.email.is_empty() {
        println!("Email:   {}", user.email);
    }
    println!("API:     {}", cfg.api.base_url);
    println!("Session: {}", config::tilde_path(auth.path()));
    Ok(ExitCode::SUCCESS)
}

fn cmd_version() -> ExitCode {
    println!("todui version {}", env!("CARGO_PKG_VERSION"));
    if let Some(commit) = option_env!("TODUI_GIT_COMMIT") {
        println!("  commit: {commit}");
    }
    println!("  rust: {}", rustc_version_runtime::version());
    println!(
        "  os/arch: {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    ExitCode::SUCCESS
}

fn print_task_details(cfg: &Config, task: &Task) {
    println!(
        "{} #{} {}",
        status_mark(task, cfg.ui.icons),
        task.id,
        task.title
    );
    println!("  Status:   {}", status_str(task));
    println!("  Priority: {}", task.priority);
    if let Some(due) = task.due() {
        let today = time::OffsetDateTime::now_utc().date();
        let overdue = if task.is_overdue(today) {
            " (overdue)"
        } else {
            ""
        };
        println!("  Due:      {due}{overdue}");
    }
    if let Some(cat) = &task.category {
        println!("  Category: {cat}");
    }
    println!("  Created:  {}", format_created(&task.created_at));
    println!("  Updated:  {}", format_created(&task.updated_at));
    if !task.description.is_empty() {
        println!();
        for line in task.description.lines() {
            println!("  {line}");
        }
    }
}

fn user_label(user: &User) -> String {
    if user.name.trim().is_empty() {
        user.id.clone()
    } else {
        user.name.clone()
    }
}

fn status_str(task: &Task) -> &'static str {
    if task.completed {
        "completed"
    } else {
        "active"
    }
}

fn status_mark(task: &Task, icons: bool) -> &'static str {
    match (icons, task.completed) {
        (true, true) => "✓",
        (true, false) => "○",
        (false, true) => "[x]",
        (false, false) => "[ ]",
    }
}

fn format_counts(counts: TaskCounts) -> String {
    StatusFilter::TABS
        .iter()
        .map(|f| format!("{} ({})", f.label(), counts.get(*f)))
        .collect::<Vec<_>>()
        .join("  ")
}

fn format_created(ts: &str) -> String {
    let Ok(t) = time::OffsetDateTime::parse(ts, &time::format_description::well_known::Rfc3339)
    else {
        return if ts.is_empty() {
            "-".to_owned()
        } else {
            ts.to_owned()
        };
    };
    let fmt = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
    t.format(&fmt).unwrap_or_else(|_| ts.to_owned())
}
