//! coursecache - command-line sync client for the learning platform.
//!
//! Pulls courses, modules, content, assignments and progress into the
//! in-memory cache and prints what it found. Identity and endpoint come from
//! the environment (or a `.env` file).

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coursecache_core::models::{ContentProgressUpdate, User, UserRole};
use coursecache_core::{ApiClient, AuthState, Config, SessionContext};

/// Log file name prefix inside `--log-dir`
const LOG_FILE_PREFIX: &str = "coursecache.log";

#[derive(Parser)]
#[command(name = "coursecache", version, about = "Sync learning-platform data into a local cache")]
struct Cli {
    /// Config file (defaults to <config dir>/coursecache/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Bearer token for the API
    #[arg(long, env = "COURSECACHE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Id of the signed-in user
    #[arg(long, env = "COURSECACHE_USER_ID")]
    user_id: Option<i64>,

    #[arg(long, env = "COURSECACHE_ROLE", default_value = "student")]
    role: UserRole,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the courses visible to the current user
    Courses,
    /// Sync one course: modules, content, progress and assignments
    Course { id: i64 },
    /// Show overall progress and recent activity
    Progress,
    /// Mark a content item completed
    Complete { content_id: i64 },
    /// Print the effective configuration
    Config,
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`). With a log
/// directory, a non-blocking daily rolling file is added; the returned guard
/// must be held until exit so buffered lines are flushed.
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_dir.as_deref())?;
    info!("coursecache starting");

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .apply_env()?;

    if matches!(cli.command, Command::Config) {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut client = ApiClient::new(&config).context("Failed to build API client")?;
    if let Some(token) = cli.token.as_deref() {
        client.set_token(token);
    }
    let auth = match cli.user_id {
        Some(id) => AuthState::with_user(User::with_role(id, cli.role)),
        None => AuthState::new(),
    };
    let ctx = SessionContext::new(Arc::new(client), auth, config);

    let result = run(&ctx, cli.command).await;
    ctx.join_background().await;

    if let Some(message) = ctx.last_error() {
        warn!(error = %message, "Last operation failed");
    }
    info!("coursecache shutting down");
    result
}

async fn run(ctx: &SessionContext, command: Command) -> Result<()> {
    match command {
        Command::Courses => list_courses(ctx).await,
        Command::Course { id } => sync_course(ctx, id).await,
        Command::Progress => show_progress(ctx).await,
        Command::Complete { content_id } => complete_content(ctx, content_id).await,
        Command::Config => Ok(()),
    }
}

async fn list_courses(ctx: &SessionContext) -> Result<()> {
    let courses = if ctx.auth().is_admin() {
        ctx.courses().fetch_all().await
    } else {
        ctx.courses().fetch_enrolled().await
    }
    .context("Failed to load courses")?;

    for course in &courses {
        println!(
            "{:>5}  {}  ({} students, {} teachers)",
            course.id,
            course.display_title(),
            course.student_count.unwrap_or(0),
            course.teacher_count.unwrap_or(0)
        );
    }
    println!("{} course(s)", courses.len());
    Ok(())
}

async fn sync_course(ctx: &SessionContext, course_id: i64) -> Result<()> {
    let course = ctx
        .courses()
        .fetch(course_id)
        .await
        .with_context(|| format!("Failed to load course {}", course_id))?;
    let modules = ctx.modules().fetch_for_course(course_id).await?;

    // Module detail loads content and records first views
    for module in &modules {
        if let Err(e) = ctx.modules().fetch(module.id).await {
            warn!(module_id = module.id, error = %e, "Module sync failed");
        }
    }
    let assignments = ctx.assignments().fetch_for_course(course_id).await?;
    ctx.join_background().await;

    println!("{}", course.display_title());
    let progress = ctx.progress();
    for module in ctx.modules().for_course(course_id) {
        let marker = if progress.is_module_completed(module.id) { "x" } else { " " };
        println!(
            "  [{}] {:>2}. {}  ({} items, {})",
            marker,
            module.order,
            module.title,
            module.content_count.unwrap_or(0),
            module.formatted_duration()
        );
    }

    if let Some(cp) = progress.course_progress(course_id) {
        println!(
            "Progress: {}/{} modules ({:.0}%)",
            cp.completed_modules, cp.total_modules, cp.percentage
        );
    }
    if let Some(next) = progress.next_module(course_id) {
        println!("Next: {}", next.title);
    }
    for assignment in &assignments {
        println!("  due {}  {}", assignment.formatted_due_date(), assignment.title);
    }
    Ok(())
}

async fn show_progress(ctx: &SessionContext) -> Result<()> {
    ctx.progress()
        .fetch_user_progress()
        .await
        .context("Failed to load progress")?;

    println!("Overall: {:.0}%", ctx.progress().overall());
    for record in ctx.progress().activities() {
        println!(
            "  {}  {}",
            record.timestamp.format("%Y-%m-%d %H:%M"),
            record.summary()
        );
    }
    Ok(())
}

async fn complete_content(ctx: &SessionContext, content_id: i64) -> Result<()> {
    // Load the owning module first so completion can cascade
    let item = ctx.modules().fetch_content_item(content_id).await?;
    ctx.modules().fetch(item.module_id).await?;

    let progress = ctx
        .progress()
        .record_content_progress(content_id, ContentProgressUpdate::completed())
        .await?;
    println!(
        "{}: {}",
        item.title,
        if progress.completed { "completed" } else { "viewed" }
    );
    if ctx.progress().is_module_completed(item.module_id) {
        println!("Module {} completed", item.module_id);
    }
    Ok(())
}
