use std::path::{Path, PathBuf};
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use farmops_lib::migrate::{self, MigrationStatus};
use farmops_lib::{Config, Database};

#[derive(Parser)]
#[command(name = "migrate", about = "farmops schema migration tool", version)]
struct Cli {
    /// Database url (postgres://… or sqlite:…); defaults to DATABASE_URL
    #[arg(long, value_name = "URL")]
    database_url: Option<String>,

    /// Migrations directory; defaults to FARMOPS_MIGRATIONS_DIR or ./migrations
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Print the plan for `up` without executing it
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending migrations
    Up,
    /// Show how many migrations are applied and the latest one
    Status {
        /// Emit the per-migration plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// List migrations and show applied/pending
    List,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(url) = cli.database_url.clone() {
        config.database_url = Some(url);
    }
    if let Some(dir) = cli.dir.clone() {
        config.migrations_dir = dir;
    }
    let _guard = farmops_lib::init_logging(&config);

    if let Err(err) = run(cli, &config).await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli, config: &Config) -> Result<()> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow!("no database url: pass --database-url or set DATABASE_URL"))?;
    let mut db = Database::connect(url).await?;
    let dir = migrate::resolve_migrations_dir(&config.migrations_dir);

    let result = match cli.cmd {
        Cmd::Up if cli.dry_run => plan(&mut db, dir.as_deref()).await,
        Cmd::Up => up(&mut db, &config.migrations_dir).await,
        Cmd::Status { json } => status(&mut db, dir.as_deref(), json).await,
        Cmd::List => list(&mut db, dir.as_deref()).await,
    };
    db.close().await;
    result
}

async fn up(db: &mut Database, relative: &Path) -> Result<()> {
    let report = migrate::run_pending(db, relative)
        .await
        .context("migration run failed; the database schema is not up to date")?;

    if report.applied.is_empty() && report.unrecorded.is_empty() {
        println!("Nothing to apply.");
    }
    for name in &report.applied {
        println!("applied   {name}");
    }
    for name in &report.unrecorded {
        println!("unrecorded {name} (statements ran; ledger write failed, will re-run)");
    }
    println!(
        "Applied: {}, skipped: {}, tolerated statements: {}",
        report.applied.len(),
        report.skipped.len(),
        report.tolerated
    );
    Ok(())
}

async fn plan(db: &mut Database, dir: Option<&Path>) -> Result<()> {
    let pending: Vec<MigrationStatus> = migrate::plan_migrations(db, dir)
        .await?
        .into_iter()
        .filter(|m| !m.applied)
        .collect();
    if pending.is_empty() {
        println!("Nothing to apply.");
        return Ok(());
    }
    println!("Plan (up):");
    for m in &pending {
        println!("  {}", m.name);
    }
    Ok(())
}

async fn status(db: &mut Database, dir: Option<&Path>, json: bool) -> Result<()> {
    let all = migrate::plan_migrations(db, dir).await?;
    if json {
        let out = serde_json::to_string_pretty(&all).context("serialize migration status")?;
        println!("{out}");
        return Ok(());
    }
    let applied_count = all.iter().filter(|m| m.applied).count();
    let head = all
        .iter()
        .rev()
        .find(|m| m.applied)
        .map(|m| m.name.as_str())
        .unwrap_or("<none>");
    println!("Applied: {}/{}", applied_count, all.len());
    println!("Head: {head}");
    Ok(())
}

async fn list(db: &mut Database, dir: Option<&Path>) -> Result<()> {
    for m in migrate::plan_migrations(db, dir).await? {
        let state = if m.applied { "applied" } else { "pending" };
        println!("{:<40}  {}", m.name, state);
    }
    Ok(())
}
