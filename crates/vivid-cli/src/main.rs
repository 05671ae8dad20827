//! `vivid`: operator CLI for the Vivid Vision storefront.
//!
//! Works directly against the document store, selected with the same
//! `VIVID_STORAGE` / `DATABASE_URL` variables as the server.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod env_check;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use vivid_core::access::AccessPolicy;
use vivid_core::ban::BanStore;
use vivid_core::catalog::Catalog;
use vivid_core::comment::CommentStore;
use vivid_core::moderation::ContentFilter;
use vivid_core::session::SessionStore;
use vivid_core::stats;
use vivid_core::store::DocumentStore;
use vivid_core::user::UserStore;
use vivid_storage::{MemoryBackend, StorageBackend};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ── CLI structure ────────────────────────────────────────────────────

/// Vivid Vision operator CLI.
#[derive(Parser)]
#[command(
    name = "vivid",
    version,
    about = "Vivid Vision CLI: check configuration, migrate data, manage bans and users",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         VIVID_STORAGE      memory or postgres (default: memory)\n  \
         DATABASE_URL       PostgreSQL connection string\n  \
         ADMIN_EMAILS       Comma-separated super admin emails\n  \
         VIVID_OWNER_EMAIL  Owner account that cannot be demoted\n\n\
         {DIM}Examples:{RESET}\n  \
         vivid check-env\n  \
         vivid bans list\n  \
         vivid users promote someone@example.com"
    ),
)]
struct Cli {
    /// Storage backend.
    #[arg(long, env = "VIVID_STORAGE", default_value = "memory")]
    storage: String,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Comma-separated super admin emails.
    #[arg(long, env = "ADMIN_EMAILS", default_value = "")]
    admin_emails: String,

    /// Owner account that cannot be demoted.
    #[arg(long, env = "VIVID_OWNER_EMAIL")]
    owner_email: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report required and optional environment variables.
    CheckEnv,
    /// Convert products with a single legacy image into the list form.
    MigrateImages,
    /// Ban records.
    Bans {
        #[command(subcommand)]
        action: BanCommands,
    },
    /// User accounts.
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Store statistics.
    Stats {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BanCommands {
    /// List ban records, newest first.
    List,
    /// Delete expired temporary bans and expired sessions.
    Sweep,
    /// Lift a ban by record ID.
    Unban {
        /// Ban record ID.
        id: String,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List users, newest first.
    List {
        /// Filter by name or email substring.
        #[arg(long)]
        search: Option<String>,
        /// Page number (1-based).
        #[arg(long, default_value = "1")]
        page: usize,
        /// Page size.
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Grant the stored admin flag.
    Promote {
        /// Account email.
        email: String,
    },
    /// Revoke the stored admin flag.
    Demote {
        /// Account email.
        email: String,
    },
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(icon: &str, title: &str) {
    println!("{BOLD}{CYAN}{icon} {title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<20}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

fn short_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M UTC").to_string()
}

// ── Storage ──────────────────────────────────────────────────────────

async fn open_store(cli: &Cli) -> Result<DocumentStore> {
    let backend: Arc<dyn StorageBackend> = match cli.storage.to_lowercase().as_str() {
        "memory" => {
            eprintln!("{DIM}using in-memory storage: changes will not persist{RESET}");
            Arc::new(MemoryBackend::new())
        }
        "postgres" | "postgresql" => open_postgres(cli.database_url.as_deref()).await?,
        other => bail!("unknown storage backend '{other}' (expected memory or postgres)"),
    };
    Ok(DocumentStore::new(backend))
}

#[cfg(feature = "postgres-backend")]
async fn open_postgres(url: Option<&str>) -> Result<Arc<dyn StorageBackend>> {
    let url = url.context("DATABASE_URL is required for postgres storage")?;
    let backend = vivid_storage::PostgresBackend::connect(url)
        .await
        .context("failed to connect to PostgreSQL storage")?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "postgres-backend"))]
async fn open_postgres(_url: Option<&str>) -> Result<Arc<dyn StorageBackend>> {
    bail!("PostgreSQL backend requested but feature 'postgres-backend' is not enabled")
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::CheckEnv => return Ok(cmd_check_env()),
        Commands::MigrateImages => cmd_migrate_images(open_store(cli).await?).await?,
        Commands::Bans { action } => cmd_bans(open_store(cli).await?, action).await?,
        Commands::Users { action } => {
            let policy = AccessPolicy::from_list(&cli.admin_emails, cli.owner_email.as_deref());
            cmd_users(open_store(cli).await?, &policy, action).await?;
        }
        Commands::Stats { json } => cmd_stats(open_store(cli).await?, *json).await?,
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_check_env() -> ExitCode {
    let report = env_check::check(|name| std::env::var(name).ok());

    println!();
    header("🔍", "Environment Check");
    println!();
    println!("  {BOLD}Required{RESET}");
    for var in &report.required {
        match &var.display {
            Some(value) => println!("  {GREEN}✓{RESET} {:<24} {value}", var.name),
            None => println!("  {RED}✗{RESET} {:<24} {RED}NOT SET{RESET}", var.name),
        }
    }
    println!();
    println!("  {BOLD}Optional{RESET}");
    for var in &report.optional {
        match &var.display {
            Some(value) => println!("  {GREEN}✓{RESET} {:<24} {value}", var.name),
            None => println!("  {DIM}-{RESET} {:<24} {DIM}not set{RESET}", var.name),
        }
    }
    println!();

    let missing = report.missing();
    if missing.is_empty() {
        success("All required variables are set");
        ExitCode::SUCCESS
    } else {
        warning(&format!("Missing required variables: {}", missing.join(", ")));
        ExitCode::FAILURE
    }
}

async fn cmd_migrate_images(store: DocumentStore) -> Result<()> {
    let report = Catalog::new(store)
        .migrate_legacy_images()
        .await
        .context("image migration failed")?;

    header("🖼", "Image Migration");
    for name in &report.migrated {
        println!("  {GREEN}✓{RESET} {name}");
    }
    for name in &report.skipped {
        println!("  {DIM}- {name} (already migrated){RESET}");
    }
    success(&format!(
        "{} migrated, {} skipped",
        report.migrated.len(),
        report.skipped.len()
    ));
    Ok(())
}

async fn cmd_bans(store: DocumentStore, action: &BanCommands) -> Result<()> {
    let bans = BanStore::new(store.clone());
    match action {
        BanCommands::List => {
            let records = bans.list().await.context("failed to list bans")?;
            header("🚫", "Bans");
            if records.is_empty() {
                println!("  {DIM}No bans recorded{RESET}");
                return Ok(());
            }
            let now = Utc::now();
            for record in &records {
                let state = if record.is_active_at(now) { "active" } else { "expired" };
                let expiry = record
                    .expires_at
                    .map_or_else(|| "never".to_owned(), short_time);
                println!(
                    "  {BOLD}{}{RESET}  {}  {}  {state}",
                    record.id, record.user.email, record.ban_type
                );
                kv_line("reason", &record.reason);
                kv_line("banned by", &record.banned_by);
                kv_line("banned at", &short_time(record.banned_at));
                kv_line("expires", &expiry);
                if let Some(status) = record.appeal_status {
                    kv_line("appeal", &format!("{status:?}").to_lowercase());
                }
            }
            println!();
            println!("  {DIM}{} record(s){RESET}", records.len());
        }
        BanCommands::Sweep => {
            let now = Utc::now();
            let removed = bans.sweep_expired(now).await.context("ban sweep failed")?;
            let sessions = SessionStore::new(store, chrono::Duration::zero())
                .sweep_expired(now)
                .await
                .context("session sweep failed")?;
            success(&format!(
                "Removed {removed} expired ban(s) and {sessions} expired session(s)"
            ));
        }
        BanCommands::Unban { id } => {
            let record = bans
                .unban(id)
                .await
                .with_context(|| format!("failed to lift ban {id}"))?;
            success(&format!("Ban lifted for {}", record.user.email));
        }
    }
    Ok(())
}

async fn cmd_users(
    store: DocumentStore,
    policy: &AccessPolicy,
    action: &UserCommands,
) -> Result<()> {
    let users = UserStore::new(store);
    match action {
        UserCommands::List {
            search,
            page,
            limit,
        } => {
            let listing = users
                .list(search.as_deref(), *page, *limit)
                .await
                .context("failed to list users")?;
            header("👤", "Users");
            for user in &listing.items {
                let admin = if user.is_admin { " (admin)" } else { "" };
                println!("  {BOLD}{}{RESET}{admin}  {}  {}", user.email, user.name, user.id);
                if let Some(at) = user.last_login_at {
                    kv_line("last login", &short_time(at));
                }
            }
            println!();
            println!(
                "  {DIM}{} shown, {} total{RESET}",
                listing.items.len(),
                listing.total
            );
        }
        UserCommands::Promote { email } => {
            let user = users
                .find_by_email(email)
                .await?
                .with_context(|| format!("no user with email {email}"))?;
            users.set_admin(&user.id, true).await?;
            success(&format!("{email} is now an admin"));
        }
        UserCommands::Demote { email } => {
            if policy.is_protected(email) {
                bail!("{email} is the owner and cannot be demoted");
            }
            let user = users
                .find_by_email(email)
                .await?
                .with_context(|| format!("no user with email {email}"))?;
            users.set_admin(&user.id, false).await?;
            success(&format!("{email} is no longer an admin"));
            if policy.is_super_admin(email) {
                warning("This email is listed in ADMIN_EMAILS and keeps admin rights");
            }
        }
    }
    Ok(())
}

async fn cmd_stats(store: DocumentStore, json: bool) -> Result<()> {
    let users = UserStore::new(store.clone());
    let catalog = Catalog::new(store.clone());
    let filter = ContentFilter::new().context("failed to compile content filter")?;
    let comments = CommentStore::new(store, catalog.clone(), filter);

    let stats = stats::collect(&users, &catalog, &comments, Utc::now())
        .await
        .context("failed to collect statistics")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    header("📊", "Statistics");
    kv_line("users", &stats.users_count.to_string());
    kv_line("products", &stats.products_count.to_string());
    kv_line("comments", &stats.comments_count.to_string());
    kv_line("new users (7 days)", &stats.recent_users.to_string());
    Ok(())
}
