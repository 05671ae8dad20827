//! Integration tests for the `vivid` CLI binary.
//!
//! These run the CLI as a subprocess against in-memory storage, so every
//! invocation starts from an empty store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::process::Command;

const CONFIG_VARS: &[&str] = &[
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_CALLBACK_URL",
    "ADMIN_EMAILS",
    "DATABASE_URL",
    "VIVID_OWNER_EMAIL",
    "DISCORD_WEBHOOK_URL",
    "RECAPTCHA_SECRET_KEY",
    "VIVID_EVENT_LOG",
    "VIVID_PUBLIC_DIR",
    "VIVID_SECURE_COOKIES",
    "PORT",
];

/// Helper: locate the `vivid` binary built by `cargo test`.
fn vivid_bin() -> String {
    let path = env!("CARGO_BIN_EXE_vivid");
    assert!(Path::new(path).exists(), "vivid binary not found at {path}");
    path.to_owned()
}

/// Helper: run vivid with a clean environment plus `vars`, returning
/// (`exit_code`, stdout, stderr).
fn run_with(args: &[&str], vars: &[(&str, &str)]) -> (i32, String, String) {
    let mut cmd = Command::new(vivid_bin());
    cmd.args(args).env("VIVID_STORAGE", "memory");
    for name in CONFIG_VARS {
        cmd.env_remove(name);
    }
    for (name, value) in vars {
        cmd.env(name, value);
    }
    let output = cmd.output().expect("failed to execute vivid");

    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn run(args: &[&str]) -> (i32, String, String) {
    run_with(args, &[])
}

// ── Version & help ───────────────────────────────────────────────────

#[test]
fn test_version_flag() {
    let (code, stdout, _) = run(&["--version"]);
    assert_eq!(code, 0, "vivid --version should exit 0");
    assert!(stdout.contains("vivid"), "version output should contain 'vivid': {stdout}");
}

#[test]
fn test_help_lists_commands() {
    let (code, stdout, _) = run(&["--help"]);
    assert_eq!(code, 0);
    for cmd in ["check-env", "migrate-images", "bans", "users", "stats"] {
        assert!(stdout.contains(cmd), "help should list {cmd}: {stdout}");
    }
}

#[test]
fn test_unknown_subcommand_fails() {
    let (code, _, stderr) = run(&["explode"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("explode"), "stderr should name the bad command: {stderr}");
}

// ── check-env ────────────────────────────────────────────────────────

#[test]
fn test_check_env_reports_missing() {
    let (code, stdout, _) = run_with(&["check-env"], &[("GOOGLE_CLIENT_ID", "client-id")]);
    assert_eq!(code, 1, "missing required vars should exit 1");
    assert!(stdout.contains("NOT SET"), "stdout: {stdout}");
    assert!(stdout.contains("GOOGLE_CLIENT_SECRET"));
    assert!(stdout.contains("client-id"));
}

#[test]
fn test_check_env_all_set_masks_secrets() {
    let (code, stdout, _) = run_with(
        &["check-env"],
        &[
            ("GOOGLE_CLIENT_ID", "client-id"),
            ("GOOGLE_CLIENT_SECRET", "very-secret-value-9876"),
            ("GOOGLE_CALLBACK_URL", "https://shop.example.com/auth/google/callback"),
            ("ADMIN_EMAILS", "boss@example.com"),
        ],
    );
    assert_eq!(code, 0, "stdout: {stdout}");
    assert!(stdout.contains("***9876"));
    assert!(!stdout.contains("very-secret-value"));
    assert!(!stdout.contains("NOT SET"));
}

#[test]
fn test_check_env_postgres_needs_database_url() {
    let (code, stdout, _) = run_with(
        &["check-env"],
        &[
            ("GOOGLE_CLIENT_ID", "client-id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_CALLBACK_URL", "https://shop.example.com/cb"),
            ("ADMIN_EMAILS", "boss@example.com"),
            ("VIVID_STORAGE", "postgres"),
        ],
    );
    assert_eq!(code, 1);
    assert!(stdout.contains("DATABASE_URL"));
}

// ── Store commands ───────────────────────────────────────────────────

#[test]
fn test_stats_on_empty_store() {
    let (code, stdout, stderr) = run(&["stats", "--json"]);
    assert_eq!(code, 0, "stderr: {stderr}");
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["usersCount"], 0);
    assert_eq!(stats["productsCount"], 0);
    assert!(stderr.contains("in-memory"), "memory storage should warn: {stderr}");
}

#[test]
fn test_bans_list_empty() {
    let (code, stdout, _) = run(&["bans", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No bans recorded"));
}

#[test]
fn test_bans_sweep_on_empty_store() {
    let (code, stdout, _) = run(&["bans", "sweep"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Removed 0 expired ban(s)"));
}

#[test]
fn test_unban_missing_record_fails() {
    let (code, _, stderr) = run(&["bans", "unban", "no-such-ban"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no-such-ban"), "stderr: {stderr}");
}

#[test]
fn test_promote_unknown_email_fails() {
    let (code, _, stderr) = run(&["users", "promote", "ghost@example.com"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no user with email ghost@example.com"), "stderr: {stderr}");
}

#[test]
fn test_demote_owner_refused() {
    let (code, _, stderr) = run_with(
        &["users", "demote", "Owner@Example.com"],
        &[("VIVID_OWNER_EMAIL", "owner@example.com")],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("cannot be demoted"), "stderr: {stderr}");
}

#[test]
fn test_migrate_images_on_empty_store() {
    let (code, stdout, _) = run(&["migrate-images"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("0 migrated, 0 skipped"));
}

#[test]
fn test_unknown_storage_backend_fails() {
    let (code, _, stderr) = run_with(&["stats"], &[("VIVID_STORAGE", "floppy")]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown storage backend"));
}
