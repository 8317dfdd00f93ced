//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end.
//! Each invocation is a separate process, so they also cover session
//! resume and the persisted backend.

use std::io::Cursor;

use assert_cmd::Command;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use predicates::prelude::*;
use tempfile::TempDir;

const PASSWORD: &str = "Abc123!@";

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a CLI command with a temporary data directory
fn cli_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("peoplesync").expect("Failed to find peoplesync binary");
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd
}

/// Extract the ID from CLI output (assumes format: "  ID: <id>")
fn extract_id(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("  ID: "))
        .map(|id| id.trim().to_string())
}

/// Sign up the default account in a fresh data directory
fn signed_up() -> TempDir {
    let data_dir = TempDir::new().unwrap();
    cli_cmd(&data_dir)
        .args(["signup", "ada@example.com", PASSWORD, PASSWORD])
        .assert()
        .success();
    data_dir
}

fn add_contact(data_dir: &TempDir, name: &str, email: &str) -> String {
    let output = cli_cmd(data_dir)
        .args(["contact", "add", name, email, "+1 202 555 0101"])
        .output()
        .unwrap();
    assert!(output.status.success());
    extract_id(&String::from_utf8_lossy(&output.stdout)).expect("contact id in output")
}

// ============================================================================
// Session Command Tests
// ============================================================================

#[test]
fn test_signup_and_whoami() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["signup", "ada@example.com", PASSWORD, PASSWORD])
        .assert()
        .success()
        .stdout(predicate::str::contains("Account created: ada@example.com"))
        .stdout(predicate::str::contains("ID:"));

    cli_cmd(&data_dir)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as ada@example.com"));
}

#[test]
fn test_signup_rejects_policy_failure() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["signup", "ada@example.com", "abc12345", "abc12345"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Password must be at least 8 characters",
        ));

    cli_cmd(&data_dir)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));
}

#[test]
fn test_logout_then_login() {
    let data_dir = signed_up();

    cli_cmd(&data_dir)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out."));

    cli_cmd(&data_dir)
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));

    cli_cmd(&data_dir)
        .args(["login", "ada@example.com", "Wrong1!x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Incorrect password. Please try again."));

    cli_cmd(&data_dir)
        .args(["login", "ada@example.com", PASSWORD])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as ada@example.com"));
}

#[test]
fn test_reset_password_unknown_email() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["reset-password", "nobody@example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No user found with this email"));
}

#[test]
fn test_reset_password_known_email() {
    let data_dir = signed_up();

    cli_cmd(&data_dir)
        .args(["reset-password", "ada@example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Password reset email sent"));
}

// ============================================================================
// Contact Command Tests
// ============================================================================

#[test]
fn test_contact_commands_require_session() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["contact", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[test]
fn test_contact_add_and_list() {
    let data_dir = signed_up();
    add_contact(&data_dir, "Grace Hopper", "grace@example.com");

    cli_cmd(&data_dir)
        .args(["contact", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All Contacts (1):"))
        .stdout(predicate::str::contains("Grace Hopper"));

    cli_cmd(&data_dir)
        .args(["contact", "list", "--search", "nobody"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No contacts found."))
        .stdout(predicate::str::contains("Try adjusting your search terms."));
}

#[test]
fn test_contact_add_validation_failure() {
    let data_dir = signed_up();

    cli_cmd(&data_dir)
        .args(["contact", "add", "Grace", "not-an-email", "555"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please enter a valid email address"))
        .stderr(predicate::str::contains("Please enter a valid phone number"));
}

#[test]
fn test_contact_status_tabs() {
    let data_dir = signed_up();
    let id = add_contact(&data_dir, "Grace Hopper", "grace@example.com");

    cli_cmd(&data_dir)
        .args(["contact", "edit", &id, "--status", "inactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated contact"));

    cli_cmd(&data_dir)
        .args(["contact", "list", "--category", "inactive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Inactive Contacts (1):"))
        .stdout(predicate::str::contains("Grace Hopper"));

    cli_cmd(&data_dir)
        .args(["contact", "list", "--category", "active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Active Contacts (0):"))
        .stdout(predicate::str::contains("Get started by adding a new contact."));
}

#[test]
fn test_contact_edit_keeps_unchanged_fields() {
    let data_dir = signed_up();
    let id = add_contact(&data_dir, "Grace Hopper", "grace@example.com");

    cli_cmd(&data_dir)
        .args(["contact", "edit", &id, "--role", "Admiral"])
        .assert()
        .success();

    cli_cmd(&data_dir)
        .args(["contact", "list", "--search", "admiral"])
        .assert()
        .success()
        .stdout(predicate::str::contains("grace@example.com"));
}

#[test]
fn test_contact_delete() {
    let data_dir = signed_up();
    let id = add_contact(&data_dir, "Grace Hopper", "grace@example.com");

    cli_cmd(&data_dir)
        .args(["contact", "delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Deleted contact: {}", id)));

    cli_cmd(&data_dir)
        .args(["contact", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All Contacts (0):"));
}

#[test]
fn test_contacts_are_per_account() {
    let data_dir = signed_up();
    add_contact(&data_dir, "Grace Hopper", "grace@example.com");

    cli_cmd(&data_dir).arg("logout").assert().success();
    cli_cmd(&data_dir)
        .args(["signup", "alan@example.com", PASSWORD, PASSWORD])
        .assert()
        .success();

    cli_cmd(&data_dir)
        .args(["contact", "list", "--category", "all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Contacts (0):"))
        .stdout(predicate::str::contains("Grace Hopper").not());
}

#[test]
fn test_dashboard() {
    let data_dir = signed_up();
    add_contact(&data_dir, "Grace Hopper", "grace@example.com");
    add_contact(&data_dir, "Alan Turing", "alan@example.com");

    cli_cmd(&data_dir)
        .arg("dashboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total contacts: 2"))
        .stdout(predicate::str::contains("Active: 2"))
        .stdout(predicate::str::contains("Added this month: 2"));
}

// ============================================================================
// Profile Command Tests
// ============================================================================

#[test]
fn test_profile_set_name_survives_logout() {
    let data_dir = signed_up();

    cli_cmd(&data_dir)
        .args(["profile", "set-name", "Ada L."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved display_name"));

    cli_cmd(&data_dir).arg("logout").assert().success();
    cli_cmd(&data_dir)
        .args(["login", "ada@example.com", PASSWORD])
        .assert()
        .success();

    cli_cmd(&data_dir)
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: Ada L."))
        .stdout(predicate::str::contains("Email: ada@example.com"));
}

#[test]
fn test_profile_set_avatar() {
    let data_dir = signed_up();

    let img = ImageBuffer::from_fn(600, 300, |x, _| Rgb([(x % 256) as u8, 10, 10]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    let path = data_dir.path().join("me.png");
    std::fs::write(&path, bytes).unwrap();

    cli_cmd(&data_dir)
        .args(["profile", "set-avatar"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved avatar_image"));

    cli_cmd(&data_dir)
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Avatar: image/jpeg"));
}

#[test]
fn test_profile_set_avatar_rejects_unsupported_type() {
    let data_dir = signed_up();
    let path = data_dir.path().join("notes.txt");
    std::fs::write(&path, b"hello").unwrap();

    cli_cmd(&data_dir)
        .args(["profile", "set-avatar"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported image type"));
}

#[test]
fn test_change_password_requires_current() {
    let data_dir = signed_up();

    cli_cmd(&data_dir)
        .args([
            "profile",
            "change-password",
            "--new",
            "Xyz789!@",
            "--confirm",
            "Xyz789!@",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Please enter your current password to change it.",
        ));
}

#[test]
fn test_change_password_then_login() {
    let data_dir = signed_up();

    cli_cmd(&data_dir)
        .args([
            "profile",
            "change-password",
            "--current",
            PASSWORD,
            "--new",
            "Xyz789!@",
            "--confirm",
            "Xyz789!@",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved password"));

    cli_cmd(&data_dir).arg("logout").assert().success();
    cli_cmd(&data_dir)
        .args(["login", "ada@example.com", PASSWORD])
        .assert()
        .failure();
    cli_cmd(&data_dir)
        .args(["login", "ada@example.com", "Xyz789!@"])
        .assert()
        .success();
}
