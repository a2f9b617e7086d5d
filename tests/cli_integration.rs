//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test.
fn waymark() -> Command {
    Command::cargo_bin("waymark").unwrap()
}

/// A project with one phase, one executed plan and a local config that keeps
/// sessions inside the fixture.
fn project() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    let sessions = temp.path().join("sessions");

    temp.child(".waymark.toml")
        .write_str(&format!("[verify]\nsessions_dir = '{}'\n", sessions.display()))
        .unwrap();
    temp.child(".planning/ROADMAP.md")
        .write_str("# Roadmap: Shop\n\n## Phases\n\n- [ ] **Phase 1: Foundation** - Base layout\n")
        .unwrap();
    temp.child(".planning/STATE.md")
        .write_str("## Current Position\n\nPhase: 1 of 1 (Foundation)\nProgress: [████░░░░░░] 40%\n")
        .unwrap();
    temp.child(".planning/phases/01-foundation/01-01-PLAN.md")
        .write_str("<objective>\nLay out the shop\n</objective>\n")
        .unwrap();
    temp.child(".planning/phases/01-foundation/01-01-SUMMARY.md")
        .write_str("## Accomplishments\n\n- Product list\n- Cart badge\n- Checkout button\n")
        .unwrap();
    temp
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    waymark()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("manual verification"));
}

#[test]
fn test_version_flag() {
    waymark()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_verify_help() {
    waymark()
        .args(["verify", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("start").and(predicate::str::contains("severity")));
}

#[test]
fn test_completions() {
    waymark().args(["completions", "bash"]).assert().success().stdout(predicate::str::contains("waymark"));
}

// ============================================================================
// Status & Next Tests
// ============================================================================

#[test]
fn test_status_text() {
    let temp = project();

    waymark()
        .arg("status")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase 1 of 1: Foundation"))
        .stdout(predicate::str::contains("Progress: 40%"))
        .stdout(predicate::str::contains("[x] 01-01-PLAN.md"));

    temp.close().unwrap();
}

#[test]
fn test_status_without_planning_dir() {
    let temp = assert_fs::TempDir::new().unwrap();

    waymark()
        .arg("status")
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No planning directory"));

    temp.close().unwrap();
}

#[test]
fn test_next_complete_milestone() {
    let temp = project();

    waymark()
        .args(["next", "--format", "json"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"action\": \"complete_milestone\""));

    temp.close().unwrap();
}

#[test]
fn test_next_execute_plan() {
    let temp = project();
    temp.child(".planning/phases/01-foundation/01-02-PLAN.md")
        .write_str("## Objective\n\nAdd payments\n")
        .unwrap();

    waymark()
        .arg("next")
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Execute 01-02-PLAN.md (Add payments)"));

    temp.close().unwrap();
}

// ============================================================================
// Verification Tests
// ============================================================================

#[test]
fn test_verification_flow_records_issue() {
    let temp = project();
    let run = |args: &[&str]| waymark().args(args).current_dir(temp.path()).assert().success();

    run(&["verify", "start", "01-01-PLAN.md"])
        .stdout(predicate::str::contains("3 test(s)"))
        .stdout(predicate::str::contains("Test 1/3: Product list"));
    run(&["verify", "result", "pass"]).stdout(predicate::str::contains("Test 2/3: Cart badge"));
    run(&["verify", "result", "fail"]).stdout(predicate::str::contains("Severity?"));
    run(&["verify", "severity", "major"]).stdout(predicate::str::contains("Test 3/3"));
    run(&["verify", "result", "skip"])
        .stdout(predicate::str::contains("1 passed, 1 failed, 0 partial, 1 skipped"))
        .stdout(predicate::str::contains("UAT-001 [Major] Cart badge"));

    temp.child(".planning/phases/01-foundation/01-01-ISSUES.md")
        .assert(predicate::str::contains("### UAT-001: Cart badge"))
        .assert(predicate::str::contains("**Severity:** Major"));

    run(&["verify", "list"]).stdout(predicate::str::contains("No open verification sessions"));
    run(&["next"]).stdout(predicate::str::contains("Plan fixes for 01-01"));

    temp.close().unwrap();
}

#[test]
fn test_illegal_severity_rejected() {
    let temp = project();

    waymark().args(["verify", "start", "01-01-PLAN.md"]).current_dir(temp.path()).assert().success();
    waymark()
        .args(["verify", "severity", "minor"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no result is awaiting a severity"));
    waymark()
        .args(["verify", "show"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 passed, 0 failed, 0 partial, 0 skipped"));

    temp.close().unwrap();
}

#[test]
fn test_send_ignores_unrelated_message() {
    let temp = project();

    waymark().args(["verify", "start", "01-01-PLAN.md"]).current_dir(temp.path()).assert().success();
    waymark()
        .args(["verify", "send", "one moment please"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ignored"));
    waymark()
        .args(["verify", "send", "pass"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Test 2/3"));

    temp.close().unwrap();
}

#[test]
fn test_result_without_session() {
    let temp = project();

    waymark()
        .args(["verify", "result", "pass"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No open verification session"));

    temp.close().unwrap();
}

#[test]
fn test_abandon_session() {
    let temp = project();

    waymark().args(["verify", "start", "01-01-PLAN.md"]).current_dir(temp.path()).assert().success();
    waymark()
        .args(["verify", "abandon"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Abandoned uat-01-01"));
    temp.child("sessions/uat-01-01.json").assert(predicate::path::missing());

    temp.close().unwrap();
}

/// Same plan numbers as [`project`], no local config, one accomplishment.
fn bare_project(accomplishment: &str) -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(".planning/ROADMAP.md")
        .write_str("## Phases\n\n- [ ] **Phase 1: Foundation** - Base layout\n")
        .unwrap();
    temp.child(".planning/STATE.md").write_str("Phase: 1 of 1 (Foundation)\n").unwrap();
    temp.child(".planning/phases/01-foundation/01-01-PLAN.md").write_str("## Objective\n\nBase\n").unwrap();
    temp.child(".planning/phases/01-foundation/01-01-SUMMARY.md")
        .write_str(&format!("## Accomplishments\n\n- {accomplishment}\n"))
        .unwrap();
    temp
}

#[cfg(unix)]
#[test]
fn test_projects_sharing_data_dir_keep_separate_sessions() {
    let home = assert_fs::TempDir::new().unwrap();
    let alpha = bare_project("Alpha item");
    let beta = bare_project("Beta item");
    let run = |dir: &std::path::Path, args: &[&str]| {
        waymark()
            .args(args)
            .current_dir(dir)
            .env("HOME", home.path())
            .env("XDG_DATA_HOME", home.path().join("data"))
            .env("XDG_CONFIG_HOME", home.path().join("config"))
            .assert()
            .success()
    };

    run(alpha.path(), &["verify", "start", "01-01-PLAN.md"]).stdout(predicate::str::contains("Alpha item"));
    run(beta.path(), &["verify", "start", "01-01-PLAN.md"])
        .stdout(predicate::str::contains("Verifying 01-01-PLAN.md"))
        .stdout(predicate::str::contains("Beta item"))
        .stdout(predicate::str::contains("Alpha item").not());

    run(beta.path(), &["verify", "result", "fail"]);
    run(beta.path(), &["verify", "severity", "minor"]).stdout(predicate::str::contains("UAT-001"));
    beta.child(".planning/phases/01-foundation/01-01-ISSUES.md")
        .assert(predicate::str::contains("### UAT-001: Beta item"));
    alpha
        .child(".planning/phases/01-foundation/01-01-ISSUES.md")
        .assert(predicate::path::missing());

    run(alpha.path(), &["verify", "show"]).stdout(predicate::str::contains("Alpha item"));
}

#[test]
fn test_fix_plan_has_its_own_session() {
    let temp = project();
    temp.child(".planning/phases/01-foundation/01-01-FIX-PLAN.md")
        .write_str("## Objective\n\nFix the cart badge\n")
        .unwrap();
    temp.child(".planning/phases/01-foundation/01-01-FIX-SUMMARY.md")
        .write_str("## Accomplishments\n\n- Cart badge count\n")
        .unwrap();

    waymark().args(["verify", "start", "01-01-PLAN.md"]).current_dir(temp.path()).assert().success();
    waymark()
        .args(["verify", "start", "01-01-FIX-PLAN.md"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Verifying 01-01-FIX-PLAN.md: 1 test(s)"));
    waymark()
        .args(["verify", "list"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("uat-01-01 "))
        .stdout(predicate::str::contains("uat-01-01-fix "));

    temp.close().unwrap();
}
