//! Waymark - next-step routing and manual verification for staged delivery.
//!
//! Reads the planning directory of the current project, recommends the next
//! action, and runs resumable verification sessions for executed plans.

#![allow(clippy::single_match_else)]

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use waymark::verify::{
    AccomplishmentsChecklist, ChecklistRequest, DispatchOutcome, FileSessionStore, IssueRecorder,
    SessionKey, SessionState, Severity, StartOutcome, TestStatus, VerificationSession, Verifier,
};
use waymark::{Config, WorkflowContext};

/// Next-step routing and manual verification for staged project delivery
#[derive(Parser)]
#[command(name = "waymark")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the project state
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Recommend the next action
    Next {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manual verification of executed plans
    Verify {
        #[command(subcommand)]
        operation: VerifyOperation,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(short, long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum VerifyOperation {
    /// Start (or resume) verifying a plan
    Start {
        /// Plan file name or path (e.g. 02-01-PLAN.md)
        plan: String,
    },

    /// Record the result of the current test
    Result {
        /// pass, fail, partial or skip
        status: TestStatus,

        /// Test index (0-based, defaults to the current test)
        #[arg(short, long)]
        index: Option<usize>,

        /// Plan of the session (needed when several sessions are open)
        #[arg(short, long)]
        plan: Option<String>,
    },

    /// Record the severity of a failed or partial test
    Severity {
        /// blocker, major, minor or cosmetic
        severity: Severity,

        /// What went wrong
        #[arg(short, long)]
        description: Option<String>,

        /// Plan of the session
        #[arg(short, long)]
        plan: Option<String>,
    },

    /// Feed a raw message such as "pass" or "severity major"
    Send {
        /// The message
        message: String,

        /// Plan of the session
        #[arg(short, long)]
        plan: Option<String>,
    },

    /// Show a session
    Show {
        /// Plan of the session
        plan: Option<String>,
    },

    /// Record issues for a finished session and close it
    Finish {
        /// Plan of the session
        plan: Option<String>,
    },

    /// Discard a session
    Abandon {
        /// Plan of the session
        plan: Option<String>,
    },

    /// List open sessions
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Status { format } => cmd_status(&format)?,
        Commands::Next { format } => cmd_next(&format)?,
        Commands::Verify { operation } => cmd_verify(operation)?,
        Commands::Config { path } => cmd_config(path)?,
        Commands::Completions { shell } => cmd_completions(shell),
    }

    Ok(())
}

/// Loaded configuration plus the workflow context for the current directory.
struct Workspace {
    config: Config,
    context: WorkflowContext,
    root: PathBuf,
}

impl Workspace {
    fn load() -> Result<Self> {
        let config = Config::load()?;
        let root = std::env::current_dir().context("Could not read current directory")?;
        let context = WorkflowContext::with_config(root.clone(), &config.workflow);
        Ok(Self { config, context, root })
    }

    fn verifier(&self) -> Verifier<FileSessionStore> {
        Verifier::new(FileSessionStore::new(self.config.sessions_dir(&self.root)))
    }
}

/// Show the project state.
fn cmd_status(format: &str) -> Result<()> {
    let ws = Workspace::load()?;
    if !ws.context.is_initialized() {
        anyhow::bail!("No planning directory found at {}", ws.context.planning_dir.display());
    }
    let state = ws.context.project_state();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    if !state.project.is_empty() {
        println!("{}\n", state.project);
    }
    match state.current() {
        Some(phase) => println!(
            "Phase {} of {}: {}{}",
            phase.number,
            state.total_phases,
            phase.name,
            if phase.goal.is_empty() { String::new() } else { format!(" - {}", phase.goal) }
        ),
        None => println!("No current phase"),
    }
    println!("Progress: {}%", state.progress);
    if let Some(milestone) = state.current_milestone() {
        println!("Milestone: {} {}", milestone.number, milestone.name);
    }

    if let Some(phase) = state.current_phase {
        let plans = ws.context.inventory(&state).plans_for(phase);
        if !plans.is_empty() {
            println!("\nPlans:");
            for plan in &plans {
                println!("  [{}] {}", if plan.executed { "x" } else { " " }, plan.file);
            }
        }
    }

    if !state.decisions.is_empty() {
        println!("\nRecent decisions:");
        for decision in &state.decisions {
            println!("  - {decision}");
        }
    }
    if !state.issues.is_empty() {
        println!("\nOpen issues:");
        for issue in &state.issues {
            println!("  - {issue}");
        }
    }
    if let Some(next) = &state.continuity.next {
        println!("\nNext (from state): {next}");
    }

    Ok(())
}

/// Recommend the next action.
fn cmd_next(format: &str) -> Result<()> {
    let ws = Workspace::load()?;
    let (_, action) = ws.context.next_action();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&action)?);
    } else {
        println!("{action}");
    }
    Ok(())
}

/// Handle verification commands.
fn cmd_verify(operation: VerifyOperation) -> Result<()> {
    let ws = Workspace::load()?;
    let verifier = ws.verifier();

    match operation {
        VerifyOperation::Start { plan } => {
            let plan_path = ws
                .context
                .find_plan(&plan)
                .ok_or_else(|| anyhow::anyhow!("Plan '{plan}' not found"))?;
            let plan_path = std::fs::canonicalize(&plan_path).unwrap_or(plan_path);

            let summary = ws.context.summary_for(&plan_path).unwrap_or_default();
            let request = ChecklistRequest {
                accomplishments: summary.accomplishments,
                files: summary.files,
                plan_name: plan.clone(),
            };
            let key = SessionKey::for_plan_file(&plan_path);
            let plan_id = plan_path.to_string_lossy().to_string();

            // Create tokio runtime for the checklist generator
            let rt = tokio::runtime::Runtime::new()?;
            let outcome = rt.block_on(verifier.start_with_generator(
                &AccomplishmentsChecklist,
                &request,
                key,
                &plan_id,
            ))?;

            match outcome {
                StartOutcome::Started(session) => {
                    println!("Verifying {plan}: {} test(s)\n", session.test_items.len());
                    print_prompt(&session);
                }
                StartOutcome::Resumed(session) => {
                    println!("Resuming verification of {plan}\n");
                    print_prompt(&session);
                }
                StartOutcome::NoTestableItems => {
                    println!("No testable items for {plan}.");
                }
            }
        }

        VerifyOperation::Result { status, index, plan } => {
            let key = resolve_key(&ws, &verifier, plan.as_deref())?;
            let index = match index {
                Some(index) => index,
                None => verifier.session(&key)?.current_index,
            };
            let outcome = verifier.apply_result_event(&key, index, status)?;
            after_event(&ws, &verifier, &key, outcome.completed)?;
        }

        VerifyOperation::Severity { severity, description, plan } => {
            let key = resolve_key(&ws, &verifier, plan.as_deref())?;
            let outcome = verifier.apply_severity_event_with_description(&key, severity, description)?;
            after_event(&ws, &verifier, &key, outcome.completed)?;
        }

        VerifyOperation::Send { message, plan } => {
            let key = resolve_key(&ws, &verifier, plan.as_deref())?;
            match verifier.dispatch(&key, &message)? {
                DispatchOutcome::Ignored => println!("Not a verification event, ignored."),
                DispatchOutcome::Result(outcome) => after_event(&ws, &verifier, &key, outcome.completed)?,
                DispatchOutcome::Severity(outcome) => {
                    after_event(&ws, &verifier, &key, outcome.completed)?;
                }
            }
        }

        VerifyOperation::Show { plan } => {
            let key = resolve_key(&ws, &verifier, plan.as_deref())?;
            let session = verifier.session(&key)?;
            println!("Session {} ({})", session.key, session.plan);
            println!("Started: {}\n", session.started_at.format("%Y-%m-%d %H:%M UTC"));
            for (i, item) in session.test_items.iter().enumerate() {
                let mark = session.results.get(i).map_or_else(
                    || if i == session.current_index { ">".to_string() } else { " ".to_string() },
                    |r| r.status.to_string(),
                );
                println!("  [{mark:>7}] {i}. {item}");
            }
            println!("\n{}", session.summary());
        }

        VerifyOperation::Finish { plan } => {
            let key = resolve_key(&ws, &verifier, plan.as_deref())?;
            finish(&ws, &verifier, &key)?;
        }

        VerifyOperation::Abandon { plan } => {
            let key = resolve_key(&ws, &verifier, plan.as_deref())?;
            if verifier.abandon(&key)? {
                println!("Abandoned {key}.");
            } else {
                println!("No session {key}.");
            }
        }

        VerifyOperation::List => {
            let sessions = verifier.list()?;
            if sessions.is_empty() {
                println!("No open verification sessions.");
            }
            for session in sessions {
                println!(
                    "{}  {}/{}  {}",
                    session.key,
                    session.results.len(),
                    session.test_items.len(),
                    session.plan
                );
            }
        }
    }

    Ok(())
}

/// Session key from an explicit plan, or the only open session.
fn resolve_key(
    ws: &Workspace,
    verifier: &Verifier<FileSessionStore>,
    plan: Option<&str>,
) -> Result<SessionKey> {
    if let Some(plan) = plan {
        let path = ws.context.find_plan(plan).unwrap_or_else(|| PathBuf::from(plan));
        let path = std::fs::canonicalize(&path).unwrap_or(path);
        return Ok(SessionKey::for_plan_file(&path));
    }

    let sessions = verifier.list()?;
    match sessions.as_slice() {
        [session] => Ok(session.key.clone()),
        [] => anyhow::bail!("No open verification session. Start one with `waymark verify start <plan>`"),
        _ => anyhow::bail!("Several sessions are open; pass --plan to pick one"),
    }
}

/// Prompt for the next input, or finish the session.
fn after_event(
    ws: &Workspace,
    verifier: &Verifier<FileSessionStore>,
    key: &SessionKey,
    completed: bool,
) -> Result<()> {
    if completed {
        return finish(ws, verifier, key);
    }
    print_prompt(&verifier.session(key)?);
    Ok(())
}

fn print_prompt(session: &VerificationSession) {
    match session.state() {
        SessionState::AwaitingResult { index } => {
            println!("Test {}/{}: {}", index + 1, session.test_items.len(), session.test_items[index]);
            println!("Result? (pass, fail, partial, skip)");
        }
        SessionState::AwaitingSeverity { index, status } => {
            println!("Test {} marked {status}.", index + 1);
            println!("Severity? (blocker, major, minor, cosmetic)");
        }
        SessionState::Complete => println!("All tests have a result. Run `waymark verify finish`."),
    }
}

fn finish(ws: &Workspace, verifier: &Verifier<FileSessionStore>, key: &SessionKey) -> Result<()> {
    let session = verifier.session(key)?;
    let recorder = IssueRecorder::for_plan(&ws.config.verify.issue_prefix, Path::new(&session.plan));
    let report = verifier.finalize_session(key, &recorder)?;

    println!("Verification complete: {}", report.summary);
    if !report.issues.is_empty() {
        println!("\nIssues recorded in {}:", recorder.ledger_path().display());
        for issue in &report.issues {
            println!("  {} [{}] {}", issue.id, issue.severity, issue.feature);
        }
    }
    Ok(())
}

/// Show configuration.
fn cmd_config(show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = Config::load()?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "waymark", &mut io::stdout());
}
