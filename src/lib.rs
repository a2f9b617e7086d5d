#![allow(clippy::needless_collect)]
#![allow(clippy::format_push_string)]
#![allow(clippy::unused_self)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # Waymark
//!
//! Next-step routing and manual verification for staged project delivery.
//!
//! Waymark reads a project's planning documents (roadmap, state, per-phase
//! plans and summaries), tells you the single next thing to do, and walks you
//! through resumable acceptance testing of executed plans.
//!
//! ## Features
//!
//! - **Tolerant Parsing**: Roadmap and state documents degrade to defaults, never errors
//! - **Next Action**: A fixed priority ladder always yields exactly one recommendation
//! - **Verification Sessions**: Persisted between events, so they survive restarts
//! - **Issue Ledger**: Failures become numbered issues in the phase directory
//!
//! ## Quick Start
//!
//! ```bash
//! # What should I do next?
//! waymark next
//!
//! # Verify an executed plan
//! waymark verify start 02-01-PLAN.md
//! waymark verify result pass
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::redundant_else)]
#![allow(clippy::if_not_else)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::redundant_clone)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unnecessary_debug_formatting)]
#![allow(clippy::use_self)]

pub mod core;
pub mod verify;
pub mod workflow;

// Re-export commonly used types
pub use core::Config;
pub use verify::{SessionKey, Verifier, VerifyError};
pub use workflow::{build_project_state, route, Action, ProjectState, WorkflowContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "waymark";
