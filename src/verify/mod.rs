//! Manual verification of executed plans.
//!
//! A checklist of test items is generated for a plan, then an operator
//! reports one result per item across any number of separate invocations.
//! Sessions are persisted between events, so the workflow survives process
//! restarts. Finished sessions turn their failures into issues.
//!
//! ## Flow
//!
//! 1. [`Verifier::start_verification`] persists a new [`VerificationSession`]
//! 2. [`Verifier::apply_result_event`] records pass/skip, or holds fail/partial
//! 3. [`Verifier::apply_severity_event`] completes a held fail/partial result
//! 4. [`Verifier::finalize_session`] writes issues and deletes the session

mod checklist;
mod error;
mod event;
mod issues;
mod service;
mod session;
mod store;

pub use checklist::{
    checklist_from_accomplishments, generate_with_fallback, parse_checklist_response,
    AccomplishmentsChecklist, ChecklistGenerator, ChecklistRequest,
};
pub use error::{ChecklistError, IllegalEvent, StoreError, VerifyError, VerifyResult};
pub use event::VerificationEvent;
pub use issues::{ledger_path_for, Issue, IssueLedger, IssueRecorder};
pub use service::{DispatchOutcome, FinalReport, StartOutcome, Verifier};
pub use session::{
    ResultOutcome, SessionKey, SessionState, Severity, SeverityOutcome, TestResult, TestStatus,
    VerificationSession, VerificationSummary,
};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
