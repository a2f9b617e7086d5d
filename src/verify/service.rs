//! Verification event handlers.
//!
//! Every handler follows the same discipline: load the session by key,
//! validate the event against the persisted state, mutate a copy, save it,
//! and only then report the outcome. A rejected event leaves the stored
//! record exactly as it was.

use serde::{Deserialize, Serialize};

use super::checklist::{generate_with_fallback, ChecklistGenerator, ChecklistRequest};
use super::error::{IllegalEvent, VerifyError, VerifyResult};
use super::event::VerificationEvent;
use super::issues::{Issue, IssueRecorder};
use super::session::{
    ResultOutcome, SessionKey, Severity, SeverityOutcome, TestStatus, VerificationSession,
    VerificationSummary,
};
use super::store::SessionStore;

/// Result of starting verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session was persisted
    Started(VerificationSession),

    /// A session already existed under the key and was left as-is
    Resumed(VerificationSession),

    /// The checklist was empty; nothing was persisted
    NoTestableItems,
}

impl StartOutcome {
    /// The active session, if any.
    pub fn session(&self) -> Option<&VerificationSession> {
        match self {
            Self::Started(s) | Self::Resumed(s) => Some(s),
            Self::NoTestableItems => None,
        }
    }
}

/// Result of dispatching a raw operator message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Not a verification event; the session was not touched
    Ignored,
    Result(ResultOutcome),
    Severity(SeverityOutcome),
}

/// Tally and issues of a finalized session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    pub summary: VerificationSummary,
    pub issues: Vec<Issue>,
}

/// Runs verification sessions against a session store.
#[derive(Debug)]
pub struct Verifier<S: SessionStore> {
    store: S,
}

impl<S: SessionStore> Verifier<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load a session or report that it must be restarted.
    pub fn session(&self, key: &SessionKey) -> VerifyResult<VerificationSession> {
        self.store
            .load(key)?
            .ok_or_else(|| VerifyError::SessionNotFound { key: key.clone() })
    }

    /// Start verifying a plan with a ready checklist.
    ///
    /// An existing session under the same key is resumed, never replaced.
    pub fn start_verification(
        &self,
        test_items: Vec<String>,
        key: SessionKey,
        plan: &str,
    ) -> VerifyResult<StartOutcome> {
        if let Some(existing) = self.store.load(&key)? {
            tracing::info!(session = %key, index = existing.current_index, "Resuming verification");
            return Ok(StartOutcome::Resumed(existing));
        }

        let items: Vec<String> = test_items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            tracing::info!(session = %key, plan, "No testable items, session not created");
            return Ok(StartOutcome::NoTestableItems);
        }

        let session = VerificationSession::new(key, plan, items);
        self.store.save(&session)?;
        tracing::info!(
            session = %session.key,
            plan,
            tests = session.test_items.len(),
            "Started verification"
        );
        Ok(StartOutcome::Started(session))
    }

    /// Generate a checklist, then start verifying.
    ///
    /// Nothing is persisted until generation finishes, so dropping the
    /// returned future leaves the store untouched.
    pub async fn start_with_generator(
        &self,
        generator: &dyn ChecklistGenerator,
        request: &ChecklistRequest,
        key: SessionKey,
        plan: &str,
    ) -> VerifyResult<StartOutcome> {
        if let Some(existing) = self.store.load(&key)? {
            tracing::info!(session = %key, index = existing.current_index, "Resuming verification");
            return Ok(StartOutcome::Resumed(existing));
        }

        let items = generate_with_fallback(generator, request).await;
        self.start_verification(items, key, plan)
    }

    /// Apply a result for test `index`.
    pub fn apply_result_event(
        &self,
        key: &SessionKey,
        index: usize,
        status: TestStatus,
    ) -> VerifyResult<ResultOutcome> {
        let mut session = self.session(key)?;
        let outcome = session.apply_result(index, status).inspect_err(|e| {
            tracing::info!(session = %key, error = %e, "Rejected result event");
        })?;
        self.store.save(&session)?;

        tracing::info!(
            session = %key,
            index,
            %status,
            needs_severity = outcome.needs_severity,
            completed = outcome.completed,
            "Applied result"
        );
        Ok(outcome)
    }

    /// Apply a severity for the pending fail/partial result.
    pub fn apply_severity_event(&self, key: &SessionKey, severity: Severity) -> VerifyResult<SeverityOutcome> {
        self.apply_severity_event_with_description(key, severity, None)
    }

    /// Apply a severity with the operator's own description.
    pub fn apply_severity_event_with_description(
        &self,
        key: &SessionKey,
        severity: Severity,
        description: Option<String>,
    ) -> VerifyResult<SeverityOutcome> {
        let mut session = self.session(key)?;
        let outcome = session.apply_severity(severity, description).inspect_err(|e| {
            tracing::info!(session = %key, error = %e, "Rejected severity event");
        })?;
        self.store.save(&session)?;

        tracing::info!(session = %key, %severity, completed = outcome.completed, "Applied severity");
        Ok(outcome)
    }

    /// Route a raw operator message to the matching handler.
    ///
    /// Messages that are not verification events are ignored without
    /// loading the session. A result without an index targets the current
    /// test.
    pub fn dispatch(&self, key: &SessionKey, raw: &str) -> VerifyResult<DispatchOutcome> {
        let Some(event) = VerificationEvent::parse(raw) else {
            tracing::debug!(session = %key, "Ignoring unrelated message");
            return Ok(DispatchOutcome::Ignored);
        };

        match event {
            VerificationEvent::Result { index, status } => {
                let index = match index {
                    Some(index) => index,
                    None => self.session(key)?.current_index,
                };
                self.apply_result_event(key, index, status).map(DispatchOutcome::Result)
            }
            VerificationEvent::Severity { severity, description } => self
                .apply_severity_event_with_description(key, severity, description)
                .map(DispatchOutcome::Severity),
        }
    }

    /// Record issues for a complete session and delete it.
    ///
    /// Safe to retry: if the delete fails after the ledger was written, a
    /// second call finds the session's issues in the ledger and only
    /// deletes.
    pub fn finalize_session(&self, key: &SessionKey, recorder: &IssueRecorder) -> VerifyResult<FinalReport> {
        let session = self.session(key)?;
        if !session.is_complete() {
            let remaining = session.remaining();
            return Err(IllegalEvent::SessionIncomplete { remaining }.into());
        }

        let summary = session.summary();
        let issues = recorder.record(&session).map_err(VerifyError::Ledger)?;
        self.store.delete(key)?;

        tracing::info!(session = %key, %summary, issues = issues.len(), "Verification finished");
        Ok(FinalReport { summary, issues })
    }

    /// Discard a session. Returns whether one existed.
    pub fn abandon(&self, key: &SessionKey) -> VerifyResult<bool> {
        let existed = self.store.delete(key)?;
        if existed {
            tracing::info!(session = %key, "Abandoned verification");
        }
        Ok(existed)
    }

    /// All stored sessions. Records that fail to load are skipped.
    pub fn list(&self) -> VerifyResult<Vec<VerificationSession>> {
        let mut sessions = Vec::new();
        for key in self.store.keys()? {
            match self.store.load(&key) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => tracing::warn!(session = %key, error = %e, "Skipping unreadable session"),
            }
        }
        Ok(sessions)
    }
}
