use crate::models::{ResearchProgress, ResearchResult, SessionRecord, SessionStatus};
use chrono::Utc;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// In-memory registry of research sessions. Nothing here outlives the process.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    records: DashMap<String, SessionRecord>,
    cancel_tokens: DashMap<String, CancellationToken>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new in-progress session and returns its id with the token
    /// that cancels it.
    pub fn start(&self, query: &str, breadth: usize, depth: usize) -> (String, CancellationToken) {
        let id = Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        self.records.insert(
            id.clone(),
            SessionRecord {
                id: id.clone(),
                query: query.to_string(),
                breadth,
                depth,
                status: SessionStatus::InProgress,
                result: None,
                report: None,
                progress: None,
                error: None,
                timestamp: Utc::now(),
            },
        );
        self.cancel_tokens.insert(id.clone(), token.clone());
        (id, token)
    }

    pub fn cancel_token(&self, id: &str) -> Option<CancellationToken> {
        self.cancel_tokens.get(id).map(|t| t.value().clone())
    }

    pub fn record_progress(&self, id: &str, progress: ResearchProgress) {
        if let Some(mut record) = self.records.get_mut(id) {
            record.progress = Some(progress);
        }
    }

    pub fn record_result(&self, id: &str, result: ResearchResult) {
        if let Some(mut record) = self.records.get_mut(id) {
            record.result = Some(result);
        }
    }

    pub fn complete(&self, id: &str, report: String) {
        self.cancel_tokens.remove(id);
        if let Some(mut record) = self.records.get_mut(id) {
            record.status = SessionStatus::Completed;
            record.report = Some(report);
        }
    }

    /// Closes a session that ended without a report. A session whose token was
    /// tripped is recorded as cancelled, anything else as an error. Returns the
    /// recorded status.
    pub fn fail(&self, id: &str, error: impl Into<String>) -> SessionStatus {
        let cancelled = self
            .cancel_tokens
            .remove(id)
            .is_some_and(|(_, token)| token.is_cancelled());
        let status = if cancelled {
            SessionStatus::Cancelled
        } else {
            SessionStatus::Error
        };
        if let Some(mut record) = self.records.get_mut(id) {
            record.status = status;
            record.error = Some(error.into());
        }
        status
    }

    /// Cancels an in-progress session. Returns false for unknown or finished sessions.
    pub fn cancel(&self, id: &str) -> bool {
        match self.cancel_tokens.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<SessionRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// All sessions, newest first.
    pub fn list(&self) -> Vec<SessionRecord> {
        let mut sessions: Vec<SessionRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        sessions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sessions
    }
}
