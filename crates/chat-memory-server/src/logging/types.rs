use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::chat::ConversationId;

/// Activity type categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    SessionOpened,
    Authenticated,
    AuthRejected,
    TurnReceived,
    TurnRejected,
    TurnCommitted,
    TurnAborted,
    HistoryCleared,
    ShapeConflictRecovered,
    SessionClosed,
}

/// Activity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Success,
    Error,
    Warning,
}

/// Complete activity log entry, written as one JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLog {
    // Session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    // Activity
    pub activity_type: ActivityType,
    pub activity_status: ActivityStatus,

    // Context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_chars: Option<usize>,

    // Performance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,

    // Error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    /// Create builder for fluent API
    pub fn builder(conversation: &ConversationId, activity_type: ActivityType) -> ActivityLogBuilder {
        ActivityLogBuilder::new(activity_type).conversation(conversation)
    }

    /// Builder for events that happen before identity is known.
    pub fn anonymous(activity_type: ActivityType) -> ActivityLogBuilder {
        ActivityLogBuilder::new(activity_type)
    }
}

/// Builder pattern for ActivityLog
pub struct ActivityLogBuilder {
    log: ActivityLog,
}

impl ActivityLogBuilder {
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            log: ActivityLog {
                session_id: None,
                conversation_id: None,
                activity_type,
                activity_status: ActivityStatus::Success,
                message: None,
                fragment_count: None,
                response_chars: None,
                processing_time_ms: None,
                error_message: None,
                created_at: Utc::now(),
            },
        }
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.log.session_id = Some(session_id.into());
        self
    }

    pub fn conversation(mut self, conversation: &ConversationId) -> Self {
        self.log.conversation_id = Some(conversation.as_str().to_string());
        self
    }

    pub fn status(mut self, status: ActivityStatus) -> Self {
        self.log.activity_status = status;
        self
    }

    pub fn message(mut self, content: impl Into<String>) -> Self {
        self.log.message = Some(content.into());
        self
    }

    pub fn fragments(mut self, count: usize) -> Self {
        self.log.fragment_count = Some(count);
        self
    }

    pub fn response_chars(mut self, chars: usize) -> Self {
        self.log.response_chars = Some(chars);
        self
    }

    pub fn processing_time(mut self, ms: u64) -> Self {
        self.log.processing_time_ms = Some(ms);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.log.error_message = Some(message.into());
        self.log.activity_status = ActivityStatus::Error;
        self
    }

    pub fn build(self) -> ActivityLog {
        self.log
    }
}
