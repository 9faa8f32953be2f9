use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{parse_auth_frame, IdentityResolver};
use crate::logging::{ActivityLog, ActivityLogger, ActivityStatus, ActivityType};
use crate::models::chat::{ChatMessage, ConversationId};
use crate::services::generator::{BackendError, TextGenerator};
use crate::transport::{
    ChatTransport, TransportError, CLOSE_AUTH_FAILED, CLOSE_INTERNAL_ERROR, CLOSE_NORMAL,
};
use crate::utils::escape_html;
use crate::utils::limiters::Limiters;

use super::context_builder::PromptAssembler;
use super::memory::{ConversationMemory, MemoryError};
use super::types::{GenerationResult, SessionPolicy, SessionState};

pub const CLEAR_COMMAND: &str = "/clear";
pub const ERROR_NOTICE: &str = "Error: Something went wrong.";
pub const AUTH_REJECTED_NOTICE: &str = "Error: Authentication failed.";
pub const HISTORY_CLEARED_NOTICE: &str = "Chat memory cleared.";
pub const NOTHING_TO_CLEAR_NOTICE: &str = "There is no chat memory to clear.";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Everything a session needs, shared across connections.
pub struct ChatEngine {
    pub memory: ConversationMemory,
    pub assembler: PromptAssembler,
    pub generator: Arc<dyn TextGenerator>,
    pub identity: Arc<dyn IdentityResolver>,
    pub limiters: Limiters,
    pub policy: SessionPolicy,
    pub activity: ActivityLogger,
}

/// Wait for the producer task. Cancellation is fine; a panic is a backend failure.
async fn join_producer(producer: JoinHandle<()>) -> Result<(), BackendError> {
    match producer.await {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(BackendError::Stream(format!("generation task failed: {}", e))),
    }
}

enum TurnOutcome {
    Committed,
    Rejected,
    Cleared,
    Disconnected,
}

/// Drives one connection: auth, then turn after turn until the peer leaves
/// or something fails.
pub struct GenerationSession<T: ChatTransport> {
    engine: Arc<ChatEngine>,
    transport: T,
    state: SessionState,
    session_id: String,
}

impl<T: ChatTransport> GenerationSession<T> {
    pub fn new(engine: Arc<ChatEngine>, transport: T) -> Self {
        Self {
            engine,
            transport,
            state: SessionState::Idle,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs until the session is closed and returns the final state.
    pub async fn run(&mut self) -> SessionState {
        self.transition(SessionState::AwaitingAuth);
        self.engine.activity.log(
            ActivityLog::anonymous(ActivityType::SessionOpened)
                .session(&self.session_id)
                .build(),
        );

        if let Some(conversation) = self.authenticate().await {
            self.serve(&conversation).await;
        }

        self.engine.activity.log(
            ActivityLog::anonymous(ActivityType::SessionClosed)
                .session(&self.session_id)
                .message(format!("final state {}", self.state))
                .build(),
        );
        self.state
    }

    async fn authenticate(&mut self) -> Option<ConversationId> {
        let max_attempts = self.engine.policy.max_auth_attempts.max(1);
        let mut rejections = 0;

        loop {
            let frame = match self.transport.receive_next_turn().await {
                Ok(Some(frame)) => frame,
                Ok(None) | Err(_) => {
                    debug!("Session {} disconnected before authenticating", self.session_id);
                    self.transition(SessionState::Closed);
                    return None;
                }
            };

            let resolved = match parse_auth_frame(&frame) {
                Ok(token) => self.engine.identity.resolve(&token).await,
                Err(e) => Err(e),
            };

            match resolved {
                Ok(conversation) => {
                    info!("Session {} authenticated as {}", self.session_id, conversation);
                    self.engine.activity.log(
                        ActivityLog::builder(&conversation, ActivityType::Authenticated)
                            .session(&self.session_id)
                            .build(),
                    );
                    return Some(conversation);
                }
                Err(e) => {
                    rejections += 1;
                    warn!(
                        "Session {} auth rejected ({}/{}): {}",
                        self.session_id, rejections, max_attempts, e
                    );
                    self.engine.activity.log(
                        ActivityLog::anonymous(ActivityType::AuthRejected)
                            .session(&self.session_id)
                            .error(e.to_string())
                            .build(),
                    );

                    let notified = self.transport.send_fragment(AUTH_REJECTED_NOTICE).await.is_ok();
                    if !notified || rejections >= max_attempts {
                        if let Err(e) = self.transport.close(CLOSE_AUTH_FAILED).await {
                            debug!("Close after auth failure: {}", e);
                        }
                        self.transition(SessionState::Closed);
                        return None;
                    }
                }
            }
        }
    }

    async fn serve(&mut self, conversation: &ConversationId) {
        loop {
            let turn = match self.transport.receive_next_turn().await {
                Ok(Some(turn)) => turn,
                Ok(None) | Err(TransportError::Disconnected) => {
                    debug!("Session {} peer left", self.session_id);
                    let _ = self.transport.close(CLOSE_NORMAL).await;
                    self.transition(SessionState::Closed);
                    return;
                }
                Err(TransportError::Protocol(e)) => {
                    warn!("Session {} dropped frame: {}", self.session_id, e);
                    continue;
                }
            };

            match self.handle_turn(conversation, &turn).await {
                Ok(TurnOutcome::Committed | TurnOutcome::Rejected | TurnOutcome::Cleared) => {}
                Ok(TurnOutcome::Disconnected) => {
                    self.transition(SessionState::Closed);
                    return;
                }
                Err(e) => {
                    self.fail(conversation, e).await;
                    return;
                }
            }
        }
    }

    async fn handle_turn(
        &mut self,
        conversation: &ConversationId,
        turn: &str,
    ) -> Result<TurnOutcome, SessionError> {
        if self.state == SessionState::AwaitingAuth {
            self.transition(SessionState::Streaming);
        }

        let text = turn.trim();
        if text == CLEAR_COMMAND {
            return self.clear(conversation).await;
        }
        if let Some(reason) = self.reject_reason(text) {
            return Ok(self.reject(conversation, reason).await);
        }

        let started = Instant::now();
        self.engine.activity.log(
            ActivityLog::builder(conversation, ActivityType::TurnReceived)
                .session(&self.session_id)
                .build(),
        );

        let messages = self.engine.assembler.assemble(conversation, text).await?;
        let generated = if self.engine.policy.stream_response {
            self.relay(messages).await?
        } else {
            self.generate_whole(messages).await?
        };

        let Some(result) = generated else {
            return Ok(self.aborted(conversation, "peer left mid-reply"));
        };
        if self.transport.send_end_marker().await.is_err() {
            return Ok(self.aborted(conversation, "peer left before end marker"));
        }

        self.transition(SessionState::Committing);
        let fragments = result.fragment_count();
        let response = result.into_text();
        let response_chars = response.chars().count();

        let turns = if self.engine.policy.record_user_turns {
            vec![text.to_string(), response]
        } else {
            vec![response]
        };
        self.engine.memory.append_turns(conversation, &turns).await?;
        self.transition(SessionState::Streaming);

        let elapsed = started.elapsed().as_millis() as u64;
        info!(
            "Committed turn for {} ({} fragments, {} chars, {}ms)",
            conversation, fragments, response_chars, elapsed
        );
        self.engine.activity.log(
            ActivityLog::builder(conversation, ActivityType::TurnCommitted)
                .session(&self.session_id)
                .fragments(fragments)
                .response_chars(response_chars)
                .processing_time(elapsed)
                .build(),
        );

        Ok(TurnOutcome::Committed)
    }

    /// Forward backend fragments to the client as they arrive.
    ///
    /// Returns `None` when the client went away; the producer is aborted and
    /// its permit released.
    async fn relay(&mut self, messages: Vec<ChatMessage>) -> Result<Option<GenerationResult>, SessionError> {
        let permit = self.engine.limiters.acquire_llm().await?;
        let generator = self.engine.generator.clone();
        let (tx, mut rx) = mpsc::channel::<Result<String, BackendError>>(1);

        let producer = tokio::spawn(async move {
            let _permit = permit;

            let mut stream = match generator.generate_stream(&messages).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            while let Some(item) = stream.next().await {
                let failed = item.is_err();
                if tx.send(item).await.is_err() || failed {
                    return;
                }
            }
        });

        let mut result = GenerationResult::default();
        while let Some(item) = rx.recv().await {
            match item {
                Ok(fragment) if fragment.is_empty() => {}
                Ok(fragment) => {
                    if self.transport.send_fragment(&fragment).await.is_err() {
                        producer.abort();
                        if let Err(e) = join_producer(producer).await {
                            warn!("Producer failed after peer left: {}", e);
                        }
                        return Ok(None);
                    }
                    result.push(&fragment);
                }
                Err(e) => {
                    producer.abort();
                    join_producer(producer).await?;
                    return Err(e.into());
                }
            }
        }

        // a producer that died early closes the channel like a finished one
        join_producer(producer).await?;
        Ok(Some(result))
    }

    async fn generate_whole(&mut self, messages: Vec<ChatMessage>) -> Result<Option<GenerationResult>, SessionError> {
        let text = {
            let _permit = self.engine.limiters.acquire_llm().await?;
            self.engine.generator.generate(&messages).await?
        };

        if self.transport.send_fragment(&escape_html(&text)).await.is_err() {
            return Ok(None);
        }

        let mut result = GenerationResult::default();
        result.push(&text);
        Ok(Some(result))
    }

    async fn clear(&mut self, conversation: &ConversationId) -> Result<TurnOutcome, SessionError> {
        let notice = match self.engine.memory.clear_memory(conversation).await {
            Ok(()) => {
                self.engine.activity.log(
                    ActivityLog::builder(conversation, ActivityType::HistoryCleared)
                        .session(&self.session_id)
                        .build(),
                );
                HISTORY_CLEARED_NOTICE
            }
            Err(MemoryError::HistoryNotFound(_)) => NOTHING_TO_CLEAR_NOTICE,
            Err(e) => return Err(e.into()),
        };

        if self.send_notice(notice).await {
            Ok(TurnOutcome::Cleared)
        } else {
            Ok(TurnOutcome::Disconnected)
        }
    }

    fn reject_reason(&self, text: &str) -> Option<String> {
        if text.is_empty() {
            return Some("Error: Message is empty.".to_string());
        }

        let max = self.engine.policy.max_turn_chars;
        if max > 0 && text.chars().count() > max {
            return Some(format!("Error: Message exceeds {} characters.", max));
        }
        None
    }

    async fn reject(&mut self, conversation: &ConversationId, reason: String) -> TurnOutcome {
        debug!("Session {} rejected turn: {}", self.session_id, reason);
        self.engine.activity.log(
            ActivityLog::builder(conversation, ActivityType::TurnRejected)
                .session(&self.session_id)
                .status(ActivityStatus::Warning)
                .message(reason.clone())
                .build(),
        );

        if self.send_notice(&reason).await {
            TurnOutcome::Rejected
        } else {
            TurnOutcome::Disconnected
        }
    }

    async fn send_notice(&mut self, notice: &str) -> bool {
        self.transport.send_fragment(notice).await.is_ok() && self.transport.send_end_marker().await.is_ok()
    }

    fn aborted(&self, conversation: &ConversationId, reason: &str) -> TurnOutcome {
        info!("Discarding reply for {}: {}", conversation, reason);
        self.engine.activity.log(
            ActivityLog::builder(conversation, ActivityType::TurnAborted)
                .session(&self.session_id)
                .message(reason)
                .build(),
        );
        TurnOutcome::Disconnected
    }

    async fn fail(&mut self, conversation: &ConversationId, e: SessionError) {
        error!("Session {} failed for {}: {}", self.session_id, conversation, e);
        self.transition(SessionState::Error);
        self.engine.activity.log(
            ActivityLog::builder(conversation, ActivityType::TurnAborted)
                .session(&self.session_id)
                .error(e.to_string())
                .build(),
        );

        let _ = self.transport.send_fragment(ERROR_NOTICE).await;
        if let Err(e) = self.transport.close(CLOSE_INTERNAL_ERROR).await {
            debug!("Close after failure: {}", e);
        }
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            warn!("Session {} ignored transition {} -> {}", self.session_id, self.state, next);
            return;
        }
        debug!("Session {}: {} -> {}", self.session_id, self.state, next);
        self.state = next;
    }
}
