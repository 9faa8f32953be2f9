use futures::stream;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::auth::identity::MockIdentityResolver;
use crate::auth::AuthError;
use crate::config::LimitsConfig;
use crate::logging::ActivityLogger;
use crate::models::chat::ConversationId;
use crate::services::conversation::{
    ChatEngine, ConversationMemory, HistoryStore, HistoryWindow, InMemoryHistoryStore,
    PromptAssembler, SessionPolicy,
};
use crate::services::generator::{BackendError, FragmentStream, MockTextGenerator};
use crate::transport::{ChatTransport, TransportError};
use crate::utils::limiters::Limiters;

pub const GOOD_TOKEN: &str = "good-token";
pub const USER: &str = "user-1";

pub fn auth_frame(token: &str) -> String {
    format!(r#"{{"token":"{}"}}"#, token)
}

/// In-memory transport fed from a script of inbound frames.
#[derive(Default)]
pub struct ScriptedTransport {
    inbound: VecDeque<String>,
    pub sent: Vec<String>,
    pub closed_with: Option<u16>,
    fail_after: Option<usize>,
}

impl ScriptedTransport {
    pub fn new<I, S>(inbound: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inbound: inbound.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Every send after the first `n` fails as if the peer hung up.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

#[async_trait::async_trait]
impl ChatTransport for ScriptedTransport {
    async fn receive_next_turn(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.inbound.pop_front())
    }

    async fn send_fragment(&mut self, text: &str) -> Result<(), TransportError> {
        if self.fail_after.is_some_and(|n| self.sent.len() >= n) {
            return Err(TransportError::Disconnected);
        }
        self.sent.push(text.to_string());
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        self.closed_with = Some(code);
        Ok(())
    }
}

pub fn fragments(items: Vec<Result<&'static str, BackendError>>) -> FragmentStream {
    Box::pin(stream::iter(
        items.into_iter().map(|item| item.map(str::to_string)),
    ))
}

/// Accepts `GOOD_TOKEN` as `USER`, rejects anything else.
pub fn identity() -> MockIdentityResolver {
    let mut identity = MockIdentityResolver::new();
    identity.expect_resolve().returning(|token| {
        if token == GOOD_TOKEN {
            Ok(ConversationId::new(USER))
        } else {
            Err(AuthError::InvalidToken("bad signature".to_string()))
        }
    });
    identity
}

pub fn streaming_generator(items: Vec<Result<&'static str, BackendError>>) -> MockTextGenerator {
    let mut generator = MockTextGenerator::new();
    let mut items = Some(items);
    generator
        .expect_generate_stream()
        .returning(move |_| Ok(fragments(items.take().unwrap_or_default())));
    generator.expect_supports_concurrent_inference().return_const(false);
    generator
}

pub fn engine_with(
    store: Arc<dyn HistoryStore>,
    generator: MockTextGenerator,
    policy: SessionPolicy,
) -> Arc<ChatEngine> {
    let memory = ConversationMemory::new(store, ActivityLogger::noop());
    let assembler = PromptAssembler::new(memory.clone(), "SYS".to_string(), HistoryWindow::unbounded());
    let limiters = Limiters::new(
        &LimitsConfig {
            llm_concurrency: 1,
            acquire_timeout_ms: 200,
        },
        false,
    );

    Arc::new(ChatEngine {
        memory,
        assembler,
        generator: Arc::new(generator),
        identity: Arc::new(identity()),
        limiters,
        policy,
        activity: ActivityLogger::noop(),
    })
}

pub fn engine(store: &InMemoryHistoryStore, generator: MockTextGenerator) -> Arc<ChatEngine> {
    engine_with(Arc::new(store.clone()), generator, SessionPolicy::default())
}

pub async fn seed(store: &InMemoryHistoryStore, turns: &[&str]) {
    for turn in turns {
        store
            .append(&ConversationId::new(USER).history_key(), turn)
            .await
            .unwrap();
    }
}

pub async fn history(store: &InMemoryHistoryStore) -> Vec<String> {
    store
        .read_all(&ConversationId::new(USER).history_key())
        .await
        .unwrap()
}
