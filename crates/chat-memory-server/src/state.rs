use anyhow::Result;
use axum::extract::FromRef;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{IdentityResolver, JwtIdentityResolver, JwtManager};
use crate::config::{Settings, StoreBackend};
use crate::logging::{ActivityLogger, LoggerConfig};
use crate::services::conversation::{
    ChatEngine, ConversationMemory, HistoryStore, HistoryWindow, InMemoryHistoryStore,
    PromptAssembler, RedisHistoryStore, SessionPolicy,
};
use crate::services::{LanguageService, LlmService, TextGenerator};
use crate::utils::limiters::Limiters;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub engine: Arc<ChatEngine>,
    pub memory: ConversationMemory,
    pub language: LanguageService,
    pub identity: Arc<dyn IdentityResolver>,
    pub activity: ActivityLogger,
    redis: Option<RedisHistoryStore>,
}

impl AppState {
    /// Build every shared service once. Must run inside the tokio runtime.
    pub fn init(settings: Settings) -> Result<Self> {
        let activity = ActivityLogger::new(LoggerConfig {
            directory: settings.logging.activity_log_dir.as_ref().map(PathBuf::from),
            ..LoggerConfig::default()
        });

        let (store, redis): (Arc<dyn HistoryStore>, Option<RedisHistoryStore>) = match settings.store.backend {
            StoreBackend::Redis => {
                let redis = RedisHistoryStore::new(&settings.redis)?;
                (Arc::new(redis.clone()) as Arc<dyn HistoryStore>, Some(redis))
            }
            StoreBackend::Memory => {
                warn!("Using in-process history store; history is lost on restart");
                (Arc::new(InMemoryHistoryStore::new()) as Arc<dyn HistoryStore>, None)
            }
        };
        let memory = ConversationMemory::new(store, activity.clone());

        let generator: Arc<dyn TextGenerator> = Arc::new(LlmService::new(settings.llm.clone())?);
        let limiters = Limiters::new(&settings.limits, generator.supports_concurrent_inference());

        let identity: Arc<dyn IdentityResolver> = Arc::new(JwtIdentityResolver::new(JwtManager::new(
            &settings.auth.jwt_secret,
            settings.auth.token_ttl_seconds,
        )));

        let instructions = if settings.chat.system_prompt.trim().is_empty() {
            PromptAssembler::default_instructions()
        } else {
            settings.chat.system_prompt.clone()
        };
        let assembler = PromptAssembler::new(
            memory.clone(),
            instructions,
            HistoryWindow::from(&settings.chat),
        );

        let engine = Arc::new(ChatEngine {
            memory: memory.clone(),
            assembler,
            generator: generator.clone(),
            identity: identity.clone(),
            limiters: limiters.clone(),
            policy: SessionPolicy::from_config(&settings.chat, &settings.llm, &settings.auth),
            activity: activity.clone(),
        });

        info!("Application state ready (store={:?})", settings.store.backend);

        Ok(Self {
            language: LanguageService::new(generator, limiters),
            settings,
            engine,
            memory,
            identity,
            activity,
            redis,
        })
    }

    /// Release shared resources on graceful shutdown.
    pub async fn shutdown(&self) {
        if let Some(redis) = &self.redis {
            redis.close();
        }
        self.activity.flush().await;
        info!("Application state released");
    }
}

impl FromRef<AppState> for Arc<dyn IdentityResolver> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

impl FromRef<AppState> for Arc<ChatEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for LanguageService {
    fn from_ref(state: &AppState) -> Self {
        state.language.clone()
    }
}

impl FromRef<AppState> for ConversationMemory {
    fn from_ref(state: &AppState) -> Self {
        state.memory.clone()
    }
}
