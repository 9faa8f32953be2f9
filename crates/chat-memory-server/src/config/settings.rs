use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub redis: RedisConfig,
    pub llm: LlmConfig,
    pub limits: LimitsConfig,
    pub auth: AuthConfig,
    pub chat: ChatConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which history store backs conversation memory.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub pool_max_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    pub timeout_seconds: u64,
    pub max_tokens: usize,
    pub temperature: f32,
    pub stream_response: bool,
    /// Whether the backend can serve several inference calls at once.
    pub concurrent_inference: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LimitsConfig {
    pub llm_concurrency: usize,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub max_auth_attempts: u32,
    /// Lifetime of tokens this server issues itself.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
}

fn default_token_ttl() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChatConfig {
    pub system_prompt: String,
    /// 0 disables the turn window.
    pub max_history_turns: usize,
    /// 0 disables the token budget.
    pub max_history_tokens: usize,
    pub record_user_turns: bool,
    pub max_turn_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub activity_log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: true,
            log_dir: None,
            activity_log_dir: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
