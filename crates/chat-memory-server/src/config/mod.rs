pub mod settings;

pub use settings::{
    AuthConfig, ChatConfig, LimitsConfig, LlmConfig, LoggingConfig, RedisConfig, ServerConfig,
    Settings, StoreBackend, StoreConfig,
};
