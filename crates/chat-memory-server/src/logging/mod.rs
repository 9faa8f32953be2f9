//! Logging: process-wide tracing setup and the queued session activity log

mod logger;
pub mod telemetry;
pub mod types;

pub use logger::{ActivityLogger, LoggerConfig};
pub use telemetry::init_telemetry;
pub use types::{ActivityLog, ActivityStatus, ActivityType};
