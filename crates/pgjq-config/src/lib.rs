//! KDL configuration parsing for pgjq.
//!
//! This crate handles parsing of:
//! - System configuration (pgjq.kdl)
//! - Duration values such as `500ms`, `30s` or `10m`
//! - Variable interpolation (`${env.DATABASE_URL}`)

pub mod duration;
pub mod error;
mod nodes;
pub mod system;
pub mod variables;

pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use system::{
    ChartConfig, DatabaseConfig, EngineConfig, LogFormat, LoggingConfig, PgjqConfig,
    ReaperConfig, WorkerConfig, load_config, parse_config, validate_database_url,
};
pub use variables::{VariableContext, VariableContextBuilder};
