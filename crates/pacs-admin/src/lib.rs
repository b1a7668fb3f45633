//! # PACS模拟器运维模块
//!
//! 提供分层配置加载与验证，以及日志初始化

pub mod config;
pub mod logging;

pub use config::{ConfigManager, ConfigValidator, DisplayConfig, OutputFormat, SimConfig};
pub use logging::{init_logging, LogLevel, LoggingConfig};
