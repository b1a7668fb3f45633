//! 配置管理
//!
//! 按 内置默认值 → TOML配置文件 → 环境变量 的顺序分层加载，命令行参数由调用方最后覆盖

use crate::logging::LoggingConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use pacs_dicom::{ConnectionValidator, PacsConnection};
use pacs_workflow::PacingConfig;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "PACS_SIM";

/// 任一延迟配置允许的最大时间单位数
pub const MAX_DELAY_UNITS: f64 = 3600.0;

/// 一个时间单位允许的最大毫秒数
pub const MAX_TIME_UNIT_MS: u64 = 60_000;

/// 模拟器完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// PACS连接参数
    pub connection: PacsConnection,
    /// 模拟延迟
    pub pacing: PacingConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 展示配置
    pub display: DisplayConfig,
}

/// 展示配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// 每个检查下载完成后输出终端提示音
    pub bell: bool,
    /// 输出格式
    pub format: OutputFormat,
}

/// 输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 面向终端的文本
    #[default]
    Text,
    /// 每个快照一行JSON
    Json,
}

/// 配置管理器
#[derive(Debug, Default)]
pub struct ConfigManager {
    validator: ConfigValidator,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 加载配置；未指定文件时只使用默认值和环境变量
    pub fn load(&self, config_path: Option<&str>) -> Result<SimConfig> {
        Self::load_with_prefix(config_path, ENV_PREFIX)
    }

    pub fn validator(&self) -> &ConfigValidator {
        &self.validator
    }

    /// 序列化为TOML文本
    pub fn to_toml(config: &SimConfig) -> Result<String> {
        toml::to_string_pretty(config).context("Failed to serialize configuration")
    }

    fn load_with_prefix(config_path: Option<&str>, env_prefix: &str) -> Result<SimConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

/// 配置验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: String,
    validator: fn(&SimConfig) -> Result<()>,
    error_message: String,
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "connection".to_string(),
                validator: |config| {
                    let result = ConnectionValidator::new().validate_connection(&config.connection);
                    for warning in &result.warnings {
                        warn!("{}", warning);
                    }
                    if result.is_valid {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!(result.errors.join("; ")))
                    }
                },
                error_message: "Invalid PACS connection".to_string(),
            },
            ValidationRule {
                field_path: "pacing.time_unit_ms".to_string(),
                validator: |config| {
                    if config.pacing.time_unit_ms > MAX_TIME_UNIT_MS {
                        Err(anyhow::anyhow!(
                            "time unit {}ms exceeds {}ms",
                            config.pacing.time_unit_ms,
                            MAX_TIME_UNIT_MS
                        ))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid time unit".to_string(),
            },
            ValidationRule {
                field_path: "pacing.search_delay".to_string(),
                validator: |config| {
                    check_range(config.pacing.search_delay_min, config.pacing.search_delay_max)
                },
                error_message: "Invalid search delay range".to_string(),
            },
            ValidationRule {
                field_path: "pacing.per_image".to_string(),
                validator: |config| {
                    check_range(config.pacing.per_image_min, config.pacing.per_image_max)
                },
                error_message: "Invalid per-image delay range".to_string(),
            },
            ValidationRule {
                field_path: "pacing.initial_search_delay".to_string(),
                validator: |config| {
                    let delay = config.pacing.initial_search_delay;
                    check_range(delay, delay)
                },
                error_message: "Invalid initial search delay".to_string(),
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &SimConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn check_range(min: f64, max: f64) -> Result<()> {
    if !min.is_finite() || !max.is_finite() {
        Err(anyhow::anyhow!("delay must be finite"))
    } else if min < 0.0 {
        Err(anyhow::anyhow!("delay cannot be negative: {}", min))
    } else if min > max {
        Err(anyhow::anyhow!("min {} is greater than max {}", min, max))
    } else if max > MAX_DELAY_UNITS {
        Err(anyhow::anyhow!("delay {} exceeds {} units", max, MAX_DELAY_UNITS))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert_eq!(config.connection.pacs_port, 104);
        assert_eq!(config.connection.dest_path, "/var/local/pacs_downloads");
        assert!(config.pacing.enabled);
        assert!(ConfigValidator::new().validate(&config).is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[connection]
pacs_ip = "10.0.0.5"
pacs_port = 4242
pacs_ae_title = "ARCHIVE"

[pacing]
enabled = false

[logging]
level = "debug"

[display]
format = "json"
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = ConfigManager::load_with_prefix(Some(&path), "PACS_SIM_TEST_FILE").unwrap();

        assert_eq!(config.connection.pacs_ip, "10.0.0.5");
        assert_eq!(config.connection.pacs_port, 4242);
        assert_eq!(config.connection.pacs_ae_title, "ARCHIVE");
        // 未出现的字段保持默认值
        assert_eq!(config.connection.local_ae_title, "AE_TITLE_LOCAL");
        assert!(!config.pacing.enabled);
        assert_eq!(config.pacing.per_image_max, 0.05);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.display.format, OutputFormat::Json);
    }

    #[test]
    fn test_environment_overrides() {
        std::env::set_var("PACS_SIM_TEST_ENV__CONNECTION__PACS_PORT", "11112");
        std::env::set_var("PACS_SIM_TEST_ENV__DISPLAY__BELL", "true");

        let config = ConfigManager::load_with_prefix(None, "PACS_SIM_TEST_ENV").unwrap();
        assert_eq!(config.connection.pacs_port, 11112);
        assert!(config.display.bell);

        std::env::remove_var("PACS_SIM_TEST_ENV__CONNECTION__PACS_PORT");
        std::env::remove_var("PACS_SIM_TEST_ENV__DISPLAY__BELL");
    }

    #[test]
    fn test_invalid_pacing_rejected() {
        let mut config = SimConfig::default();
        config.pacing.per_image_min = 0.5;
        config.pacing.per_image_max = 0.1;
        assert!(ConfigValidator::new().validate(&config).is_err());

        let mut config = SimConfig::default();
        config.pacing.search_delay_min = -1.0;
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_oversized_pacing_rejected() {
        let mut config = SimConfig::default();
        config.pacing.per_image_min = 1e300;
        config.pacing.per_image_max = 1e300;
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid per-image delay range"));

        let mut config = SimConfig::default();
        config.pacing.initial_search_delay = MAX_DELAY_UNITS + 1.0;
        assert!(ConfigValidator::new().validate(&config).is_err());

        let mut config = SimConfig::default();
        config.pacing.time_unit_ms = u64::MAX;
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid time unit"));
    }

    #[test]
    fn test_invalid_connection_rejected() {
        let mut config = SimConfig::default();
        config.connection.pacs_ip = "not-an-ip".to_string();
        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid PACS connection"));
    }

    #[test]
    fn test_toml_dump_round_trips_through_loader() {
        let mut config = SimConfig::default();
        config.connection.dest_ae_title = "WORKSTATION".to_string();
        let text = ConfigManager::to_toml(&config).unwrap();
        assert!(text.contains("[connection]"));

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let loaded = ConfigManager::load_with_prefix(Some(&path), "PACS_SIM_TEST_DUMP").unwrap();
        assert_eq!(loaded, config);
    }
}
