//! 连接参数验证
//!
//! 检查IP、端口与AE标题是否符合DICOM网络约定

use crate::association::PacsConnection;
use std::net::IpAddr;
use tracing::{debug, info};

/// AE标题最大长度
pub const MAX_AE_TITLE_LEN: usize = 16;

/// 连接参数验证器
#[derive(Debug, Default)]
pub struct ConnectionValidator;

impl ConnectionValidator {
    pub fn new() -> Self {
        Self
    }

    /// 验证连接参数
    pub fn validate_connection(&self, connection: &PacsConnection) -> ValidationResult {
        let mut result = ValidationResult::new();

        if connection.pacs_ip.parse::<IpAddr>().is_err() {
            result.add_error(format!("无效的PACS IP地址: {}", connection.pacs_ip));
        }

        if connection.pacs_port == 0 {
            result.add_error("PACS端口不能为0".to_string());
        }

        let ae_titles = [
            ("PACS AE标题", &connection.pacs_ae_title),
            ("本地AE标题", &connection.local_ae_title),
            ("目标AE标题", &connection.dest_ae_title),
        ];
        for (name, title) in ae_titles {
            self.validate_ae_title(name, title, &mut result);
        }

        if connection.dest_path.trim().is_empty() {
            result.add_warning("未设置下载目标目录".to_string());
        }

        info!("连接参数验证完成: {}", result.get_summary());
        result
    }

    fn validate_ae_title(&self, name: &str, title: &str, result: &mut ValidationResult) {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            result.add_error(format!("{} 不能为空", name));
        } else if trimmed.len() > MAX_AE_TITLE_LEN {
            result.add_error(format!("{} 超过 {} 个字符: {}", name, MAX_AE_TITLE_LEN, title));
        } else if trimmed.contains('\\') || !trimmed.is_ascii() {
            result.add_error(format!("{} 含有非法字符: {}", name, title));
        } else {
            debug!("{} 验证通过: {}", name, title);
        }
    }
}

/// 验证结果
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// 验证错误列表
    pub errors: Vec<String>,
    /// 验证警告列表
    pub warnings: Vec<String>,
    /// 是否通过验证
    pub is_valid: bool,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    /// 添加错误
    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    /// 添加警告
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// 获取验证报告摘要
    pub fn get_summary(&self) -> String {
        if self.is_valid {
            if self.has_warnings() {
                format!("验证通过，但有 {} 个警告", self.warnings.len())
            } else {
                "验证完全通过".to_string()
            }
        } else {
            format!(
                "验证失败：{} 个错误，{} 个警告",
                self.errors.len(),
                self.warnings.len()
            )
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}
