//! PACS关联参数

use serde::{Deserialize, Serialize};

/// 与远端PACS建立关联所需的参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacsConnection {
    pub pacs_ip: String,
    pub pacs_port: u16,
    pub pacs_ae_title: String,  // 被叫AE标题
    pub local_ae_title: String, // 主叫AE标题
    pub dest_ae_title: String,  // C-MOVE目标AE标题
    pub dest_path: String,      // 下载目标目录
}

impl PacsConnection {
    /// `AE@IP:PORT` 形式的远端地址
    pub fn remote_address(&self) -> String {
        format!("{}@{}:{}", self.pacs_ae_title, self.pacs_ip, self.pacs_port)
    }
}

impl Default for PacsConnection {
    fn default() -> Self {
        Self {
            pacs_ip: "192.168.1.100".to_string(),
            pacs_port: 104,
            pacs_ae_title: "AE_TITLE_PACS".to_string(),
            local_ae_title: "AE_TITLE_LOCAL".to_string(),
            dest_ae_title: "AE_TITLE_DESTINO".to_string(),
            dest_path: "/var/local/pacs_downloads".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_address() {
        let connection = PacsConnection::default();
        assert_eq!(connection.remote_address(), "AE_TITLE_PACS@192.168.1.100:104");
    }
}
