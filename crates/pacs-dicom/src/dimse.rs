//! DIMSE命令模拟
//!
//! 把 C-FIND / C-MOVE 请求渲染为命令行客户端的文本，并按顺序记入命令日志。

use crate::association::PacsConnection;
use pacs_core::XA_MODALITY;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// 命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    CFind,
    CMove,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::CFind => write!(f, "C-FIND"),
            CommandType::CMove => write!(f, "C-MOVE"),
        }
    }
}

/// 模拟的DIMSE请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimseCommand {
    /// 按PatientID查询XA检查
    Find { patient_id: String },
    /// 按StudyInstanceUID检索检查
    Move { study_instance_uid: String },
}

impl DimseCommand {
    pub fn find(patient_id: impl Into<String>) -> Self {
        DimseCommand::Find {
            patient_id: patient_id.into(),
        }
    }

    pub fn retrieve(study_instance_uid: impl Into<String>) -> Self {
        DimseCommand::Move {
            study_instance_uid: study_instance_uid.into(),
        }
    }

    /// 获取命令类型
    pub fn command_type(&self) -> CommandType {
        match self {
            DimseCommand::Find { .. } => CommandType::CFind,
            DimseCommand::Move { .. } => CommandType::CMove,
        }
    }

    /// 渲染为命令行文本
    pub fn render(&self, connection: &PacsConnection) -> String {
        match self {
            DimseCommand::Find { patient_id } => format!(
                "findscu -c {} -r StudyInstanceUID -m PatientID={} -m ModalitiesInStudy={}",
                connection.remote_address(),
                patient_id,
                XA_MODALITY
            ),
            DimseCommand::Move { study_instance_uid } => format!(
                "movescu -c {} -aet {} -aem {} -m StudyInstanceUID={}",
                connection.remote_address(),
                connection.local_ae_title,
                connection.dest_ae_title,
                study_instance_uid
            ),
        }
    }
}

/// 命令日志条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLogEntry {
    pub command_type: CommandType,
    pub line: String,
}

/// 会话内累积的命令日志
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLog {
    entries: Vec<CommandLogEntry>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 渲染命令并追加到日志，返回渲染后的文本
    pub fn record(&mut self, command: &DimseCommand, connection: &PacsConnection) -> String {
        let line = command.render(connection);
        debug!("{} 命令: {}", command.command_type(), line);
        self.entries.push(CommandLogEntry {
            command_type: command.command_type(),
            line: line.clone(),
        });
        line
    }

    pub fn entries(&self) -> &[CommandLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 以终端文本形式输出，每条命令一行
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.line);
            text.push('\n');
        }
        text
    }
}
