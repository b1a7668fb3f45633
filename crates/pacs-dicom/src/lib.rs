//! # DICOM网络模拟模块
//!
//! 描述与远端PACS的连接参数，并生成 C-FIND / C-MOVE 对应的 `findscu` / `movescu` 命令行文本。
//! 不建立任何真实的网络连接，也不启动任何外部进程。

pub mod association;
pub mod dimse;
pub mod validator;

pub use association::PacsConnection;
pub use dimse::{CommandLog, CommandLogEntry, CommandType, DimseCommand};
pub use validator::{ConnectionValidator, ValidationResult};
