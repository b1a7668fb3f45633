//! # PACS Core
//!
//! 模拟PACS系统的核心模块，提供检查记录、进度计数等基础数据结构、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{PacsError, Result};
pub use models::*;
