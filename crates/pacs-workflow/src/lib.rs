//! # PACS检索与下载模拟
//!
//! - 检查生成器：为每个PatientID生成随机的XA检查记录
//! - 进度核算：按块推进单个检查的下载进度，并在检查完成后累加全局进度
//! - 延迟模型：计算模拟的检索与传输等待时长
//! - 会话：保存检索结果、选择和命令日志，驱动检索与下载过程

pub mod generator;
pub mod pacing;
pub mod progress;
pub mod session;

// 重新导出主要类型
pub use generator::StudyGenerator;
pub use pacing::{LatencyModel, PacingConfig};
pub use progress::{
    download_study, partition_images, GlobalProgress, StudyDownload, StudyProgress,
    CHUNKS_PER_STUDY,
};
pub use session::{
    DownloadEvent, DownloadPass, SearchPass, SearchRequest, SearchStep, Selection, SessionState,
};
