//! 下载进度核算
//!
//! 单个检查按图像数分成固定数量的块逐块推进；全局进度在每个检查完成后累加一次。
//! 序列不分块，其体积始终按总量报告。

use pacs_core::utils::percent_floor;
use pacs_core::{ProgressState, StudyRecord};
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;

/// 每个检查的分块数
pub const CHUNKS_PER_STUDY: usize = 10;

/// 把图像数划分为固定数量的块
///
/// 块大小为 `num_images / 10`（至少为1），不超过剩余图像数；最后一块吸收余数，
/// 因此各块之和恰好等于 `num_images`。
pub fn partition_images(num_images: u32) -> [u32; CHUNKS_PER_STUDY] {
    let chunk_size = (num_images / CHUNKS_PER_STUDY as u32).max(1);
    let mut chunks = [0u32; CHUNKS_PER_STUDY];
    let mut assigned = 0u32;

    for (i, chunk) in chunks.iter_mut().enumerate() {
        let remaining = num_images - assigned;
        *chunk = if i == CHUNKS_PER_STUDY - 1 {
            remaining
        } else {
            chunk_size.min(remaining)
        };
        assigned += *chunk;
    }

    chunks
}

/// 单个检查的进度快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyProgress {
    pub study_instance_uid: String,
    /// 从1开始的块序号
    pub chunk_index: usize,
    pub chunk_size: u32,
    /// 图像进度，字节按图像数线性插值
    pub images: ProgressState,
    pub num_sequences: u32,
    pub sequences_mb: f64,
}

impl StudyProgress {
    pub fn percent_complete(&self) -> u8 {
        self.images.percent_complete
    }

    pub fn is_last_chunk(&self) -> bool {
        self.chunk_index == CHUNKS_PER_STUDY
    }
}

/// 单个检查的下载过程，惰性产生每块完成后的快照
#[derive(Debug, Clone)]
pub struct StudyDownload {
    study_instance_uid: String,
    chunks: [u32; CHUNKS_PER_STUDY],
    next_chunk: usize,
    images: ProgressState,
    num_sequences: u32,
    sequences_mb: f64,
}

/// 开始下载一个检查；每次调用都从零开始
pub fn download_study(study: &StudyRecord) -> StudyDownload {
    StudyDownload {
        study_instance_uid: study.study_instance_uid.clone(),
        chunks: partition_images(study.num_images),
        next_chunk: 0,
        images: ProgressState::new(study.num_images, study.images_mb()),
        num_sequences: study.num_sequences,
        sequences_mb: study.sequences_mb(),
    }
}

impl StudyDownload {
    /// 当前进度（尚未推进时为零）
    pub fn state(&self) -> &ProgressState {
        &self.images
    }
}

impl Iterator for StudyDownload {
    type Item = StudyProgress;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk_size = *self.chunks.get(self.next_chunk)?;
        self.next_chunk += 1;
        self.images.advance(chunk_size);

        Some(StudyProgress {
            study_instance_uid: self.study_instance_uid.clone(),
            chunk_index: self.next_chunk,
            chunk_size,
            images: self.images.clone(),
            num_sequences: self.num_sequences,
            sequences_mb: self.sequences_mb,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = CHUNKS_PER_STUDY - self.next_chunk;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StudyDownload {}

impl FusedIterator for StudyDownload {}

/// 全局下载进度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalProgress {
    pub studies_completed: usize,
    pub studies_total: usize,
    pub images_completed: u64,
    pub images_total: u64,
    pub sequences_completed: u64,
    pub sequences_total: u64,
    pub images_mb_completed: f64,
    pub images_mb_total: f64,
    pub sequences_mb_completed: f64,
    pub sequences_mb_total: f64,
    /// `studies_completed / studies_total` 的向下取整百分比
    pub percent_complete: u8,
}

impl GlobalProgress {
    /// 按待下载检查计算总量，已完成计数归零
    pub fn for_studies(studies: &[StudyRecord]) -> Self {
        let mut progress = Self {
            studies_completed: 0,
            studies_total: studies.len(),
            images_completed: 0,
            images_total: 0,
            sequences_completed: 0,
            sequences_total: 0,
            images_mb_completed: 0.0,
            images_mb_total: 0.0,
            sequences_mb_completed: 0.0,
            sequences_mb_total: 0.0,
            percent_complete: 0,
        };

        for study in studies {
            progress.images_total += u64::from(study.num_images);
            progress.sequences_total += u64::from(study.num_sequences);
            progress.images_mb_total += study.images_mb();
            progress.sequences_mb_total += study.sequences_mb();
        }
        progress.recompute();
        progress
    }

    /// 记录一个检查下载完成
    pub fn complete_study(&mut self, study: &StudyRecord) {
        self.studies_completed = (self.studies_completed + 1).min(self.studies_total);
        self.images_completed += u64::from(study.num_images);
        self.sequences_completed += u64::from(study.num_sequences);
        self.images_mb_completed += study.images_mb();
        self.sequences_mb_completed += study.sequences_mb();
        self.recompute();
    }

    pub fn is_complete(&self) -> bool {
        self.studies_completed >= self.studies_total
    }

    fn recompute(&mut self) {
        self.percent_complete =
            percent_floor(self.studies_completed as u64, self.studies_total as u64);
    }
}
