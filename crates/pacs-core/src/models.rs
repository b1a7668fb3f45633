//! 核心数据模型定义

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::percent_floor;

/// 模拟检索的检查设备类型，固定为血管造影
pub const XA_MODALITY: &str = "XA";

/// 每幅图像的估算体积 (MB)
pub const MB_PER_IMAGE: f64 = 0.5;

/// 每个序列的估算体积 (MB)
pub const MB_PER_SEQUENCE: f64 = 15.0;

/// 合成检查记录
///
/// 体积字段不单独存储，始终由图像数和序列数推导。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub patient_id: String,
    pub patient_name: String,
    pub study_instance_uid: String, // 合成的 Study Instance UID
    pub study_date: NaiveDate,
    pub modality: String,
    pub num_images: u32,
    pub num_sequences: u32,
}

impl StudyRecord {
    /// 图像总体积 (MB)
    pub fn images_mb(&self) -> f64 {
        f64::from(self.num_images) * MB_PER_IMAGE
    }

    /// 序列总体积 (MB)
    pub fn sequences_mb(&self) -> f64 {
        f64::from(self.num_sequences) * MB_PER_SEQUENCE
    }

    /// 检查总体积 (MB)
    pub fn total_mb(&self) -> f64 {
        self.images_mb() + self.sequences_mb()
    }
}

/// 检查日期范围（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// 创建日期范围；起始晚于结束时收缩为起始当天
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            Self { start, end: start }
        } else {
            Self { start, end }
        }
    }

    /// 单日范围
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// 范围包含的天数（至少为1）
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days().max(0) + 1
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

/// 单次操作的进度计数
///
/// 字节数以MB计，由已完成单位按比例插值得到。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub units_completed: u32,
    pub units_total: u32,
    pub bytes_completed: f64,
    pub bytes_total: f64,
    pub percent_complete: u8,
}

impl ProgressState {
    /// 创建归零的进度
    pub fn new(units_total: u32, bytes_total: f64) -> Self {
        let mut state = Self {
            units_completed: 0,
            units_total,
            bytes_completed: 0.0,
            bytes_total,
            percent_complete: 0,
        };
        state.recompute();
        state
    }

    /// 推进若干单位，不会超过总数
    pub fn advance(&mut self, units: u32) {
        self.units_completed = self
            .units_completed
            .saturating_add(units)
            .min(self.units_total);
        self.recompute();
    }

    pub fn is_complete(&self) -> bool {
        self.units_completed >= self.units_total
    }

    fn recompute(&mut self) {
        self.percent_complete =
            percent_floor(u64::from(self.units_completed), u64::from(self.units_total));
        self.bytes_completed = if self.units_total == 0 {
            self.bytes_total
        } else {
            f64::from(self.units_completed) / f64::from(self.units_total) * self.bytes_total
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_study(num_images: u32, num_sequences: u32) -> StudyRecord {
        StudyRecord {
            patient_id: "123456".to_string(),
            patient_name: "María López".to_string(),
            study_instance_uid: "1.2.840.113619.1234.123456_123456_EstudioXA_1".to_string(),
            study_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            modality: XA_MODALITY.to_string(),
            num_images,
            num_sequences,
        }
    }

    #[test]
    fn test_study_sizes_are_derived() {
        let study = sample_study(123, 4);
        assert_eq!(study.images_mb(), 61.5);
        assert_eq!(study.sequences_mb(), 60.0);
        assert_eq!(study.total_mb(), 121.5);
    }

    #[test]
    fn test_inverted_range_collapses_to_start() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let range = DateRange::new(start, end);
        assert_eq!(range, DateRange::single_day(start));
        assert_eq!(range.span_days(), 1);
    }

    #[test]
    fn test_range_span() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        assert_eq!(range.span_days(), 31);
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
    }

    #[test]
    fn test_progress_advance() {
        let mut state = ProgressState::new(200, 100.0);
        state.advance(50);
        assert_eq!(state.percent_complete, 25);
        assert_eq!(state.bytes_completed, 25.0);

        state.advance(1000);
        assert_eq!(state.units_completed, 200);
        assert_eq!(state.percent_complete, 100);
        assert!(state.is_complete());
    }

    #[test]
    fn test_empty_progress_is_complete() {
        let state = ProgressState::new(0, 0.0);
        assert_eq!(state.percent_complete, 100);
        assert!(state.is_complete());
    }
}
