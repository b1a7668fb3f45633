//! 合成检查生成器
//!
//! 为给定的PatientID随机生成1到4个XA检查记录。生成过程只依赖传入的随机源。

use chrono::{Duration, Local, NaiveDate};
use pacs_core::utils::synthetic_study_uid;
use pacs_core::{DateRange, StudyRecord, XA_MODALITY};
use rand::Rng;
use std::ops::RangeInclusive;
use tracing::debug;

/// 合成患者姓名池
pub const PATIENT_NAMES: [&str; 5] = [
    "Juan Pérez",
    "María López",
    "Carlos García",
    "Ana Rodríguez",
    "Luis Gómez",
];

/// 每个检查的图像数范围
pub const IMAGE_COUNT_RANGE: RangeInclusive<u32> = 50..=300;

/// 每个检查的序列数范围
pub const SEQUENCE_COUNT_RANGE: RangeInclusive<u32> = 1..=5;

/// 未指定日期范围时，检查日期回溯的最大天数
pub const TRAILING_WINDOW_DAYS: i64 = 365;

/// 每位患者检查数量的权重（百分比），大多数患者只有一个相关检查
const STUDY_COUNT_WEIGHTS: [(usize, u32); 4] = [(1, 60), (2, 20), (3, 10), (4, 10)];

/// 检查生成器
#[derive(Debug, Clone)]
pub struct StudyGenerator {
    today: NaiveDate,
}

impl StudyGenerator {
    /// 以本地当前日期为基准创建生成器
    pub fn new() -> Self {
        Self {
            today: Local::now().date_naive(),
        }
    }

    /// 以指定日期为基准创建生成器
    pub fn with_today(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// 为一位患者生成检查记录
    ///
    /// 同一次调用生成的记录共享患者姓名；指定日期范围时还共享同一检查日期，
    /// 否则每个记录在过去一年内各自抽取日期。
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        patient_id: &str,
        date_range: Option<&DateRange>,
    ) -> Vec<StudyRecord> {
        let patient_name = PATIENT_NAMES[rng.gen_range(0..PATIENT_NAMES.len())];
        let study_count = draw_study_count(rng);
        let shared_date = date_range.map(|range| draw_date_in_range(rng, range));

        let studies: Vec<StudyRecord> = (1..=study_count)
            .map(|index| {
                let study_instance_uid = synthetic_study_uid(rng, patient_id, index);
                let study_date = match shared_date {
                    Some(date) => date,
                    None => self.draw_trailing_date(rng),
                };

                StudyRecord {
                    patient_id: patient_id.to_string(),
                    patient_name: patient_name.to_string(),
                    study_instance_uid,
                    study_date,
                    modality: XA_MODALITY.to_string(),
                    num_images: rng.gen_range(IMAGE_COUNT_RANGE),
                    num_sequences: rng.gen_range(SEQUENCE_COUNT_RANGE),
                }
            })
            .collect();

        debug!(
            "为患者 {} 生成了 {} 个检查 (姓名: {})",
            patient_id,
            studies.len(),
            patient_name
        );
        studies
    }

    fn draw_trailing_date<R: Rng + ?Sized>(&self, rng: &mut R) -> NaiveDate {
        let days_ago = rng.gen_range(1..=TRAILING_WINDOW_DAYS);
        self.today - Duration::days(days_ago)
    }
}

impl Default for StudyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// 按权重抽取检查数量
fn draw_study_count<R: Rng + ?Sized>(rng: &mut R) -> usize {
    let total: u32 = STUDY_COUNT_WEIGHTS.iter().map(|(_, weight)| weight).sum();
    let mut roll = rng.gen_range(0..total);
    for (count, weight) in STUDY_COUNT_WEIGHTS {
        if roll < weight {
            return count;
        }
        roll -= weight;
    }
    1
}

fn draw_date_in_range<R: Rng + ?Sized>(rng: &mut R, range: &DateRange) -> NaiveDate {
    let offset = rng.gen_range(0..range.span_days());
    range.start + Duration::days(offset)
}
