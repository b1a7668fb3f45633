//! 模拟传输延迟
//!
//! 延迟模型只计算等待时长，由调用方决定是否以及如何等待。

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 延迟配置，时长均以时间单位计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// 是否启用延迟
    pub enabled: bool,
    /// 一个时间单位对应的毫秒数
    pub time_unit_ms: u64,
    /// 检索开始前的固定延迟
    pub initial_search_delay: f64,
    /// 每位患者检索延迟下限
    pub search_delay_min: f64,
    /// 每位患者检索延迟上限
    pub search_delay_max: f64,
    /// 每幅图像传输延迟下限
    pub per_image_min: f64,
    /// 每幅图像传输延迟上限
    pub per_image_max: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            time_unit_ms: 1000,
            initial_search_delay: 1.0,
            search_delay_min: 0.5,
            search_delay_max: 1.5,
            per_image_min: 0.02,
            per_image_max: 0.05,
        }
    }
}

/// 延迟模型
#[derive(Debug, Clone)]
pub struct LatencyModel {
    config: PacingConfig,
}

impl LatencyModel {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    /// 不产生任何延迟的模型
    pub fn disabled() -> Self {
        Self::new(PacingConfig {
            enabled: false,
            ..PacingConfig::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// 检索开始前的延迟
    pub fn initial_search_delay(&self) -> Duration {
        self.units(self.config.initial_search_delay)
    }

    /// 单个患者检索的延迟
    pub fn search_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let units = draw(rng, self.config.search_delay_min, self.config.search_delay_max);
        self.units(units)
    }

    /// 一个数据块的传输延迟：`chunk_size * uniform(min, max)`
    pub fn chunk_delay<R: Rng + ?Sized>(&self, rng: &mut R, chunk_size: u32) -> Duration {
        let per_image = draw(rng, self.config.per_image_min, self.config.per_image_max);
        self.units(per_image * f64::from(chunk_size))
    }

    fn units(&self, units: f64) -> Duration {
        if !self.config.enabled || units.is_nan() || units <= 0.0 {
            return Duration::ZERO;
        }
        let unit = Duration::from_millis(self.config.time_unit_ms);
        // 超出 Duration 表示范围时饱和
        Duration::try_from_secs_f64(unit.as_secs_f64() * units).unwrap_or(Duration::MAX)
    }
}

impl Default for LatencyModel {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max > min {
        rng.gen_range(min..=max)
    } else {
        min
    }
}
