//! 音画同步策略
//!
//! 渲染线程每拿到一帧，算出本轨道时钟后交给 `ClockSync::decide`，
//! 根据返回值决定直接渲染、睡一会儿再渲染，还是丢掉这一帧。

use std::time::Duration;

use crate::core::{ClockSnapshot, SyncOptions};

/// 同步决策
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncDecision {
    /// 直接渲染
    Pass,
    /// 本轨道超前，先睡这么久（媒体时间，调用方按播放速率换算）
    Sleep(Duration),
    /// 本轨道严重落后，丢弃这一帧
    Drop,
}

/// 同步策略接口（会话启动时注入渲染线程）
pub trait ClockSync: Send + Sync {
    /// `own` 为本轨道时钟，`reference` 为参考时钟（另一轨道或实时时钟）
    fn decide(&self, own: &ClockSnapshot, reference: Option<&ClockSnapshot>) -> SyncDecision;
}

/// 阈值同步策略
///
/// - 参考时钟不稳定（seek 之后尚未出帧）：放行
/// - delta < -丢帧阈值：丢帧
/// - -丢帧阈值 <= delta <= 0：放行（轻微落后，靠不睡觉追上）
/// - delta > 0：睡 min(delta, 睡眠上限)
#[derive(Debug, Clone, Copy)]
pub struct ThresholdSync {
    drop_threshold: f64,
    max_sleep: f64,
}

impl ThresholdSync {
    pub fn new(options: &SyncOptions) -> Self {
        Self {
            drop_threshold: options.drop_threshold_ms / 1000.0,
            max_sleep: options.max_sleep_ms / 1000.0,
        }
    }
}

impl Default for ThresholdSync {
    fn default() -> Self {
        Self::new(&SyncOptions::default())
    }
}

impl ClockSync for ThresholdSync {
    fn decide(&self, own: &ClockSnapshot, reference: Option<&ClockSnapshot>) -> SyncDecision {
        let Some(reference) = reference else {
            return SyncDecision::Pass;
        };
        if !reference.stable || !own.stable {
            return SyncDecision::Pass;
        }

        let delta = own.seconds - reference.seconds;
        if delta < -self.drop_threshold {
            SyncDecision::Drop
        } else if delta <= 0.0 {
            SyncDecision::Pass
        } else {
            SyncDecision::Sleep(Duration::from_secs_f64(delta.min(self.max_sleep)))
        }
    }
}
