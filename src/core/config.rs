//! 播放器配置
//!
//! 所有字段都有默认值，JSON 里只需写要覆盖的部分。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{PlayerError, Result};
use crate::core::types::{PixelFormat, TargetFormat, TrackType};

/// 队列水位线：生产者在 size >= max 时自我暂停，消费者在 size < min 时唤醒生产者
///
/// min 为 0 时 size < min 永远不成立，生产者一旦暂停就不会再被唤醒。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermarks {
    pub max: usize,
    pub min: usize,
}

impl Watermarks {
    pub const fn new(max: usize, min: usize) -> Self {
        Self { max, min }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min == 0 || self.min >= self.max {
            return Err(PlayerError::ConfigError(format!(
                "{} 水位线无效: min={} max={}（要求 1 <= min < max）",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

// 视频：200 packets ≈ 8秒（25fps），音频：150 packets ≈ 3秒（48kHz）
pub const VIDEO_PACKET_WATERMARKS: Watermarks = Watermarks::new(200, 50);
pub const AUDIO_PACKET_WATERMARKS: Watermarks = Watermarks::new(150, 40);
pub const VIDEO_FRAME_WATERMARKS: Watermarks = Watermarks::new(8, 3);
pub const AUDIO_FRAME_WATERMARKS: Watermarks = Watermarks::new(16, 6);
pub const SUBTITLE_PACKET_WATERMARKS: Watermarks = Watermarks::new(64, 16);
pub const SUBTITLE_FRAME_WATERMARKS: Watermarks = Watermarks::new(16, 4);

/// 每条轨道的一组队列水位线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    pub video_packets: Watermarks,
    pub audio_packets: Watermarks,
    pub subtitle_packets: Watermarks,
    pub video_frames: Watermarks,
    pub audio_frames: Watermarks,
    pub subtitle_frames: Watermarks,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            video_packets: VIDEO_PACKET_WATERMARKS,
            audio_packets: AUDIO_PACKET_WATERMARKS,
            subtitle_packets: SUBTITLE_PACKET_WATERMARKS,
            video_frames: VIDEO_FRAME_WATERMARKS,
            audio_frames: AUDIO_FRAME_WATERMARKS,
            subtitle_frames: SUBTITLE_FRAME_WATERMARKS,
        }
    }
}

impl QueueOptions {
    pub fn packets(&self, track_type: TrackType) -> Watermarks {
        match track_type {
            TrackType::Video => self.video_packets,
            TrackType::Audio => self.audio_packets,
            TrackType::Subtitle => self.subtitle_packets,
        }
    }

    pub fn frames(&self, track_type: TrackType) -> Watermarks {
        match track_type {
            TrackType::Video => self.video_frames,
            TrackType::Audio => self.audio_frames,
            TrackType::Subtitle => self.subtitle_frames,
        }
    }
}

/// 音画同步策略参数
///
/// 阈值是经验值，按策略参数处理而不是硬性不变量。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// 落后超过该值（毫秒）时丢帧
    pub drop_threshold_ms: f64,
    /// 单次同步睡眠的上限（毫秒）
    pub max_sleep_ms: f64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            drop_threshold_ms: 300.0,
            max_sleep_ms: 1000.0,
        }
    }
}

/// 播放器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    /// 希望选中的轨道类型
    pub tracks: Vec<TrackType>,
    pub queues: QueueOptions,
    pub sync: SyncOptions,
    /// 播放速率（1.0 = 正常）
    pub playback_rate: f64,
    /// seek 完成后是否立即预读一个包重新锚定时钟
    pub seek_preread: bool,
    /// 所有轨道播放完毕后自动停止
    pub stop_on_eof: bool,
    /// 视频渲染端期望的格式
    pub video_target: TargetFormat,
    /// 音频渲染端期望的格式
    pub audio_target: TargetFormat,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            tracks: vec![TrackType::Video, TrackType::Audio],
            queues: QueueOptions::default(),
            sync: SyncOptions::default(),
            playback_rate: 1.0,
            seek_preread: false,
            stop_on_eof: true,
            video_target: TargetFormat {
                pixel: Some(PixelFormat::RGBA),
                ..Default::default()
            },
            audio_target: TargetFormat {
                sample_rate: Some(48000),
                channels: Some(2),
                ..Default::default()
            },
        }
    }
}

impl PlayerOptions {
    /// 从 JSON 字符串解析
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: PlayerOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// 从 JSON 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn target_format(&self, track_type: TrackType) -> TargetFormat {
        match track_type {
            TrackType::Video => self.video_target,
            TrackType::Audio => self.audio_target,
            TrackType::Subtitle => TargetFormat::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() {
            return Err(PlayerError::ConfigError("至少需要选择一种轨道".to_string()));
        }
        if !(self.playback_rate.is_finite() && self.playback_rate > 0.0) {
            return Err(PlayerError::ConfigError(format!(
                "播放速率无效: {}",
                self.playback_rate
            )));
        }
        if self.sync.drop_threshold_ms < 0.0 || self.sync.max_sleep_ms <= 0.0 {
            return Err(PlayerError::ConfigError(format!(
                "同步参数无效: {:?}",
                self.sync
            )));
        }
        let q = &self.queues;
        q.video_packets.validate("video_packets")?;
        q.audio_packets.validate("audio_packets")?;
        q.subtitle_packets.validate("subtitle_packets")?;
        q.video_frames.validate("video_frames")?;
        q.audio_frames.validate("audio_frames")?;
        q.subtitle_frames.validate("subtitle_frames")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let options = PlayerOptions::from_json_str(
            r#"{ "playback_rate": 4.0, "sync": { "drop_threshold_ms": 250.0 } }"#,
        )
        .unwrap();
        assert_eq!(options.playback_rate, 4.0);
        assert_eq!(options.sync.drop_threshold_ms, 250.0);
        assert_eq!(options.sync.max_sleep_ms, 1000.0);
        assert_eq!(options.queues, QueueOptions::default());
        assert_eq!(options.tracks, vec![TrackType::Video, TrackType::Audio]);
    }

    #[test]
    fn rejects_inverted_watermarks() {
        let mut options = PlayerOptions::default();
        options.queues.audio_frames = Watermarks::new(4, 4);
        assert!(matches!(options.validate(), Err(PlayerError::ConfigError(_))));
    }

    #[test]
    fn rejects_zero_low_watermark() {
        let mut options = PlayerOptions::default();
        options.queues.video_packets = Watermarks::new(10, 0);
        assert!(matches!(options.validate(), Err(PlayerError::ConfigError(_))));

        let err = PlayerOptions::from_json_str(
            r#"{ "queues": { "audio_frames": { "max": 4, "min": 0 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, PlayerError::ConfigError(_)));

        options.queues.video_packets = Watermarks::new(10, 1);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_rate() {
        let err = PlayerOptions::from_json_str(r#"{ "playback_rate": 0.0 }"#).unwrap_err();
        assert!(matches!(err, PlayerError::ConfigError(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = PlayerOptions::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, PlayerError::JsonError(_)));
    }
}
