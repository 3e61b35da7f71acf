use serde::{Deserialize, Serialize};
use std::fmt;

/// 轨道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Video,
    Audio,
    Subtitle,
}

impl TrackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackType::Video => "video",
            TrackType::Audio => "audio",
            TrackType::Subtitle => "subtitle",
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 有理数时间基
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

/// 全局时间基（微秒），未指定轨道时 seek 使用
pub const AV_TIME_BASE_Q: Rational = Rational { num: 1, den: 1_000_000 };

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn to_f64(&self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /// 把当前时间基下的时间戳换算为秒
    pub fn to_seconds(&self, ts: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ts as f64 * self.num as f64 / self.den as f64
    }

    /// 把秒换算为当前时间基下的时间戳（向下取整）
    pub fn from_seconds(&self, seconds: f64) -> i64 {
        if self.num == 0 || self.den == 0 {
            return 0;
        }
        (seconds * self.den as f64 / self.num as f64).floor() as i64
    }
}

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    RGBA,
    RGB,
    YUV420P,
    NV12,
}

/// 音频采样格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    F32,
    I16,
}

/// 解码后数据的格式描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    Video {
        width: u32,
        height: u32,
        pixel: PixelFormat,
    },
    Audio {
        sample_rate: u32,
        channels: u16,
        samples: usize,
        sample: SampleFormat,
    },
    Subtitle,
}

/// 格式转换目标（渲染端期望的格式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetFormat {
    pub pixel: Option<PixelFormat>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// 流信息（由 DemuxerSource 在 find_stream_info 时给出）
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub track_type: TrackType,
    pub time_base: Rational,
    /// 名义帧时长（时间基单位），时间戳缺失时用于推进时钟
    pub frame_duration: i64,
    pub codec_name: String,
}

/// 媒体信息
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub duration_us: Option<i64>,
    pub streams: Vec<StreamInfo>,
}

/// 压缩数据包（所有权唯一，从解封装流向解码）
#[derive(Debug, PartialEq, Eq)]
pub struct Packet {
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub duration: i64,
    pub keyframe: bool,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// read_one_packet 返回的包摘要，包本身已经进入队列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    pub track_type: TrackType,
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub size: usize,
}

/// 解码后的帧（所有权唯一，从解码流向渲染）
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub duration: i64,
    pub format: FrameFormat,
    /// 数据仍在显存中（需要下载/转换后才能交给 CPU 端 sink）
    pub hardware: bool,
    pub data: Vec<u8>,
}

/// 交给 sink 的帧上下文
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub track_type: TrackType,
    pub stream_index: usize,
    pub pts: Option<i64>,
    /// 该帧对应的轨道时钟（秒）
    pub clock: f64,
    pub frame: Frame,
}

/// 播放器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Stopped,
    Preparing,
    Playing,
    Pausing,
    Paused,
    Seeking,
    Stopping,
}

/// 工作线程角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    Demuxer,
    Decoder(TrackType),
    Renderer(TrackType),
    RequestHandler,
}

impl ThreadRole {
    /// 线程名（用于 thread::Builder 和日志）
    pub fn thread_name(&self) -> String {
        match self {
            ThreadRole::Demuxer => "demuxer".to_string(),
            ThreadRole::Decoder(t) => format!("decoder-{}", t),
            ThreadRole::Renderer(t) => format!("renderer-{}", t),
            ThreadRole::RequestHandler => "request-handler".to_string(),
        }
    }
}

/// 缓冲状态信息（用于监控和调试）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStatus {
    /// 视频数据包队列长度
    pub video_packets: usize,

    /// 音频数据包队列长度
    pub audio_packets: usize,

    /// 视频帧队列长度
    pub video_frames: usize,

    /// 音频帧队列长度
    pub audio_frames: usize,
}

impl BufferStatus {
    pub fn is_empty(&self) -> bool {
        self.video_packets == 0
            && self.audio_packets == 0
            && self.video_frames == 0
            && self.audio_frames == 0
    }
}
