//! 内存合成媒体后端
//!
//! 生成确定性的音视频交织包流，不依赖任何真实容器或编解码库。
//! 演示程序和端到端测试都用它驱动整条流水线。

use log::{debug, info};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::{
    DecodeError, Frame, FrameFormat, MediaInfo, Packet, PixelFormat, PlayerError, Rational,
    Result, SampleFormat, StreamInfo, TargetFormat, TrackType, AV_TIME_BASE_Q,
};
use crate::player::demuxer_source::{
    DecodeCapability, DemuxerSource, FrameAdapter, MediaBackend,
};

pub const VIDEO_STREAM_INDEX: usize = 0;
pub const AUDIO_STREAM_INDEX: usize = 1;

const VIDEO_TIME_BASE: Rational = Rational::new(1, 90000);

/// 合成媒体的参数
#[derive(Debug, Clone)]
pub struct SyntheticMedia {
    /// 总时长（秒）
    pub duration: f64,
    /// 视频帧率，None 表示没有视频流
    pub video_fps: Option<f64>,
    pub video_size: (u32, u32),
    /// 音频采样率，None 表示没有音频流
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: u16,
    /// 每个音频包的采样数
    pub audio_samples_per_packet: u32,
    /// 每次读包的耗时
    pub read_delay: Duration,
    /// 每次解码的耗时
    pub decode_delay: Duration,
    /// 每次 seek 的耗时
    pub seek_delay: Duration,
    pub fail_open: bool,
    pub fail_seek: bool,
    /// 每 N 个视频包有一个解码失败
    pub corrupt_every: Option<usize>,
}

impl Default for SyntheticMedia {
    fn default() -> Self {
        Self {
            duration: 10.0,
            video_fps: Some(30.0),
            video_size: (320, 240),
            audio_sample_rate: Some(48000),
            audio_channels: 2,
            audio_samples_per_packet: 1024,
            read_delay: Duration::ZERO,
            decode_delay: Duration::ZERO,
            seek_delay: Duration::ZERO,
            fail_open: false,
            fail_seek: false,
            corrupt_every: None,
        }
    }
}

impl SyntheticMedia {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    fn video_stream(&self) -> Option<StreamInfo> {
        let fps = self.video_fps?;
        Some(StreamInfo {
            index: VIDEO_STREAM_INDEX,
            track_type: TrackType::Video,
            time_base: VIDEO_TIME_BASE,
            frame_duration: (f64::from(VIDEO_TIME_BASE.den) / fps).round().max(1.0) as i64,
            codec_name: "synthetic-video".to_string(),
        })
    }

    fn audio_stream(&self) -> Option<StreamInfo> {
        let sample_rate = self.audio_sample_rate?;
        Some(StreamInfo {
            index: AUDIO_STREAM_INDEX,
            track_type: TrackType::Audio,
            time_base: Rational::new(1, sample_rate as i32),
            frame_duration: i64::from(self.audio_samples_per_packet),
            codec_name: "synthetic-audio".to_string(),
        })
    }

    pub fn streams(&self) -> Vec<StreamInfo> {
        self.video_stream()
            .into_iter()
            .chain(self.audio_stream())
            .collect()
    }
}

/// 运行期统计（测试用来观察流水线）
#[derive(Debug, Default)]
pub struct SyntheticStats {
    pub packets_read: AtomicUsize,
    pub packets_decoded: AtomicUsize,
    pub seeks: AtomicUsize,
    last_seek_started: Mutex<Option<Instant>>,
}

impl SyntheticStats {
    pub fn packets_read(&self) -> usize {
        self.packets_read.load(Ordering::SeqCst)
    }

    pub fn packets_decoded(&self) -> usize {
        self.packets_decoded.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    /// 最近一次容器 seek 开始的时刻
    pub fn last_seek_started(&self) -> Option<Instant> {
        *self.last_seek_started.lock()
    }
}

/// 单条流的读取游标
struct Cursor {
    stream: StreamInfo,
    next: i64,
    /// 总包数
    count: i64,
}

impl Cursor {
    fn new(stream: StreamInfo, duration: f64) -> Self {
        let step = stream.time_base.to_seconds(stream.frame_duration);
        let count = (duration / step - 1e-9).ceil().max(0.0) as i64;
        Self {
            stream,
            next: 0,
            count,
        }
    }

    fn step_secs(&self) -> f64 {
        self.stream.time_base.to_seconds(self.stream.frame_duration)
    }

    fn next_time(&self) -> Option<f64> {
        (self.next < self.count).then(|| self.next as f64 * self.step_secs())
    }

    /// 定位到不晚于目标时间的最后一个包
    fn seek(&mut self, seconds: f64) {
        let index = (seconds / self.step_secs() + 1e-9).floor() as i64;
        self.next = index.clamp(0, self.count);
    }
}

/// 合成容器
pub struct SyntheticSource {
    media: SyntheticMedia,
    stats: Arc<SyntheticStats>,
    cursors: Vec<Cursor>,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(media: SyntheticMedia, stats: Arc<SyntheticStats>) -> Self {
        Self {
            media,
            stats,
            cursors: Vec::new(),
            opened: false,
        }
    }
}

impl DemuxerSource for SyntheticSource {
    fn open(&mut self, url: &str) -> Result<()> {
        if self.media.fail_open {
            return Err(PlayerError::OpenError(url.to_string()));
        }
        info!("🧪 打开合成媒体: {} ({:.1}s)", url, self.media.duration);
        self.cursors = self
            .media
            .streams()
            .into_iter()
            .map(|s| Cursor::new(s, self.media.duration))
            .collect();
        self.opened = true;
        Ok(())
    }

    fn find_stream_info(&mut self) -> Result<MediaInfo> {
        if !self.opened {
            return Err(PlayerError::StreamInfoError("媒体源尚未打开".to_string()));
        }
        Ok(MediaInfo {
            duration_us: Some((self.media.duration * 1_000_000.0) as i64),
            streams: self.media.streams(),
        })
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        if !self.media.read_delay.is_zero() {
            thread::sleep(self.media.read_delay);
        }

        // 按时间交织；同一时刻视频在前
        let next = self
            .cursors
            .iter_mut()
            .filter_map(|c| c.next_time().map(|t| (t, c)))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.stream.index.cmp(&b.1.stream.index)));
        let Some((_, cursor)) = next else {
            return Ok(None);
        };

        let pts = cursor.next * cursor.stream.frame_duration;
        cursor.next += 1;
        self.stats.packets_read.fetch_add(1, Ordering::SeqCst);

        Ok(Some(Packet {
            stream_index: cursor.stream.index,
            pts: Some(pts),
            duration: cursor.stream.frame_duration,
            keyframe: true,
            data: pts.to_le_bytes().to_vec(),
        }))
    }

    fn seek(&mut self, stream_index: Option<usize>, timestamp: i64) -> Result<()> {
        *self.stats.last_seek_started.lock() = Some(Instant::now());
        if !self.media.seek_delay.is_zero() {
            thread::sleep(self.media.seek_delay);
        }
        if self.media.fail_seek {
            return Err(PlayerError::SeekError("合成媒体不支持 seek".to_string()));
        }

        let time_base = match stream_index {
            Some(index) => self
                .cursors
                .iter()
                .find(|c| c.stream.index == index)
                .map(|c| c.stream.time_base)
                .ok_or_else(|| PlayerError::SeekError(format!("没有流 #{}", index)))?,
            None => AV_TIME_BASE_Q,
        };
        let seconds = time_base.to_seconds(timestamp).max(0.0);
        for cursor in &mut self.cursors {
            cursor.seek(seconds);
        }
        self.stats.seeks.fetch_add(1, Ordering::SeqCst);
        debug!("🧪 合成媒体 seek 到 {:.3}s", seconds);
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "synthetic({:.1}s, video={:?}, audio={:?})",
            self.media.duration, self.media.video_fps, self.media.audio_sample_rate
        )
    }
}

/// 合成解码器：一个包出一帧
pub struct SyntheticDecoder {
    stream: StreamInfo,
    media: SyntheticMedia,
    stats: Arc<SyntheticStats>,
    pending: VecDeque<Frame>,
    packets: usize,
}

impl SyntheticDecoder {
    fn format(&self) -> FrameFormat {
        match self.stream.track_type {
            TrackType::Video => FrameFormat::Video {
                width: self.media.video_size.0,
                height: self.media.video_size.1,
                pixel: PixelFormat::YUV420P,
            },
            TrackType::Audio => FrameFormat::Audio {
                sample_rate: self.media.audio_sample_rate.unwrap_or(48000),
                channels: self.media.audio_channels,
                samples: self.media.audio_samples_per_packet as usize,
                sample: SampleFormat::F32,
            },
            TrackType::Subtitle => FrameFormat::Subtitle,
        }
    }
}

impl DecodeCapability for SyntheticDecoder {
    fn send_packet(&mut self, packet: &Packet) -> std::result::Result<(), DecodeError> {
        if !self.media.decode_delay.is_zero() {
            thread::sleep(self.media.decode_delay);
        }
        self.packets += 1;
        if self.stream.track_type == TrackType::Video {
            if let Some(n) = self.media.corrupt_every {
                if n > 0 && self.packets % n == 0 {
                    return Err(DecodeError::Failed(format!(
                        "损坏的包 pts={:?}",
                        packet.pts
                    )));
                }
            }
        }
        self.stats.packets_decoded.fetch_add(1, Ordering::SeqCst);
        self.pending.push_back(Frame {
            stream_index: packet.stream_index,
            pts: packet.pts,
            duration: packet.duration,
            format: self.format(),
            hardware: false,
            data: packet.data.clone(),
        });
        Ok(())
    }

    fn receive_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError> {
        self.pending.pop_front().map(Some).ok_or(DecodeError::Again)
    }

    fn flush(&mut self) {
        self.pending.clear();
    }
}

/// 合成像素格式转换：只改格式描述
pub struct SyntheticAdapter;

impl FrameAdapter for SyntheticAdapter {
    fn needs_adaptation(&self, frame: &Frame, target: &TargetFormat) -> bool {
        match (frame.format, target.pixel) {
            (FrameFormat::Video { pixel, .. }, Some(wanted)) => pixel != wanted,
            _ => false,
        }
    }

    fn adapt(&mut self, frame: &Frame, target: &TargetFormat) -> Result<Frame> {
        match (frame.format, target.pixel) {
            (FrameFormat::Video { width, height, .. }, Some(pixel)) => Ok(Frame {
                format: FrameFormat::Video {
                    width,
                    height,
                    pixel,
                },
                ..frame.clone()
            }),
            _ => Err(PlayerError::AdaptError(format!(
                "不支持的转换: {:?}",
                frame.format
            ))),
        }
    }
}

/// 合成媒体后端
#[derive(Clone)]
pub struct SyntheticBackend {
    media: SyntheticMedia,
    stats: Arc<SyntheticStats>,
}

impl SyntheticBackend {
    pub fn new(media: SyntheticMedia) -> Self {
        Self {
            media,
            stats: Arc::new(SyntheticStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SyntheticStats> {
        self.stats.clone()
    }

    pub fn media(&self) -> &SyntheticMedia {
        &self.media
    }
}

impl MediaBackend for SyntheticBackend {
    fn create_source(&self) -> Box<dyn DemuxerSource> {
        Box::new(SyntheticSource::new(self.media.clone(), self.stats.clone()))
    }

    fn create_decoder(&self, stream: &StreamInfo) -> Result<Box<dyn DecodeCapability>> {
        if stream.track_type == TrackType::Subtitle {
            return Err(PlayerError::DecoderOpenError(
                stream.track_type,
                "合成后端没有字幕解码器".to_string(),
            ));
        }
        Ok(Box::new(SyntheticDecoder {
            stream: stream.clone(),
            media: self.media.clone(),
            stats: self.stats.clone(),
            pending: VecDeque::new(),
            packets: 0,
        }))
    }

    fn create_adapter(&self, stream: &StreamInfo) -> Option<Box<dyn FrameAdapter>> {
        (stream.track_type == TrackType::Video)
            .then(|| Box::new(SyntheticAdapter) as Box<dyn FrameAdapter>)
    }
}
