use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use avsync_player::core::{
    FrameContext, PlayerEvent, PlayerOptions, PlayerState, TrackType, AV_TIME_BASE_Q,
};
use avsync_player::player::{FrameSink, Player, SyntheticBackend, SyntheticMedia};

/// 合成媒体播放演示
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 媒体地址（合成后端忽略其内容，只用于日志）
    #[arg(value_name = "URL", default_value = "synthetic://demo")]
    url: String,

    /// 合成媒体时长（秒）
    #[arg(
        short = 'd',
        long = "duration",
        value_name = "SECS",
        default_value_t = 5.0,
        value_parser = positive_secs
    )]
    duration: f64,

    /// 播放速率，覆盖配置文件
    #[arg(short = 'r', long = "rate", value_name = "RATE")]
    rate: Option<f64>,

    /// 开始播放后 seek 到该位置（秒）
    #[arg(short = 's', long = "seek-to", value_name = "SECS", value_parser = non_negative_secs)]
    seek_to: Option<f64>,

    /// 发起 seek 前等待的时间（毫秒）
    #[arg(long = "seek-after", value_name = "MS", default_value_t = 500)]
    seek_after_ms: u64,

    /// JSON 配置文件
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// 不播放音频
    #[arg(long = "no-audio")]
    no_audio: bool,

    /// 不播放视频
    #[arg(long = "no-video")]
    no_video: bool,

    /// 日志详细程度（默认 info，-v: debug，-vv+: trace）
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbosity: u8,
}

/// 解析秒数：必须是有限的正数
fn positive_secs(s: &str) -> std::result::Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e| format!("无效的秒数 '{}': {}", s, e))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("秒数必须大于 0: {}", s))
    }
}

/// 解析秒数：允许 0
fn non_negative_secs(s: &str) -> std::result::Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e| format!("无效的秒数 '{}': {}", s, e))?;
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(format!("秒数不能为负: {}", s))
    }
}

/// 打印前几帧和之后每 100 帧的渲染端
struct LogSink {
    track: TrackType,
    frames: AtomicUsize,
}

impl LogSink {
    fn new(track: TrackType) -> Arc<Self> {
        Arc::new(Self {
            track,
            frames: AtomicUsize::new(0),
        })
    }
}

impl FrameSink for LogSink {
    fn render(&self, context: &FrameContext) -> avsync_player::Result<()> {
        let n = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if n <= 3 || n % 100 == 0 {
            info!(
                "🖼️  {} 第 {} 帧: pts={:?}, 时钟={:.3}s, {:?}",
                self.track, n, context.pts, context.clock, context.frame.format
            );
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    info!("🎬 avsync_player 演示启动");

    let mut options = match &args.config {
        Some(path) => PlayerOptions::from_file(path)
            .with_context(|| format!("加载配置失败: {}", path.display()))?,
        None => PlayerOptions::default(),
    };
    if let Some(rate) = args.rate {
        options.playback_rate = rate;
    }
    options.stop_on_eof = true;
    if args.no_audio {
        options.tracks.retain(|t| *t != TrackType::Audio);
    }
    if args.no_video {
        options.tracks.retain(|t| *t != TrackType::Video);
    }
    let rate = options.playback_rate;

    let backend = Arc::new(SyntheticBackend::new(SyntheticMedia::with_duration(
        args.duration,
    )));
    let stats = backend.stats();

    let player = Player::builder(backend)
        .options(options)
        .sink(TrackType::Video, LogSink::new(TrackType::Video))
        .sink(TrackType::Audio, LogSink::new(TrackType::Audio))
        .listener(|event| match event {
            PlayerEvent::Render(_) => {}
            PlayerEvent::RenderError { track, message } => {
                warn!("⚠ {} 渲染失败: {}", track, message)
            }
            PlayerEvent::EndOfStream { track } => info!("📭 {} 播放结束", track),
            PlayerEvent::PlaybackFinished => info!("🏁 播放完毕"),
            other => info!("📣 {:?}", other),
        })
        .build()
        .context("创建播放器失败")?;

    player.play(&args.url).context("启动播放失败")?;
    if let Some(info) = player.media_info() {
        info!(
            "📄 媒体: 时长 {:?}us, {} 条流",
            info.duration_us,
            info.streams.len()
        );
    }

    if let Some(seconds) = args.seek_to {
        thread::sleep(Duration::from_millis(args.seek_after_ms));
        player
            .notify_seek(AV_TIME_BASE_Q.from_seconds(seconds), None)
            .context("Seek 请求失败")?;
    }

    let timeout = Duration::try_from_secs_f64(args.duration / rate + 10.0)
        .context("播放时长超出可等待范围")?;
    if !player.wait_for_state(PlayerState::Stopped, timeout) {
        warn!("⚠ 等待播放结束超时，主动停止");
        player.stop().context("停止失败")?;
    }

    info!(
        "📊 读包 {}，解码 {}，seek {} 次",
        stats.packets_read(),
        stats.packets_decoded(),
        stats.seeks()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_must_be_positive() {
        assert!(Args::try_parse_from(["avsync_player", "-d", "-5"]).is_err());
        assert!(Args::try_parse_from(["avsync_player", "-d", "0"]).is_err());
        assert!(Args::try_parse_from(["avsync_player", "-d", "inf"]).is_err());
        let args = Args::try_parse_from(["avsync_player", "-d", "2.5"]).unwrap();
        assert_eq!(args.duration, 2.5);
    }

    #[test]
    fn seek_target_may_be_zero_but_not_negative() {
        assert!(Args::try_parse_from(["avsync_player", "--seek-to", "0"]).is_ok());
        assert!(Args::try_parse_from(["avsync_player", "--seek-to", "-1"]).is_err());
    }
}
