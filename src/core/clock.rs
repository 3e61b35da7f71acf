use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// 某一时刻的时钟读数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSnapshot {
    /// 播放位置（秒）
    pub seconds: f64,
    /// seek 之后是否已经观察到新的时间戳
    pub stable: bool,
}

/// 轨道时钟 - 单写多读
///
/// 由所属渲染线程写入（seek 期间由请求处理线程写入），
/// 另一条轨道的渲染线程和 Player 只读。
#[derive(Debug)]
pub struct TrackClock {
    seconds_bits: AtomicU64,
    stable: AtomicBool,
}

impl TrackClock {
    pub fn new() -> Self {
        Self {
            seconds_bits: AtomicU64::new(0f64.to_bits()),
            stable: AtomicBool::new(false),
        }
    }

    pub fn seconds(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::Acquire))
    }

    pub fn is_stable(&self) -> bool {
        self.stable.load(Ordering::Acquire)
    }

    /// 用新观察到的帧时间刷新时钟，并标记为稳定
    pub fn set(&self, seconds: f64) {
        self.seconds_bits.store(seconds.to_bits(), Ordering::Release);
        self.stable.store(true, Ordering::Release);
    }

    /// 无时间戳时按名义时长推进
    pub fn advance(&self, delta_seconds: f64) -> f64 {
        let next = self.seconds() + delta_seconds;
        self.set(next);
        next
    }

    /// seek 后重置：值为目标位置，但在新帧到来前不稳定
    pub fn reset(&self, seconds: f64) {
        self.stable.store(false, Ordering::Release);
        self.seconds_bits.store(seconds.to_bits(), Ordering::Release);
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            seconds: self.seconds(),
            stable: self.is_stable(),
        }
    }
}

impl Default for TrackClock {
    fn default() -> Self {
        Self::new()
    }
}

/// 播放时钟 - 墙上时钟驱动，作为主轨道的同步参考
#[derive(Clone)]
pub struct PlaybackClock {
    inner: Arc<Mutex<ClockInner>>,
}

struct ClockInner {
    base_pts: f64,              // 基准位置（秒）
    base_instant: Instant,      // 基准时刻
    playback_rate: f64,         // 播放速率（1.0 = 正常）
    paused: bool,
    paused_at: f64,             // 暂停时的位置
    anchored: bool,             // 是否已由第一帧锚定
}

impl ClockInner {
    fn now(&self) -> f64 {
        if self.paused {
            self.paused_at
        } else {
            let elapsed = self.base_instant.elapsed().as_secs_f64();
            self.base_pts + elapsed * self.playback_rate
        }
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::with_rate(1.0)
    }

    pub fn with_rate(playback_rate: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockInner {
                base_pts: 0.0,
                base_instant: Instant::now(),
                playback_rate,
                paused: false,
                paused_at: 0.0,
                anchored: false,
            })),
        }
    }

    /// 获取当前播放位置（秒）
    pub fn now(&self) -> f64 {
        self.inner.lock().now()
    }

    /// 锚定到指定位置，之后按速率推进
    pub fn set_time(&self, seconds: f64) {
        let mut inner = self.inner.lock();
        inner.base_pts = seconds;
        inner.base_instant = Instant::now();
        inner.paused_at = seconds;
        inner.anchored = true;
    }

    /// seek 之后取消锚定，等待新的第一帧
    pub fn invalidate(&self) {
        self.inner.lock().anchored = false;
    }

    pub fn is_anchored(&self) -> bool {
        self.inner.lock().anchored
    }

    /// 开始播放
    pub fn play(&self) {
        let mut inner = self.inner.lock();
        if inner.paused {
            inner.base_pts = inner.paused_at;
            inner.base_instant = Instant::now();
            inner.paused = false;
        }
    }

    /// 暂停播放
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            inner.paused_at = inner.now();
            inner.paused = true;
        }
    }

    /// 设置播放速率
    pub fn set_rate(&self, rate: f64) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            let current_time = inner.now();
            inner.base_pts = current_time;
            inner.base_instant = Instant::now();
        }
        inner.playback_rate = rate;
    }

    pub fn rate(&self) -> f64 {
        self.inner.lock().playback_rate
    }

    /// 是否暂停
    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        let inner = self.inner.lock();
        ClockSnapshot {
            seconds: inner.now(),
            stable: inner.anchored,
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
