use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::{Frame, Packet, QueueOptions, Rational, StreamInfo, TrackClock, TrackType};
use crate::player::queue::BoundedQueue;

/// 一个已选中的轨道及其会话内状态
///
/// 流描述在会话内不变；队列、时钟和各种标志由解码 / 渲染线程以及
/// seek 处理（流水线静止期间）共享。
pub struct Track {
    pub stream: StreamInfo,
    pub packet_queue: Arc<BoundedQueue<Packet>>,
    pub frame_queue: Arc<BoundedQueue<Frame>>,
    pub clock: TrackClock,
    decode_finished: AtomicBool,
    end_reported: AtomicBool,
    flush_pending: AtomicBool,
    /// 精确 seek：早于该时间（秒）的帧直接丢弃
    skip_until: Mutex<Option<f64>>,
}

impl Track {
    pub fn new(
        stream: StreamInfo,
        packet_queue: Arc<BoundedQueue<Packet>>,
        queues: &QueueOptions,
    ) -> Self {
        let frame_queue = Arc::new(BoundedQueue::new(queues.frames(stream.track_type)));
        Self {
            stream,
            packet_queue,
            frame_queue,
            clock: TrackClock::new(),
            decode_finished: AtomicBool::new(false),
            end_reported: AtomicBool::new(false),
            flush_pending: AtomicBool::new(false),
            skip_until: Mutex::new(None),
        }
    }

    pub fn track_type(&self) -> TrackType {
        self.stream.track_type
    }

    pub fn time_base(&self) -> Rational {
        self.stream.time_base
    }

    /// 名义帧时长（秒）
    pub fn frame_duration_secs(&self) -> f64 {
        self.stream.time_base.to_seconds(self.stream.frame_duration)
    }

    /// 标记解码完成，只有第一次调用返回 true
    pub fn mark_decode_finished(&self) -> bool {
        !self.decode_finished.swap(true, Ordering::SeqCst)
    }

    pub fn is_decode_finished(&self) -> bool {
        self.decode_finished.load(Ordering::SeqCst)
    }

    /// 标记已上报播放结束，只有第一次调用返回 true
    pub fn mark_end_reported(&self) -> bool {
        !self.end_reported.swap(true, Ordering::SeqCst)
    }

    pub fn is_end_reported(&self) -> bool {
        self.end_reported.load(Ordering::SeqCst)
    }

    /// 解码线程在下一个包之前消费
    pub fn take_flush_request(&self) -> bool {
        self.flush_pending.swap(false, Ordering::SeqCst)
    }

    /// 该时钟值对应的帧是否应该因精确 seek 被丢弃
    ///
    /// 第一个不早于目标的帧会清除目标。
    pub fn should_skip(&self, seconds: f64) -> bool {
        let mut skip_until = self.skip_until.lock();
        match *skip_until {
            Some(target) if seconds + 1e-9 < target => true,
            Some(_) => {
                *skip_until = None;
                false
            }
            None => false,
        }
    }

    /// seek 成功后的重置（仅在流水线静止期间调用）
    ///
    /// 包队列由 Demuxer 清空；这里清空帧队列，时钟置为目标且不稳定，
    /// 解码器待 flush，结束标志清零。返回丢弃的帧数。
    pub fn reset_for_seek(&self, target_secs: f64) -> usize {
        let frames = self.frame_queue.clear();
        self.clock.reset(target_secs);
        self.flush_pending.store(true, Ordering::SeqCst);
        self.decode_finished.store(false, Ordering::SeqCst);
        self.end_reported.store(false, Ordering::SeqCst);
        *self.skip_until.lock() = Some(target_secs);
        debug!(
            "🧹 {} 轨道重置到 {:.3}s: 丢弃 {} 帧",
            self.track_type(),
            target_secs,
            frames
        );
        frames
    }

    /// 会话结束时清空队列
    pub fn clear(&self) -> (usize, usize) {
        (self.packet_queue.clear(), self.frame_queue.clear())
    }
}
