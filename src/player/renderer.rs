use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::core::{
    EventEmitter, Frame, FrameContext, PlaybackClock, PlayerEvent, Result, TargetFormat, TrackType,
};
use crate::player::demuxer_source::{FrameAdapter, FrameSink};
use crate::player::log_ctx;
use crate::player::sync::{ClockSync, SyncDecision};
use crate::player::thread_state::{SleepOutcome, ThreadStateController};
use crate::player::track::Track;

const LOG_FIRST_N: usize = 3;

/// 轨道播放结束回调
pub type TrackEndCallback = Arc<dyn Fn(TrackType) + Send + Sync>;

/// 同步参考
///
/// 有主轨道时跟随主轨道时钟（视频跟随音频）；自己就是主轨道，
/// 或主轨道已经播完时，跟随会话的实时时钟。
#[derive(Clone)]
pub struct SyncReference {
    pub master: Option<Arc<Track>>,
    pub realtime: PlaybackClock,
}

/// 渲染线程（每条轨道一个）
pub struct RendererWorker {
    track: Arc<Track>,
    adapter: Option<Box<dyn FrameAdapter>>,
    target: TargetFormat,
    sink: Option<Arc<dyn FrameSink>>,
    clock_sync: Arc<dyn ClockSync>,
    reference: SyncReference,
    state: Arc<ThreadStateController>,
    decoder_state: Arc<ThreadStateController>,
    /// 用户暂停标志（会话内所有渲染线程共享）
    paused: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    emitter: EventEmitter,
    on_end: Option<TrackEndCallback>,
    frames_rendered: usize,
    frames_dropped: usize,
    frames_skipped: usize,
}

impl RendererWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        track: Arc<Track>,
        clock_sync: Arc<dyn ClockSync>,
        reference: SyncReference,
        state: Arc<ThreadStateController>,
        decoder_state: Arc<ThreadStateController>,
        paused: Arc<AtomicBool>,
        running: Arc<AtomicBool>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            track,
            adapter: None,
            target: TargetFormat::default(),
            sink: None,
            clock_sync,
            reference,
            state,
            decoder_state,
            paused,
            running,
            emitter,
            on_end: None,
            frames_rendered: 0,
            frames_dropped: 0,
            frames_skipped: 0,
        }
    }

    /// 设置格式转换（目标格式由渲染端决定）
    pub fn with_adapter(mut self, adapter: Box<dyn FrameAdapter>, target: TargetFormat) -> Self {
        self.adapter = Some(adapter);
        self.target = target;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn on_end(mut self, callback: TrackEndCallback) -> Self {
        self.on_end = Some(callback);
        self
    }

    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let name = self.state.role().thread_name();
        Ok(thread::Builder::new().name(name).spawn(move || self.run())?)
    }

    fn run(mut self) {
        let track_type = self.track.track_type();
        info!("{} 🖼 {} 渲染线程启动", log_ctx(), track_type);

        while self.running.load(Ordering::SeqCst) {
            if self.state.is_blocking() {
                self.state.block();
                continue;
            }

            if self.state.is_pausing() || self.paused.load(Ordering::SeqCst) {
                self.state.pause();
                continue;
            }

            // 先读完成标志再取帧：标志置位之后不会再有新帧入队
            let finished = self.track.is_decode_finished();
            let Some(frame) = self.track.frame_queue.try_dequeue() else {
                if finished {
                    if self.track.mark_end_reported() {
                        info!(
                            "{} 🏁 {} 播放结束（渲染 {} 帧, 丢弃 {} 帧）",
                            log_ctx(),
                            track_type,
                            self.frames_rendered,
                            self.frames_dropped
                        );
                        self.emitter.emit(PlayerEvent::EndOfStream { track: track_type });
                        if let Some(on_end) = &self.on_end {
                            on_end(track_type);
                        }
                    }
                } else {
                    self.decoder_state.wake_up();
                }
                self.state.pause();
                continue;
            };

            if self.track.frame_queue.is_below_min() {
                self.decoder_state.wake_up();
            }

            if !self.render_frame(frame) {
                break;
            }
        }

        self.state.mark_exited();
        info!(
            "{} 🛑 {} 渲染线程退出（渲染 {} 帧, 同步丢弃 {} 帧, seek 跳过 {} 帧）",
            log_ctx(),
            track_type,
            self.frames_rendered,
            self.frames_dropped,
            self.frames_skipped
        );
    }

    /// 时钟规则：有时间戳用时间戳，否则在上一个时钟值上加帧时长
    fn frame_clock(&self, frame: &Frame) -> f64 {
        let time_base = self.track.time_base();
        match frame.pts {
            Some(pts) => time_base.to_seconds(pts),
            None => {
                let step = if frame.duration > 0 {
                    time_base.to_seconds(frame.duration)
                } else {
                    self.track.frame_duration_secs()
                };
                self.track.clock.seconds() + step
            }
        }
    }

    /// 处理一帧；返回 false 表示会话正在停止
    fn render_frame(&mut self, frame: Frame) -> bool {
        let track_type = self.track.track_type();
        let seconds = self.frame_clock(&frame);

        // 精确 seek：目标之前的帧不渲染，也不推进时钟
        if self.track.should_skip(seconds) {
            self.frames_skipped += 1;
            return true;
        }

        let frame = self.adapt(frame);
        self.track.clock.set(seconds);

        // 同步决策；暂停打断睡眠时保留这一帧，恢复后重新决策
        loop {
            let own = self.track.clock.snapshot();
            let (reference, realtime) = match &self.reference.master {
                Some(master) if !master.is_end_reported() => (master.clock.snapshot(), false),
                _ => (self.reference.realtime.snapshot(), true),
            };

            let decision = self.clock_sync.decide(&own, Some(&reference));

            // seek 之后第一帧重新锚定实时时钟
            if realtime && !reference.stable {
                debug!("{} ⏱ {} 锚定实时时钟: {:.3}s", log_ctx(), track_type, own.seconds);
                self.reference.realtime.set_time(own.seconds);
            }

            match decision {
                SyncDecision::Pass => break,
                SyncDecision::Drop => {
                    self.frames_dropped += 1;
                    if self.frames_dropped <= LOG_FIRST_N || self.frames_dropped % 100 == 0 {
                        debug!(
                            "{} 落后参考时钟，丢弃帧 @ {:.3}s（参考 {:.3}s）",
                            track_type, own.seconds, reference.seconds
                        );
                    }
                    return true;
                }
                SyncDecision::Sleep(delay) => {
                    let rate = self.reference.realtime.rate();
                    let delay = if rate > 0.0 { delay.div_f64(rate) } else { delay };
                    match self.state.sleep_for(delay) {
                        SleepOutcome::Elapsed => break,
                        SleepOutcome::Preempted => {
                            // 接下来的 seek 会清空队列
                            debug!("{} 同步睡眠被控制请求打断，丢弃当前帧", track_type);
                            return true;
                        }
                        SleepOutcome::Paused => {
                            debug!("{} ⏸ 同步睡眠中被暂停，保留 {:.3}s 帧", track_type, seconds);
                            if !self.hold_while_paused() {
                                return false;
                            }
                            if self.state.is_blocking() {
                                debug!("{} 暂停期间收到控制请求，丢弃当前帧", track_type);
                                return true;
                            }
                        }
                        SleepOutcome::Interrupted => return false,
                    }
                }
            }
        }

        let context = Arc::new(FrameContext {
            track_type,
            stream_index: frame.stream_index,
            pts: frame.pts,
            clock: seconds,
            frame,
        });

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.render(&context) {
                warn!("{} ⚠ {} 渲染失败: {}", log_ctx(), track_type, e);
                self.emitter.emit(PlayerEvent::RenderError {
                    track: track_type,
                    message: e.to_string(),
                });
                return true;
            }
        }

        self.frames_rendered += 1;
        if self.frames_rendered <= LOG_FIRST_N || self.frames_rendered % 100 == 0 {
            debug!(
                "{} 渲染 {} 帧 #{} @ {:.3}s",
                log_ctx(),
                track_type,
                self.frames_rendered,
                seconds
            );
        }
        self.emitter.emit(PlayerEvent::Render(context));
        true
    }

    /// 等待用户恢复播放；返回 false 表示会话正在停止
    ///
    /// 阻塞请求到来时也返回 true，由调用方决定丢弃当前帧。
    fn hold_while_paused(&self) -> bool {
        loop {
            if !self.running.load(Ordering::SeqCst) || self.state.is_interrupted() {
                return false;
            }
            if self.state.is_blocking() {
                return true;
            }
            if !self.state.is_pausing() && !self.paused.load(Ordering::SeqCst) {
                return true;
            }
            self.state.pause();
        }
    }

    /// 格式转换失败时原样透传
    fn adapt(&mut self, frame: Frame) -> Frame {
        let Some(adapter) = self.adapter.as_mut() else {
            return frame;
        };
        if !adapter.needs_adaptation(&frame, &self.target) {
            return frame;
        }
        match adapter.adapt(&frame, &self.target) {
            Ok(adapted) => adapted,
            Err(e) => {
                warn!("{} 格式转换失败，使用原始帧: {}", self.track.track_type(), e);
                frame
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        FrameFormat, PixelFormat, PlayerError, QueueOptions, Rational, StreamInfo, ThreadRole,
    };
    use crate::player::queue::BoundedQueue;
    use crate::player::sync::ThresholdSync;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    struct FlakyAdapter;

    impl FrameAdapter for FlakyAdapter {
        fn needs_adaptation(&self, _frame: &Frame, _target: &TargetFormat) -> bool {
            true
        }

        fn adapt(&mut self, frame: &Frame, _target: &TargetFormat) -> Result<Frame> {
            if frame.pts == Some(2) {
                return Err(PlayerError::AdaptError("unsupported".to_string()));
            }
            Ok(Frame {
                data: vec![0xAD],
                ..frame.clone()
            })
        }
    }

    struct PickySink;

    impl FrameSink for PickySink {
        fn render(&self, context: &FrameContext) -> Result<()> {
            if context.pts == Some(3) {
                return Err(PlayerError::RenderError("surface lost".to_string()));
            }
            Ok(())
        }
    }

    fn frame(pts: i64) -> Frame {
        Frame {
            stream_index: 0,
            pts: Some(pts),
            duration: 1,
            format: FrameFormat::Video {
                width: 2,
                height: 2,
                pixel: PixelFormat::YUV420P,
            },
            hardware: false,
            data: vec![pts as u8],
        }
    }

    #[test]
    fn renders_in_order_and_reports_failures_as_events() {
        let queues = QueueOptions::default();
        let stream = StreamInfo {
            index: 0,
            track_type: TrackType::Video,
            time_base: Rational::new(1, 25),
            frame_duration: 1,
            codec_name: "test".to_string(),
        };
        let packets = Arc::new(BoundedQueue::new(queues.packets(TrackType::Video)));
        let track = Arc::new(Track::new(stream, packets, &queues));

        // 目标 0.08s：pts 0、1 被跳过
        track.reset_for_seek(0.08);
        for pts in 0..6 {
            track.frame_queue.enqueue(frame(pts));
        }
        track.mark_decode_finished();

        let (tx, rx) = unbounded();
        let emitter = EventEmitter::new(move |event: &PlayerEvent| {
            let _ = tx.send(event.clone());
        });

        let state = Arc::new(ThreadStateController::new(ThreadRole::Renderer(TrackType::Video)));
        let running = Arc::new(AtomicBool::new(true));
        let worker = RendererWorker::new(
            track.clone(),
            Arc::new(ThresholdSync::default()),
            SyncReference {
                master: None,
                realtime: PlaybackClock::new(),
            },
            state.clone(),
            Arc::new(ThreadStateController::new(ThreadRole::Decoder(TrackType::Video))),
            Arc::new(AtomicBool::new(false)),
            running.clone(),
            emitter,
        )
        .with_adapter(Box::new(FlakyAdapter), TargetFormat::default())
        .with_sink(Arc::new(PickySink));
        let handle = worker.spawn().unwrap();

        let mut rendered = Vec::new();
        let mut errors = 0;
        loop {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                PlayerEvent::Render(context) => rendered.push((context.pts, context.frame.data.clone())),
                PlayerEvent::RenderError { track, .. } => {
                    assert_eq!(track, TrackType::Video);
                    errors += 1;
                }
                PlayerEvent::EndOfStream { track } => {
                    assert_eq!(track, TrackType::Video);
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        running.store(false, Ordering::SeqCst);
        state.interrupt();
        handle.join().unwrap();

        assert_eq!(errors, 1);
        assert_eq!(
            rendered,
            vec![
                (Some(2), vec![2]),
                (Some(4), vec![0xAD]),
                (Some(5), vec![0xAD]),
            ]
        );
        assert!((track.clock.seconds() - 0.2).abs() < 1e-9);
        assert!(track.clock.is_stable());
    }
}
