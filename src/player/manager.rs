use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::core::{
    BufferStatus, ClockSnapshot, EventEmitter, MediaInfo, PlaybackClock, PlayerError, PlayerEvent,
    PlayerOptions, PlayerState, RequestInfo, RequestKind, Result, ThreadRole, TrackType,
    AV_TIME_BASE_Q,
};
use crate::player::decoder::DecoderWorker;
use crate::player::demuxer::Demuxer;
use crate::player::demuxer_source::{first_stream_of_type, FrameSink, MediaBackend, StreamSelector};
use crate::player::log_ctx;
use crate::player::renderer::{RendererWorker, SyncReference, TrackEndCallback};
use crate::player::request_task::{RequestTaskItem, RequestTaskQueueHandler};
use crate::player::sync::{ClockSync, ThresholdSync};
use crate::player::thread_state::{ThreadStateManager, ThreadStatus};
use crate::player::track::Track;

/// 播放器构建器 - 会话开始前注入后端、渲染端、同步策略和事件监听
pub struct PlayerBuilder {
    backend: Arc<dyn MediaBackend>,
    options: PlayerOptions,
    selector: Arc<StreamSelector>,
    sinks: HashMap<TrackType, Arc<dyn FrameSink>>,
    clock_sync: Option<Arc<dyn ClockSync>>,
    emitter: EventEmitter,
}

impl PlayerBuilder {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            options: PlayerOptions::default(),
            selector: Arc::new(first_stream_of_type),
            sinks: HashMap::new(),
            clock_sync: None,
            emitter: EventEmitter::silent(),
        }
    }

    pub fn options(mut self, options: PlayerOptions) -> Self {
        self.options = options;
        self
    }

    /// 某种轨道的渲染端
    pub fn sink(mut self, track_type: TrackType, sink: Arc<dyn FrameSink>) -> Self {
        self.sinks.insert(track_type, sink);
        self
    }

    /// 流选择器（默认选每种类型的第一条流）
    pub fn selector<F>(mut self, selector: F) -> Self
    where
        F: Fn(TrackType, &[crate::core::StreamInfo]) -> Option<usize> + Send + Sync + 'static,
    {
        self.selector = Arc::new(selector);
        self
    }

    /// 同步策略（默认 `ThresholdSync`，阈值取自配置）
    pub fn clock_sync(mut self, clock_sync: Arc<dyn ClockSync>) -> Self {
        self.clock_sync = Some(clock_sync);
        self
    }

    /// 事件监听（在产生事件的线程上同步调用，不能长时间阻塞）
    pub fn listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.emitter = EventEmitter::new(listener);
        self
    }

    pub fn build(self) -> Result<Player> {
        self.options.validate()?;
        let clock_sync = self
            .clock_sync
            .unwrap_or_else(|| Arc::new(ThresholdSync::new(&self.options.sync)));

        info!("{} 🎮 创建播放器 (rate={})", log_ctx(), self.options.playback_rate);
        Ok(Player {
            inner: Arc::new(PlayerInner {
                backend: self.backend,
                options: self.options,
                selector: self.selector,
                sinks: self.sinks,
                clock_sync,
                emitter: self.emitter,
                state: Mutex::new(PlayerState::Stopped),
                state_changed: Condvar::new(),
                session: Mutex::new(None),
                lifecycle: Mutex::new(()),
                serial: AtomicU64::new(0),
            }),
        })
    }
}

/// 播放器 - 顶层生命周期
///
/// Stopped → Preparing → Playing ⇄ Paused → Stopping → Stopped，
/// 另有 seek 期间的 Seeking 和暂停过程中的 Pausing。
/// 所有状态转移都是比较并交换，并发出 `PlaybackStateChange` 事件。
///
/// 可以克隆，克隆体共享同一个播放器。
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    backend: Arc<dyn MediaBackend>,
    options: PlayerOptions,
    selector: Arc<StreamSelector>,
    sinks: HashMap<TrackType, Arc<dyn FrameSink>>,
    clock_sync: Arc<dyn ClockSync>,
    emitter: EventEmitter,
    state: Mutex<PlayerState>,
    state_changed: Condvar,
    session: Mutex<Option<Arc<Session>>>,
    /// play / stop 串行化
    lifecycle: Mutex<()>,
    serial: AtomicU64,
}

/// 一次播放会话：从 play 到 stop
struct Session {
    demuxer: Arc<Demuxer>,
    tracks: Vec<Arc<Track>>,
    states: Arc<ThreadStateManager>,
    request_handler: RequestTaskQueueHandler,
    realtime: PlaybackClock,
    running: Arc<AtomicBool>,
    /// 用户暂停
    paused: Arc<AtomicBool>,
    /// 已发出 PlaybackFinished
    finished: Arc<AtomicBool>,
    workers: Mutex<Vec<(ThreadRole, JoinHandle<()>)>>,
}

impl Session {
    fn track(&self, track_type: TrackType) -> Option<&Arc<Track>> {
        self.tracks.iter().find(|t| t.track_type() == track_type)
    }

    fn track_by_index(&self, stream_index: usize) -> Option<&Arc<Track>> {
        self.tracks.iter().find(|t| t.stream.index == stream_index)
    }

    /// 主轨道：有音频用音频，否则第一条轨道
    fn master(&self) -> Option<&Arc<Track>> {
        self.track(TrackType::Audio).or_else(|| self.tracks.first())
    }

    fn renderer_roles(&self) -> impl Iterator<Item = ThreadRole> + '_ {
        self.tracks
            .iter()
            .map(|t| ThreadRole::Renderer(t.track_type()))
    }

    /// seek 需要停下的所有角色
    fn seek_roles(&self) -> Vec<ThreadRole> {
        let mut roles = vec![ThreadRole::Demuxer];
        roles.extend(self.tracks.iter().map(|t| ThreadRole::Decoder(t.track_type())));
        roles.extend(self.renderer_roles());
        roles
    }

    /// 停止所有线程并等待退出
    fn shutdown(&self) {
        // ========== 步骤1: 停止标志 ==========
        self.running.store(false, Ordering::SeqCst);
        self.demuxer.stop();

        // ========== 步骤2: 打断所有等待 ==========
        self.request_handler.stop();
        self.states.wake_up_all();

        // ========== 步骤3: 请求处理线程（正在处理的请求会完成）==========
        self.request_handler.join();

        // ========== 步骤4: 等待工作线程退出 ==========
        self.demuxer.wait_stop();
        info!("{} ✅ Demuxer 线程已结束", log_ctx());

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for (role, handle) in workers {
            if handle.join().is_err() {
                warn!("{} ⚠ {} 线程异常退出", log_ctx(), role.thread_name());
            } else {
                info!("{} ✅ {} 线程已结束", log_ctx(), role.thread_name());
            }
        }

        // ========== 步骤5: 清空队列 ==========
        for track in &self.tracks {
            let (packets, frames) = track.clear();
            if packets > 0 || frames > 0 {
                info!(
                    "{} 🗑️  清空 {} 队列: {} 个包, {} 帧",
                    log_ctx(),
                    track.track_type(),
                    packets,
                    frames
                );
            }
        }
    }

    /// 只发停止信号，不等待（任意线程可调用）
    fn abort(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.demuxer.stop();
        self.request_handler.stop();
        self.states.wake_up_all();
    }
}

impl PlayerInner {
    fn state(&self) -> PlayerState {
        *self.state.lock()
    }

    /// 比较并交换；成功时返回旧状态并发出事件
    fn transition(&self, from: &[PlayerState], to: PlayerState) -> Option<PlayerState> {
        let old = {
            let mut state = self.state.lock();
            if !from.contains(&*state) {
                return None;
            }
            let old = *state;
            *state = to;
            self.state_changed.notify_all();
            old
        };
        info!("{} 🔁 播放状态: {:?} -> {:?}", log_ctx(), old, to);
        self.emitter.emit(PlayerEvent::PlaybackStateChange {
            new_state: to,
            old_state: old,
        });
        Some(old)
    }

    fn session(&self) -> Option<Arc<Session>> {
        self.session.lock().clone()
    }

    /// ==================== Seek 处理（流水线静止期间执行）====================
    ///
    /// 1. 状态切到 Seeking（允许从 Playing / Paused / Pausing 进入，
    ///    Pausing 说明 pause() 正等着渲染线程，seek 结束后落到 Paused）
    /// 2. 容器 seek：有流索引用该流的时间基，否则用全局时间基（微秒）
    ///    失败时恢复原状态，不动任何队列
    /// 3. 清空所有包队列和帧队列，解码器待 flush
    /// 4. 所有轨道时钟重置到目标（不稳定），设置精确 seek 目标
    /// 5. 实时时钟取消锚定，等待新的第一帧
    /// 6. 可选：预读一个包重新锚定时钟
    /// 7. 恢复原状态
    fn handle_seek(&self, session: &Session, request: RequestInfo) {
        // ========== 步骤1: 切换到 Seeking ==========
        let Some(previous) = self.transition(
            &[PlayerState::Playing, PlayerState::Paused, PlayerState::Pausing],
            PlayerState::Seeking,
        ) else {
            warn!(
                "{} ⚠ 当前状态 {:?} 不能 seek，忽略请求 #{}",
                log_ctx(),
                self.state(),
                request.serial
            );
            return;
        };
        let previous = match previous {
            PlayerState::Pausing => PlayerState::Paused,
            state => state,
        };

        let time_base = request
            .stream_index
            .and_then(|index| session.track_by_index(index))
            .map(|t| t.time_base())
            .unwrap_or(AV_TIME_BASE_Q);
        let target = time_base.to_seconds(request.timestamp).max(0.0);
        info!("{} 🎯 Seek 到 {:.3}s (请求 #{})", log_ctx(), target, request.serial);

        // ========== 步骤2: 容器 seek ==========
        if let Err(e) = session.demuxer.seek(request.stream_index, request.timestamp) {
            error!("{} ❌ Seek 失败: {}", log_ctx(), e);
            self.transition(&[PlayerState::Seeking], previous);
            return;
        }

        // ========== 步骤3/4: 清空队列，重置时钟 ==========
        let mut packets = 0;
        let mut frames = 0;
        for track in &session.tracks {
            packets += session.demuxer.flush_packet_queue(track.track_type());
            frames += track.reset_for_seek(target);
        }
        info!(
            "{} 🧹 Seek 清空队列: {} 个包, {} 帧",
            log_ctx(),
            packets,
            frames
        );

        // ========== 步骤5: 实时时钟 ==========
        session.realtime.invalidate();
        session.finished.store(false, Ordering::SeqCst);

        // ========== 步骤6: 预读 ==========
        if self.options.seek_preread {
            if let Some(packet) = session.demuxer.read_one_packet() {
                if let (Some(track), Some(pts)) = (session.track(packet.track_type), packet.pts) {
                    let seconds = track.time_base().to_seconds(pts);
                    track.clock.reset(seconds);
                    debug!("{} 预读 {} 包，时钟 {:.3}s", log_ctx(), packet.track_type, seconds);
                }
            }
        }

        // ========== 步骤7: 恢复状态 ==========
        self.transition(&[PlayerState::Seeking], previous);
        info!("{} ✅ Seek 完成: {:.3}s", log_ctx(), target);
    }
}

impl Player {
    pub fn builder(backend: Arc<dyn MediaBackend>) -> PlayerBuilder {
        PlayerBuilder::new(backend)
    }

    pub fn options(&self) -> &PlayerOptions {
        &self.inner.options
    }

    /// 打开媒体源并开始播放
    ///
    /// 打开、选流或解码器创建失败时返回错误，播放器回到 Stopped。
    pub fn play(&self, url: &str) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock();
        if self
            .inner
            .transition(&[PlayerState::Stopped], PlayerState::Preparing)
            .is_none()
        {
            return Err(PlayerError::InvalidState(format!(
                "播放器正在运行 ({:?})",
                self.inner.state()
            )));
        }

        info!("{} 🎬 播放: {}", log_ctx(), url);
        match self.start_session(url) {
            Ok(session) => {
                *self.inner.session.lock() = Some(session);
                self.inner
                    .transition(&[PlayerState::Preparing], PlayerState::Playing);
                Ok(())
            }
            Err(e) => {
                error!("{} ❌ 启动播放失败: {}", log_ctx(), e);
                self.inner
                    .transition(&[PlayerState::Preparing], PlayerState::Stopped);
                Err(e)
            }
        }
    }

    fn start_session(&self, url: &str) -> Result<Arc<Session>> {
        let inner = &self.inner;
        let options = &inner.options;

        // ========== 步骤1: 打开并选流 ==========
        let demuxer = Arc::new(Demuxer::new(inner.backend.create_source()));
        let bound = demuxer.open_and_select_streams(
            url,
            &options.tracks,
            inner.selector.as_ref(),
            &options.queues,
        )?;

        // ========== 步骤2: 轨道和解码器 ==========
        let mut tracks = Vec::new();
        let mut decoders = Vec::new();
        for stream in bound {
            let packet_queue = demuxer.packet_queue(stream.track_type).ok_or_else(|| {
                PlayerError::Other(format!("{} 轨道没有包队列", stream.track_type))
            })?;
            let decoder = inner.backend.create_decoder(&stream)?;
            info!(
                "{} ✓ {} 解码器: {} (stream #{})",
                log_ctx(),
                stream.track_type,
                stream.codec_name,
                stream.index
            );
            tracks.push(Arc::new(Track::new(stream, packet_queue, &options.queues)));
            decoders.push(decoder);
        }

        // ========== 步骤3: 线程角色表 ==========
        let mut states = ThreadStateManager::new();
        states.insert(demuxer.thread_state());
        for track in &tracks {
            states.register(ThreadRole::Decoder(track.track_type()));
            states.register(ThreadRole::Renderer(track.track_type()));
        }
        let states = Arc::new(states);

        let request_handler =
            RequestTaskQueueHandler::start(states.clone(), Some(demuxer.clone()), inner.emitter.clone())?;

        let session = Arc::new(Session {
            demuxer: demuxer.clone(),
            tracks,
            states,
            request_handler,
            realtime: PlaybackClock::with_rate(options.playback_rate),
            running: Arc::new(AtomicBool::new(true)),
            paused: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
        });

        // ========== 步骤4: 启动工作线程 ==========
        if let Err(e) = self.spawn_workers(&session, decoders) {
            session.shutdown();
            return Err(e);
        }
        if let Err(e) = demuxer.start() {
            session.shutdown();
            return Err(e);
        }

        info!(
            "{} ✅ 播放线程已启动: {}",
            log_ctx(),
            session
                .tracks
                .iter()
                .map(|t| t.track_type().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(session)
    }

    fn spawn_workers(
        &self,
        session: &Arc<Session>,
        decoders: Vec<Box<dyn crate::player::demuxer_source::DecodeCapability>>,
    ) -> Result<()> {
        let inner = &self.inner;
        let master = session.master().cloned();
        let on_end = self.track_end_callback(session);

        for (track, decoder) in session.tracks.iter().zip(decoders) {
            let track_type = track.track_type();
            let decoder_state = session.states.get(ThreadRole::Decoder(track_type))?;
            let renderer_state = session.states.get(ThreadRole::Renderer(track_type))?;

            // 包入队即唤醒解码线程
            {
                let decoder_state = decoder_state.clone();
                session
                    .demuxer
                    .set_packet_callback(track_type, Arc::new(move || decoder_state.wake_up()));
            }

            let reference = SyncReference {
                master: master
                    .clone()
                    .filter(|m| m.track_type() != track_type),
                realtime: session.realtime.clone(),
            };
            let mut renderer = RendererWorker::new(
                track.clone(),
                inner.clock_sync.clone(),
                reference,
                renderer_state.clone(),
                decoder_state.clone(),
                session.paused.clone(),
                session.running.clone(),
                inner.emitter.clone(),
            )
            .on_end(on_end.clone());
            if let Some(adapter) = inner.backend.create_adapter(&track.stream) {
                renderer = renderer.with_adapter(adapter, inner.options.target_format(track_type));
            }
            if let Some(sink) = inner.sinks.get(&track_type) {
                renderer = renderer.with_sink(sink.clone());
            }
            let handle = renderer.spawn()?;
            session
                .workers
                .lock()
                .push((ThreadRole::Renderer(track_type), handle));

            let handle = DecoderWorker::new(
                track.clone(),
                decoder,
                decoder_state,
                renderer_state,
                session.demuxer.clone(),
                session.running.clone(),
            )
            .spawn()?;
            session
                .workers
                .lock()
                .push((ThreadRole::Decoder(track_type), handle));
        }
        Ok(())
    }

    /// 所有轨道播放完毕时发出 PlaybackFinished，按配置自动停止
    fn track_end_callback(&self, session: &Arc<Session>) -> TrackEndCallback {
        let player: Weak<PlayerInner> = Arc::downgrade(&self.inner);
        let tracks = session.tracks.clone();
        let finished = session.finished.clone();
        Arc::new(move |_track_type: TrackType| {
            if !tracks.iter().all(|t| t.is_end_reported()) || finished.swap(true, Ordering::SeqCst) {
                return;
            }
            let Some(inner) = player.upgrade() else {
                return;
            };
            info!("{} 🏁 所有轨道播放完毕", log_ctx());
            inner.emitter.emit(PlayerEvent::PlaybackFinished);
            if inner.options.stop_on_eof {
                if let Err(e) = (Player { inner }).notify_stop() {
                    error!("{} ❌ 自动停止失败: {}", log_ctx(), e);
                }
            }
        })
    }

    /// 暂停：渲染线程停在帧边界，实时时钟冻结
    pub fn pause(&self) -> Result<()> {
        let session = self.require_session()?;
        if self
            .inner
            .transition(&[PlayerState::Playing], PlayerState::Pausing)
            .is_none()
        {
            return Err(PlayerError::InvalidState(format!(
                "不能从 {:?} 暂停",
                self.inner.state()
            )));
        }

        session.paused.store(true, Ordering::SeqCst);
        session.realtime.pause();
        let renderers: Vec<_> = session
            .renderer_roles()
            .filter_map(|role| session.states.get(role).ok())
            .collect();
        for state in &renderers {
            state.request_pause();
        }
        for state in &renderers {
            state.wait_until_paused();
        }

        self.inner
            .transition(&[PlayerState::Pausing], PlayerState::Paused);
        info!("{} ⏸ 已暂停 @ {:.3}s", log_ctx(), self.position());
        Ok(())
    }

    /// 继续播放
    pub fn resume(&self) -> Result<()> {
        let session = self.require_session()?;
        if self
            .inner
            .transition(&[PlayerState::Paused], PlayerState::Playing)
            .is_none()
        {
            return Err(PlayerError::InvalidState(format!(
                "不能从 {:?} 继续播放",
                self.inner.state()
            )));
        }

        session.paused.store(false, Ordering::SeqCst);
        session.realtime.play();
        for role in session.renderer_roles() {
            if let Ok(state) = session.states.get(role) {
                state.wake_up();
            }
        }
        info!("{} ▶ 继续播放 @ {:.3}s", log_ctx(), self.position());
        Ok(())
    }

    /// 播放中修改速率（从当前位置开始按新速率推进）
    pub fn set_playback_rate(&self, rate: f64) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(PlayerError::ConfigError(format!("播放速率无效: {}", rate)));
        }
        let session = self.require_session()?;
        session.realtime.set_rate(rate);
        info!("{} ⏩ 播放速率: {}", log_ctx(), rate);
        Ok(())
    }

    /// 异步停止：在独立线程里执行 `stop()`，可以从事件回调中调用
    pub fn notify_stop(&self) -> Result<()> {
        let player = self.clone();
        thread::Builder::new()
            .name("player-stop".to_string())
            .spawn(move || {
                if let Err(e) = player.stop() {
                    error!("{} ❌ 停止失败: {}", log_ctx(), e);
                }
            })?;
        Ok(())
    }

    /// 停止并等待所有线程退出
    ///
    /// 不能在事件回调里调用（回调运行在工作线程上），那里用 `notify_stop()`。
    pub fn stop(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock();
        let stoppable = [
            PlayerState::Playing,
            PlayerState::Paused,
            PlayerState::Pausing,
            PlayerState::Seeking,
        ];
        if self
            .inner
            .transition(&stoppable, PlayerState::Stopping)
            .is_none()
        {
            debug!("{} 播放器已停止 ({:?})", log_ctx(), self.inner.state());
            return Ok(());
        }

        info!("{} ⏹️  停止播放", log_ctx());
        let started = Instant::now();
        let session = self.inner.session.lock().take();
        if let Some(session) = session {
            session.shutdown();
        }

        self.inner
            .transition(&[PlayerState::Stopping], PlayerState::Stopped);
        info!(
            "{} ✅ 停止播放完成，所有线程已清理 ({:?})",
            log_ctx(),
            started.elapsed()
        );
        Ok(())
    }

    /// 发起 seek（异步，由请求处理线程执行）
    ///
    /// `stream_index` 为 None 时 `timestamp` 为微秒，否则为该流时间基下的值。
    pub fn notify_seek(&self, timestamp: i64, stream_index: Option<usize>) -> Result<()> {
        let session = self.require_session()?;
        if let Some(index) = stream_index {
            if session.track_by_index(index).is_none() {
                return Err(PlayerError::SeekError(format!("流 #{} 未被选中", index)));
            }
        }

        let request = RequestInfo {
            kind: RequestKind::Seek,
            serial: self.inner.serial.fetch_add(1, Ordering::SeqCst) + 1,
            timestamp,
            stream_index,
        };
        info!(
            "{} 📨 Seek 请求 #{}: {} (stream {:?})",
            log_ctx(),
            request.serial,
            timestamp,
            stream_index
        );

        let player = Arc::downgrade(&self.inner);
        let target = session.clone();
        let item = RequestTaskItem::new(request, session.seek_roles(), move || {
            if let Some(inner) = player.upgrade() {
                inner.handle_seek(&target, request);
            }
        });
        session.request_handler.enqueue(item)
    }

    pub fn state(&self) -> PlayerState {
        self.inner.state()
    }

    /// 等待进入指定状态，超时返回 false
    pub fn wait_for_state(&self, target: PlayerState, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while *state != target {
            if self
                .inner
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return *state == target;
            }
        }
        true
    }

    /// 当前播放位置（主轨道时钟，秒）
    pub fn position(&self) -> f64 {
        self.inner
            .session()
            .and_then(|s| s.master().map(|t| t.clock.seconds()))
            .unwrap_or(0.0)
    }

    /// 某轨道的时钟
    pub fn clock(&self, track_type: TrackType) -> Option<ClockSnapshot> {
        let session = self.inner.session()?;
        let track = session.track(track_type)?;
        Some(track.clock.snapshot())
    }

    /// 各队列当前长度
    pub fn queue_sizes(&self) -> BufferStatus {
        let Some(session) = self.inner.session() else {
            return BufferStatus::default();
        };
        let sizes = |track_type| {
            session
                .track(track_type)
                .map(|t| (t.packet_queue.size(), t.frame_queue.size()))
                .unwrap_or((0, 0))
        };
        let (video_packets, video_frames) = sizes(TrackType::Video);
        let (audio_packets, audio_frames) = sizes(TrackType::Audio);
        BufferStatus {
            video_packets,
            audio_packets,
            video_frames,
            audio_frames,
        }
    }

    /// 某个工作线程的状态
    pub fn thread_status(&self, role: ThreadRole) -> Result<ThreadStatus> {
        let session = self.require_session()?;
        Ok(session.states.get(role)?.status())
    }

    pub fn media_info(&self) -> Option<MediaInfo> {
        self.inner.session().map(|s| s.demuxer.media_info())
    }

    /// 当前会话选中的轨道类型
    pub fn tracks(&self) -> Vec<TrackType> {
        self.inner
            .session()
            .map(|s| s.tracks.iter().map(|t| t.track_type()).collect())
            .unwrap_or_default()
    }

    fn require_session(&self) -> Result<Arc<Session>> {
        self.inner
            .session()
            .ok_or_else(|| PlayerError::InvalidState("没有正在播放的媒体".to_string()))
    }
}

impl Drop for PlayerInner {
    fn drop(&mut self) {
        // 最后一个句柄可能在工作线程上释放，这里只发停止信号不 join
        if let Some(session) = self.session.get_mut().take() {
            warn!("{} ⚠ 播放器未停止就被释放，通知线程退出", log_ctx());
            session.abort();
        }
    }
}
