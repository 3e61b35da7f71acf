//! 控制请求串行化
//!
//! 所有控制请求（目前只有 seek）进入一个 FIFO，由专门的线程逐个处理：
//! 先把请求列出的工作线程全部停下，再执行处理函数，最后统一释放。
//! 同一时刻最多只有一个控制操作在执行，且执行期间流水线完全静止。

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::core::{
    EventEmitter, PlayerError, PlayerEvent, RequestInfo, RequestPhase, Result, ThreadRole,
};
use crate::player::demuxer::Demuxer;
use crate::player::log_ctx;
use crate::player::thread_state::ThreadStateManager;

/// 排队中的控制请求
pub struct RequestTaskItem {
    pub info: RequestInfo,
    /// 处理前必须停下的线程角色
    pub roles: Vec<ThreadRole>,
    pub handler: Box<dyn FnOnce() + Send>,
}

impl RequestTaskItem {
    pub fn new<F>(info: RequestInfo, roles: Vec<ThreadRole>, handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            info,
            roles,
            handler: Box::new(handler),
        }
    }
}

enum Message {
    Task(RequestTaskItem),
    Stop,
}

/// 控制请求处理线程
pub struct RequestTaskQueueHandler {
    sender: Sender<Message>,
    running: Arc<AtomicBool>,
    emitter: EventEmitter,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RequestTaskQueueHandler {
    /// 启动处理线程
    ///
    /// Demuxer 角色走同步暂停（`Demuxer::pause/resume`），其他角色走阻塞。
    pub fn start(
        states: Arc<ThreadStateManager>,
        demuxer: Option<Arc<Demuxer>>,
        emitter: EventEmitter,
    ) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let worker = HandlerLoop {
            receiver,
            states,
            demuxer,
            emitter: emitter.clone(),
            running: running.clone(),
        };
        let handle = thread::Builder::new()
            .name(ThreadRole::RequestHandler.thread_name())
            .spawn(move || worker.run())?;

        Ok(Self {
            sender,
            running,
            emitter,
            thread_handle: Mutex::new(Some(handle)),
        })
    }

    /// 请求入队（不等待处理）
    pub fn enqueue(&self, item: RequestTaskItem) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(PlayerError::InvalidState("请求处理线程已停止".to_string()));
        }
        let info = item.info;
        self.emitter
            .emit(PlayerEvent::with_phase(info, RequestPhase::BeforeEnqueue));
        self.sender
            .send(Message::Task(item))
            .map_err(|e| PlayerError::Other(format!("发送控制请求失败: {}", e)))?;
        self.emitter
            .emit(PlayerEvent::with_phase(info, RequestPhase::AfterEnqueue));
        Ok(())
    }

    /// 通知退出：正在处理的请求会完成，其余的丢弃
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            let _ = self.sender.send(Message::Stop);
        }
    }

    pub fn join(&self) {
        let handle = self.thread_handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("{} ⚠ 请求处理线程异常退出", log_ctx());
            }
        }
    }
}

struct HandlerLoop {
    receiver: Receiver<Message>,
    states: Arc<ThreadStateManager>,
    demuxer: Option<Arc<Demuxer>>,
    emitter: EventEmitter,
    running: Arc<AtomicBool>,
}

impl HandlerLoop {
    fn run(self) {
        info!("{} 📮 请求处理线程启动", log_ctx());

        while let Ok(message) = self.receiver.recv() {
            let item = match message {
                Message::Task(item) => item,
                Message::Stop => break,
            };
            if !self.running.load(Ordering::SeqCst) {
                debug!("丢弃请求 #{}（正在停止）", item.info.serial);
                continue;
            }
            self.handle(item);
        }

        let discarded = self.receiver.try_iter().count();
        info!(
            "{} 🛑 请求处理线程退出（丢弃 {} 个未处理请求）",
            log_ctx(),
            discarded
        );
    }

    fn handle(&self, item: RequestTaskItem) {
        let RequestTaskItem {
            info,
            roles,
            handler,
        } = item;

        debug!("{} ▶ 处理请求 #{} {:?}", log_ctx(), info.serial, info.kind);
        self.emitter
            .emit(PlayerEvent::with_phase(info, RequestPhase::BeforeHandle));

        self.block_roles(&roles);
        handler();
        // 此时各线程仍处于静止状态
        self.emitter
            .emit(PlayerEvent::with_phase(info, RequestPhase::AfterHandle));
        self.awaken_roles(&roles);

        debug!("{} ✅ 请求 #{} 处理完成", log_ctx(), info.serial);
    }

    fn block_roles(&self, roles: &[ThreadRole]) {
        for &role in roles {
            if role == ThreadRole::Demuxer {
                if let Some(demuxer) = &self.demuxer {
                    demuxer.pause();
                    continue;
                }
            }
            match self.states.get(role) {
                Ok(state) => {
                    state.disable_wake_up();
                    state.request_block();
                    let status = state.wait_until_blocked();
                    debug!("🔒 {:?} -> {:?}", role, status);
                }
                Err(e) => warn!("⚠ 阻塞线程时跳过: {}", e),
            }
        }
    }

    fn awaken_roles(&self, roles: &[ThreadRole]) {
        for &role in roles {
            if role == ThreadRole::Demuxer {
                if let Some(demuxer) = &self.demuxer {
                    demuxer.resume();
                    continue;
                }
            }
            match self.states.get(role) {
                Ok(state) => {
                    state.enable_wake_up();
                    state.wake_up();
                }
                Err(e) => warn!("⚠ 唤醒线程时跳过: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RequestKind, TrackType};
    use crate::player::thread_state::{ThreadStateController, ThreadStatus};
    use crossbeam_channel::unbounded as channel;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn info(serial: u64) -> RequestInfo {
        RequestInfo {
            kind: RequestKind::Seek,
            serial,
            timestamp: 0,
            stream_index: None,
        }
    }

    /// 模拟工作线程：每轮循环产出一个单位，产出之间短暂让出
    fn spawn_worker(
        state: Arc<ThreadStateController>,
        produced: Arc<AtomicUsize>,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                if state.is_blocking() {
                    state.block();
                    continue;
                }
                produced.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(1));
            }
            state.mark_exited();
        })
    }

    #[test]
    fn blocked_workers_stay_blocked_until_handler_finishes() {
        let role = ThreadRole::Decoder(TrackType::Video);
        let mut manager = ThreadStateManager::new();
        let state = manager.register(role);
        let states = Arc::new(manager);

        let produced = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let worker = spawn_worker(state.clone(), produced.clone(), running.clone());

        // 处理期间不停地尝试唤醒
        let waker = {
            let state = state.clone();
            let running = running.clone();
            thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    state.wake_up();
                    thread::sleep(Duration::from_micros(200));
                }
            })
        };

        let (done_tx, done_rx) = channel();
        let handler = RequestTaskQueueHandler::start(states, None, EventEmitter::silent()).unwrap();
        {
            let produced = produced.clone();
            let state = state.clone();
            handler
                .enqueue(RequestTaskItem::new(info(1), vec![role], move || {
                    assert_eq!(state.status(), ThreadStatus::Blocked);
                    let before = produced.load(Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(100));
                    let after = produced.load(Ordering::SeqCst);
                    let _ = done_tx.send((before, after, state.status()));
                }))
                .unwrap();
        }

        let (before, after, status) = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(before, after, "worker produced while blocked");
        assert_eq!(status, ThreadStatus::Blocked);

        // 释放之后继续产出
        let resumed_from = produced.load(Ordering::SeqCst);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while produced.load(Ordering::SeqCst) <= resumed_from + 5 {
            assert!(std::time::Instant::now() < deadline, "worker never resumed");
            thread::sleep(Duration::from_millis(1));
        }

        handler.stop();
        handler.join();
        running.store(false, Ordering::SeqCst);
        state.interrupt();
        worker.join().unwrap();
        waker.join().unwrap();
    }

    #[test]
    fn requests_run_in_fifo_order_with_all_phases() {
        let (tx, rx) = channel();
        let emitter = EventEmitter::new(move |event: &PlayerEvent| {
            if let PlayerEvent::RequestHandle { phase, request } = event {
                let _ = tx.send((request.serial, *phase));
            }
        });
        let handler =
            RequestTaskQueueHandler::start(Arc::new(ThreadStateManager::new()), None, emitter)
                .unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for serial in 1..=3 {
            let order = order.clone();
            // 未注册的角色只记录警告，不影响处理
            handler
                .enqueue(RequestTaskItem::new(
                    info(serial),
                    vec![ThreadRole::Renderer(TrackType::Audio)],
                    move || order.lock().push(serial),
                ))
                .unwrap();
        }

        let mut handled = Vec::new();
        while handled.len() < 3 {
            let (serial, phase) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            if phase == RequestPhase::AfterHandle {
                handled.push(serial);
            }
        }
        assert_eq!(handled, vec![1, 2, 3]);
        assert_eq!(*order.lock(), vec![1, 2, 3]);

        handler.stop();
        handler.join();
        assert!(handler
            .enqueue(RequestTaskItem::new(info(4), vec![], || {}))
            .is_err());
    }

    #[test]
    fn stop_discards_queued_requests() {
        let handler = RequestTaskQueueHandler::start(
            Arc::new(ThreadStateManager::new()),
            None,
            EventEmitter::silent(),
        )
        .unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = channel();
        {
            let ran = ran.clone();
            handler
                .enqueue(RequestTaskItem::new(info(1), vec![], move || {
                    let _ = started_tx.send(());
                    thread::sleep(Duration::from_millis(50));
                    ran.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        for serial in 2..5 {
            let ran = ran.clone();
            handler
                .enqueue(RequestTaskItem::new(info(serial), vec![], move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handler.stop();
        handler.join();
        // 正在处理的完成，排队的丢弃
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
