//! 工作线程协作状态机
//!
//! 每个工作线程（解封装 / 解码 / 渲染）持有一个 `ThreadStateController`，
//! 每轮循环开始时检查是否被要求阻塞；没有工作可做时自我暂停，等待其他线程唤醒。
//!
//! 状态转移表：
//!
//! | 当前状态 | 操作（调用方） | 新状态 |
//! |---|---|---|
//! | Playing | `pause()`（自身） | Paused；若有挂起的唤醒则保持 Playing |
//! | Pausing | `pause()`（自身） | Paused |
//! | Playing | `request_pause()`（其他线程） | Pausing |
//! | Playing / Paused / Pausing | `request_block()`（控制方） | Blocking |
//! | Blocking | `block()`（自身） | Blocked |
//! | Paused / Pausing / Blocking / Blocked | `wake_up()`（任意，唤醒已启用） | Playing |
//! | 任意 | `wake_up()`（唤醒已禁用） | 不变 |
//!
//! 控制方在 `disable_wake_up()` 与 `enable_wake_up()` 之间独占线程状态，
//! 被强制进入 Blocking 的线程在控制操作结束前不会被普通唤醒拉回 Playing。

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::{PlayerError, Result, ThreadRole};

/// 线程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Playing,
    Paused,
    Pausing,
    Blocking,
    Blocked,
}

/// 可中断睡眠的结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// 睡满了
    Elapsed,
    /// 有阻塞请求插入（seek 等控制操作）
    Preempted,
    /// 被要求暂停，当前帧应保留到恢复之后
    Paused,
    /// 会话正在停止
    Interrupted,
}

struct StateInner {
    status: ThreadStatus,
    wake_up_enabled: bool,
    /// Playing 状态下收到的唤醒，避免 pause() 丢失通知
    wake_pending: bool,
    /// 会话停止，所有等待立即返回
    interrupted: bool,
    /// 工作线程已退出循环
    exited: bool,
}

/// 单个工作线程的状态控制器（一把锁 + 一个条件变量）
pub struct ThreadStateController {
    role: ThreadRole,
    inner: Mutex<StateInner>,
    cond: Condvar,
}

impl ThreadStateController {
    pub fn new(role: ThreadRole) -> Self {
        Self {
            role,
            inner: Mutex::new(StateInner {
                status: ThreadStatus::Playing,
                wake_up_enabled: true,
                wake_pending: false,
                interrupted: false,
                exited: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn role(&self) -> ThreadRole {
        self.role
    }

    pub fn status(&self) -> ThreadStatus {
        self.inner.lock().status
    }

    pub fn is_blocking(&self) -> bool {
        self.inner.lock().status == ThreadStatus::Blocking
    }

    pub fn is_pausing(&self) -> bool {
        self.inner.lock().status == ThreadStatus::Pausing
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.lock().interrupted
    }

    pub fn is_wake_up_enabled(&self) -> bool {
        self.inner.lock().wake_up_enabled
    }

    /// 工作线程自我暂停，直到被唤醒（或被要求阻塞 / 会话停止）
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.interrupted {
            return;
        }
        match inner.status {
            ThreadStatus::Playing => {
                if inner.wake_pending {
                    inner.wake_pending = false;
                    return;
                }
            }
            ThreadStatus::Pausing => {}
            // 已经有阻塞请求，交给下一轮循环处理
            ThreadStatus::Blocking | ThreadStatus::Blocked | ThreadStatus::Paused => return,
        }
        inner.status = ThreadStatus::Paused;
        inner.wake_pending = false;
        self.cond.notify_all();
        while inner.status == ThreadStatus::Paused && !inner.interrupted {
            self.cond.wait(&mut inner);
        }
    }

    /// 工作线程响应阻塞请求：进入 Blocked 并等待控制方释放
    pub fn block(&self) {
        let mut inner = self.inner.lock();
        if inner.status != ThreadStatus::Blocking {
            return;
        }
        inner.status = ThreadStatus::Blocked;
        inner.wake_pending = false;
        debug!("🔒 {:?} 已阻塞", self.role);
        self.cond.notify_all();
        while inner.status == ThreadStatus::Blocked && !inner.interrupted {
            self.cond.wait(&mut inner);
        }
    }

    /// 唤醒线程（唤醒被禁用时无效）
    pub fn wake_up(&self) {
        let mut inner = self.inner.lock();
        if !inner.wake_up_enabled {
            return;
        }
        match inner.status {
            ThreadStatus::Playing => inner.wake_pending = true,
            _ => inner.status = ThreadStatus::Playing,
        }
        self.cond.notify_all();
    }

    pub fn disable_wake_up(&self) {
        self.inner.lock().wake_up_enabled = false;
    }

    pub fn enable_wake_up(&self) {
        self.inner.lock().wake_up_enabled = true;
    }

    /// 要求线程在下一个循环边界自我暂停
    pub fn request_pause(&self) {
        let mut inner = self.inner.lock();
        if inner.status == ThreadStatus::Playing {
            inner.status = ThreadStatus::Pausing;
            self.cond.notify_all();
        }
    }

    /// 要求线程在下一个循环边界进入 Blocked
    pub fn request_block(&self) {
        let mut inner = self.inner.lock();
        match inner.status {
            ThreadStatus::Blocking | ThreadStatus::Blocked => {}
            _ => {
                inner.status = ThreadStatus::Blocking;
                // 让处于 Paused 的线程离开等待，去响应阻塞
                self.cond.notify_all();
            }
        }
    }

    /// 等待线程进入 Blocked（线程已退出或会话停止时立即返回）
    pub fn wait_until_blocked(&self) -> ThreadStatus {
        self.wait_until(|status| status == ThreadStatus::Blocked)
    }

    /// 等待线程进入 Paused
    pub fn wait_until_paused(&self) -> ThreadStatus {
        self.wait_until(|status| status == ThreadStatus::Paused)
    }

    fn wait_until(&self, reached: impl Fn(ThreadStatus) -> bool) -> ThreadStatus {
        let mut inner = self.inner.lock();
        while !reached(inner.status) && !inner.exited && !inner.interrupted {
            self.cond.wait(&mut inner);
        }
        inner.status
    }

    /// 可中断睡眠：阻塞 / 暂停请求或会话停止会提前结束
    pub fn sleep_for(&self, duration: Duration) -> SleepOutcome {
        let deadline = Instant::now() + duration;
        let mut inner = self.inner.lock();
        loop {
            if inner.interrupted {
                return SleepOutcome::Interrupted;
            }
            match inner.status {
                ThreadStatus::Blocking => return SleepOutcome::Preempted,
                ThreadStatus::Pausing => return SleepOutcome::Paused,
                _ => {}
            }
            if self.cond.wait_until(&mut inner, deadline).timed_out() {
                return SleepOutcome::Elapsed;
            }
        }
    }

    /// 会话停止：打断所有等待与睡眠
    pub fn interrupt(&self) {
        let mut inner = self.inner.lock();
        inner.interrupted = true;
        self.cond.notify_all();
    }

    /// 工作线程退出循环时调用，防止控制方无限等待
    pub fn mark_exited(&self) {
        let mut inner = self.inner.lock();
        inner.exited = true;
        self.cond.notify_all();
    }

    pub fn has_exited(&self) -> bool {
        self.inner.lock().exited
    }
}

/// 会话内的线程角色表（替代全局注册表）
#[derive(Default)]
pub struct ThreadStateManager {
    states: HashMap<ThreadRole, Arc<ThreadStateController>>,
}

impl ThreadStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个角色，返回其控制器
    pub fn register(&mut self, role: ThreadRole) -> Arc<ThreadStateController> {
        self.states
            .entry(role)
            .or_insert_with(|| Arc::new(ThreadStateController::new(role)))
            .clone()
    }

    /// 登记一个已经存在的控制器（Demuxer 自带控制器）
    pub fn insert(&mut self, state: Arc<ThreadStateController>) {
        self.states.insert(state.role(), state);
    }

    pub fn get(&self, role: ThreadRole) -> Result<Arc<ThreadStateController>> {
        self.states
            .get(&role)
            .cloned()
            .ok_or(PlayerError::ThreadNotFound(role))
    }

    /// 停止时调用：所有线程离开等待，尽快观察到停止标志
    pub fn wake_up_all(&self) {
        for (role, state) in &self.states {
            if !state.is_wake_up_enabled() {
                warn!("⚠ {:?} 的唤醒仍处于禁用状态，强制打断", role);
            }
            state.interrupt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TrackType;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn controller() -> Arc<ThreadStateController> {
        Arc::new(ThreadStateController::new(ThreadRole::Decoder(TrackType::Video)))
    }

    fn wait_for_status(state: &ThreadStateController, status: ThreadStatus) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while state.status() != status {
            assert!(Instant::now() < deadline, "timed out waiting for {:?}", status);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn pause_waits_for_wake_up() {
        let state = controller();
        let woke = Arc::new(AtomicBool::new(false));

        let handle = {
            let state = state.clone();
            let woke = woke.clone();
            thread::spawn(move || {
                state.pause();
                woke.store(true, Ordering::SeqCst);
            })
        };

        wait_for_status(&state, ThreadStatus::Paused);
        assert!(!woke.load(Ordering::SeqCst));

        state.wake_up();
        handle.join().unwrap();
        assert!(woke.load(Ordering::SeqCst));
        assert_eq!(state.status(), ThreadStatus::Playing);
    }

    #[test]
    fn wake_before_pause_is_not_lost() {
        let state = controller();
        state.wake_up();
        // 挂起的唤醒被消费，pause 立即返回
        state.pause();
        assert_eq!(state.status(), ThreadStatus::Playing);
    }

    #[test]
    fn wake_up_is_ignored_while_disabled() {
        let state = controller();
        state.disable_wake_up();
        state.request_block();

        let handle = {
            let state = state.clone();
            thread::spawn(move || {
                assert!(state.is_blocking());
                state.block();
            })
        };

        assert_eq!(state.wait_until_blocked(), ThreadStatus::Blocked);
        state.wake_up();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(state.status(), ThreadStatus::Blocked);

        state.enable_wake_up();
        state.wake_up();
        handle.join().unwrap();
        assert_eq!(state.status(), ThreadStatus::Playing);
    }

    #[test]
    fn request_block_releases_paused_thread() {
        let state = controller();
        let handle = {
            let state = state.clone();
            thread::spawn(move || {
                state.pause();
                if state.is_blocking() {
                    state.block();
                }
            })
        };

        wait_for_status(&state, ThreadStatus::Paused);
        state.disable_wake_up();
        state.request_block();
        assert_eq!(state.wait_until_blocked(), ThreadStatus::Blocked);

        state.enable_wake_up();
        state.wake_up();
        handle.join().unwrap();
    }

    #[test]
    fn request_pause_is_observed_by_owner() {
        let state = controller();
        state.request_pause();
        assert!(state.is_pausing());

        let handle = {
            let state = state.clone();
            thread::spawn(move || state.pause())
        };
        assert_eq!(state.wait_until_paused(), ThreadStatus::Paused);
        state.wake_up();
        handle.join().unwrap();
        assert_eq!(state.status(), ThreadStatus::Playing);
    }

    #[test]
    fn sleep_is_cut_short_by_block_request() {
        let state = controller();
        let handle = {
            let state = state.clone();
            thread::spawn(move || state.sleep_for(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        state.request_block();
        assert_eq!(handle.join().unwrap(), SleepOutcome::Preempted);
    }

    #[test]
    fn sleep_reports_pause_request_separately() {
        let state = controller();
        let handle = {
            let state = state.clone();
            thread::spawn(move || state.sleep_for(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        state.request_pause();
        assert_eq!(handle.join().unwrap(), SleepOutcome::Paused);
        assert_eq!(state.status(), ThreadStatus::Pausing);
    }

    #[test]
    fn interrupt_ends_every_wait() {
        let state = controller();
        let sleeper = {
            let state = state.clone();
            thread::spawn(move || state.sleep_for(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        state.interrupt();
        assert_eq!(sleeper.join().unwrap(), SleepOutcome::Interrupted);

        // 打断后 pause 不再等待
        state.pause();
        assert!(state.is_interrupted());
    }

    #[test]
    fn exited_thread_does_not_hang_controller() {
        let state = controller();
        state.request_block();
        state.mark_exited();
        assert_eq!(state.wait_until_blocked(), ThreadStatus::Blocking);
        assert!(state.has_exited());
    }

    #[test]
    fn missing_role_is_reported() {
        let mut manager = ThreadStateManager::new();
        manager.register(ThreadRole::Demuxer);
        assert!(manager.get(ThreadRole::Demuxer).is_ok());
        assert!(matches!(
            manager.get(ThreadRole::Renderer(TrackType::Audio)),
            Err(PlayerError::ThreadNotFound(ThreadRole::Renderer(TrackType::Audio)))
        ));
    }
}
