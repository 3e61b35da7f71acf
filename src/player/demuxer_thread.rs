use log::{debug, info, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use crate::core::{PlayerError, Result, TrackType};
use crate::player::demuxer::Demuxer;
use crate::player::log_ctx;

const LOG_FIRST_N: usize = 5;

impl Demuxer {
    /// 启动读包线程
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut handle = self.thread_handle.lock();
        if handle.is_some() {
            return Err(PlayerError::InvalidState("Demuxer 线程已在运行".to_string()));
        }
        self.running.store(true, Ordering::SeqCst);

        let demuxer = self.clone();
        *handle = Some(
            thread::Builder::new()
                .name(self.state.role().thread_name())
                .spawn(move || demuxer.read_loop())?,
        );
        Ok(())
    }

    /// 通知读包线程退出（不等待）
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.state.interrupt();
    }

    /// 等待读包线程退出
    pub fn wait_stop(&self) {
        let handle = self.thread_handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("{} ⚠ Demuxer 线程异常退出", log_ctx());
            }
        }
    }

    /// 同步暂停：禁止唤醒，要求暂停，并等待读包线程真正停下
    pub fn pause(&self) {
        self.state.disable_wake_up();
        self.state.request_pause();
        self.state.wait_until_paused();
    }

    /// 恢复唤醒并唤醒读包线程
    pub fn resume(&self) {
        self.state.enable_wake_up();
        self.state.wake_up();
    }

    pub fn wake_up(&self) {
        self.state.wake_up();
    }

    /// 读包循环
    ///
    /// 每轮依次检查：停止标志、阻塞请求、暂停请求、队列已满、EOF，最后才读包。
    /// 队列满和 EOF 时自我暂停，由解码线程（或 seek 之后的恢复）唤醒。
    fn read_loop(self: Arc<Self>) {
        info!("{} 🎬 Demuxer 线程启动: {}", log_ctx(), self.description());

        let mut video_count: usize = 0;
        let mut audio_count: usize = 0;

        while self.running.load(Ordering::SeqCst) {
            if self.state.is_blocking() {
                self.state.block();
                continue;
            }

            if self.state.is_pausing() {
                debug!("{} ⏸ Demuxer 响应暂停请求", log_ctx());
                self.state.pause();
                continue;
            }

            if let Some(track_type) = self.full_track() {
                debug!("{} 📦 {} 包队列已满，Demuxer 暂停", log_ctx(), track_type);
                self.state.pause();
                continue;
            }

            if self.is_eof() {
                self.state.pause();
                continue;
            }

            let Some(info) = self.read_one_packet() else {
                continue;
            };

            match info.track_type {
                TrackType::Video => {
                    video_count += 1;
                    if video_count <= LOG_FIRST_N || video_count % 100 == 0 {
                        info!(
                            "{} 📦 Demuxer 读取视频包 #{}（total packets {}）",
                            log_ctx(),
                            video_count,
                            self.packets_read()
                        );
                    }
                }
                TrackType::Audio => {
                    audio_count += 1;
                    if audio_count <= LOG_FIRST_N || audio_count % 100 == 0 {
                        info!(
                            "{} 🔊 Demuxer 读取音频包 #{}（total packets {}）",
                            log_ctx(),
                            audio_count,
                            self.packets_read()
                        );
                    }
                }
                TrackType::Subtitle => {}
            }
        }

        self.state.mark_exited();
        info!(
            "{} 🛑 Demuxer 线程退出（共读取 {} 个包：{} 视频，{} 音频）",
            log_ctx(),
            self.packets_read(),
            video_count,
            audio_count
        );
    }
}
