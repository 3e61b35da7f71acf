use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::core::{
    MediaInfo, Packet, PacketInfo, PlayerError, QueueOptions, Result, StreamInfo, ThreadRole,
    TrackType,
};
use crate::player::demuxer_source::{DemuxerSource, StreamSelector};
use crate::player::queue::BoundedQueue;
use crate::player::thread_state::ThreadStateController;
use crate::player::log_ctx;

/// 包入队回调（解码线程借此被唤醒）
pub type PacketCallback = Arc<dyn Fn() + Send + Sync>;

/// 已绑定的轨道
struct DemuxTrack {
    stream: StreamInfo,
    packet_queue: Arc<BoundedQueue<Packet>>,
    on_packet_enqueued: Option<PacketCallback>,
}

/// 解封装器 - 持有容器句柄，读包并分发到各轨道的包队列
///
/// 容器句柄平时只由读包线程使用；控制请求期间（读包线程已暂停）
/// 由请求处理线程独占，用来 seek。
pub struct Demuxer {
    pub(crate) source: Mutex<Box<dyn DemuxerSource>>,
    tracks: RwLock<Vec<DemuxTrack>>,
    media_info: RwLock<MediaInfo>,
    pub(crate) state: Arc<ThreadStateController>,
    pub(crate) running: AtomicBool,
    pub(crate) eof: AtomicBool,
    pub(crate) thread_handle: Mutex<Option<JoinHandle<()>>>,
    packet_count: AtomicUsize,
}

impl Demuxer {
    pub fn new(source: Box<dyn DemuxerSource>) -> Self {
        Self {
            source: Mutex::new(source),
            tracks: RwLock::new(Vec::new()),
            media_info: RwLock::new(MediaInfo::default()),
            state: Arc::new(ThreadStateController::new(ThreadRole::Demuxer)),
            running: AtomicBool::new(false),
            eof: AtomicBool::new(false),
            thread_handle: Mutex::new(None),
            packet_count: AtomicUsize::new(0),
        }
    }

    /// 打开媒体源并为每个想要的轨道类型选择一条流
    ///
    /// 只有当选择器返回的索引对应的流确实是该类型时才绑定。
    /// 打开或探测失败返回错误；一条都没绑定上返回 `NoDecodableTrack`。
    pub fn open_and_select_streams(
        &self,
        url: &str,
        wanted: &[TrackType],
        selector: &StreamSelector,
        queues: &QueueOptions,
    ) -> Result<Vec<StreamInfo>> {
        info!("{} 正在打开媒体源: {}", log_ctx(), url);

        let media_info = {
            let mut source = self.source.lock();
            source.open(url)?;
            source.find_stream_info()?
        };

        debug!("流信息: {:?}", media_info.streams);

        let mut bound = Vec::new();
        {
            let mut tracks = self.tracks.write();
            tracks.clear();

            for &track_type in wanted {
                if bound.iter().any(|s: &StreamInfo| s.track_type == track_type) {
                    continue;
                }
                let Some(index) = selector(track_type, &media_info.streams) else {
                    info!("📭 没有选中 {} 流", track_type);
                    continue;
                };
                let Some(stream) = media_info
                    .streams
                    .iter()
                    .find(|s| s.index == index && s.track_type == track_type)
                else {
                    warn!(
                        "⚠ 选择器为 {} 返回的流索引 {} 不存在或类型不匹配，跳过",
                        track_type, index
                    );
                    continue;
                };

                info!("✅ 绑定 {} 流: #{} ({})", track_type, stream.index, stream.codec_name);
                tracks.push(DemuxTrack {
                    stream: stream.clone(),
                    packet_queue: Arc::new(BoundedQueue::new(queues.packets(track_type))),
                    on_packet_enqueued: None,
                });
                bound.push(stream.clone());
            }
        }

        *self.media_info.write() = media_info;

        if bound.is_empty() {
            return Err(PlayerError::NoDecodableTrack);
        }
        Ok(bound)
    }

    pub fn media_info(&self) -> MediaInfo {
        self.media_info.read().clone()
    }

    pub fn description(&self) -> String {
        self.source.lock().description()
    }

    /// 某轨道的包队列
    pub fn packet_queue(&self, track_type: TrackType) -> Option<Arc<BoundedQueue<Packet>>> {
        self.tracks
            .read()
            .iter()
            .find(|t| t.stream.track_type == track_type)
            .map(|t| t.packet_queue.clone())
    }

    /// 设置某轨道的包入队回调
    pub fn set_packet_callback(&self, track_type: TrackType, callback: PacketCallback) {
        if let Some(track) = self
            .tracks
            .write()
            .iter_mut()
            .find(|t| t.stream.track_type == track_type)
        {
            track.on_packet_enqueued = Some(callback);
        }
    }

    /// 读取一个属于已绑定轨道的包，放入对应队列
    ///
    /// 到达结尾或读取出错时返回 None（错误只记录，不抛出），并置位 EOF。
    pub fn read_one_packet(&self) -> Option<PacketInfo> {
        let mut source = self.source.lock();
        loop {
            match source.read_packet() {
                Ok(Some(packet)) => {
                    let routed = {
                        let tracks = self.tracks.read();
                        tracks
                            .iter()
                            .find(|t| t.stream.index == packet.stream_index)
                            .map(|track| {
                                let info = PacketInfo {
                                    track_type: track.stream.track_type,
                                    stream_index: packet.stream_index,
                                    pts: packet.pts,
                                    size: packet.data.len(),
                                };
                                track.packet_queue.enqueue(packet);
                                (info, track.on_packet_enqueued.clone())
                            })
                    };
                    // 未绑定的流直接丢弃，继续读
                    if let Some((info, callback)) = routed {
                        drop(source);
                        self.packet_count.fetch_add(1, Ordering::Relaxed);
                        if let Some(callback) = callback {
                            callback();
                        }
                        return Some(info);
                    }
                }
                Ok(None) => {
                    drop(source);
                    if !self.eof.swap(true, Ordering::SeqCst) {
                        info!(
                            "{} 📄 Demuxer 到达文件末尾（共读取 {} 个包）",
                            log_ctx(),
                            self.packets_read()
                        );
                        self.notify_all_tracks();
                    }
                    return None;
                }
                Err(e) => {
                    drop(source);
                    error!("{} ❌ 读取包失败: {}", log_ctx(), e);
                    if !self.eof.swap(true, Ordering::SeqCst) {
                        self.notify_all_tracks();
                    }
                    return None;
                }
            }
        }
    }

    /// 到达结尾时通知所有轨道：已在空队列上暂停的解码线程需要醒来确认 EOF
    fn notify_all_tracks(&self) {
        let callbacks: Vec<PacketCallback> = self
            .tracks
            .read()
            .iter()
            .filter_map(|t| t.on_packet_enqueued.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// 容器级 seek（仅在读包线程暂停期间调用）
    pub fn seek(&self, stream_index: Option<usize>, timestamp: i64) -> Result<()> {
        let mut source = self.source.lock();
        source.seek(stream_index, timestamp)?;
        for track in self.tracks.read().iter() {
            source.flush(track.stream.index);
        }
        self.eof.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// 清空某轨道的包队列，返回丢弃的包数
    pub fn flush_packet_queue(&self, track_type: TrackType) -> usize {
        let dropped = self
            .packet_queue(track_type)
            .map(|q| q.clear())
            .unwrap_or(0);
        if dropped > 0 {
            debug!("🧹 清空 {} 包队列: {} 个", track_type, dropped);
        }
        dropped
    }

    /// 是否有轨道的包队列达到高水位
    pub(crate) fn full_track(&self) -> Option<TrackType> {
        self.tracks
            .read()
            .iter()
            .find(|t| t.packet_queue.is_full())
            .map(|t| t.stream.track_type)
    }

    pub fn is_eof(&self) -> bool {
        self.eof.load(Ordering::SeqCst)
    }

    pub fn packets_read(&self) -> usize {
        self.packet_count.load(Ordering::Relaxed)
    }

    pub fn thread_state(&self) -> Arc<ThreadStateController> {
        self.state.clone()
    }
}
