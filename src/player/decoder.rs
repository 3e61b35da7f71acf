use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::core::{Packet, Result};
use crate::player::demuxer::Demuxer;
use crate::player::demuxer_source::DecodeCapability;
use crate::player::log_ctx;
use crate::player::thread_state::ThreadStateController;
use crate::player::track::Track;

const LOG_FIRST_N: usize = 3;

/// 解码线程（每条轨道一个）
///
/// 从包队列取包送入解码能力，把产出的帧放进帧队列。
/// 帧队列满时自我暂停；包队列低于低水位时唤醒 Demuxer；
/// 包队列空时自我暂停，若 Demuxer 已到结尾则标记本轨道解码完成。
pub struct DecoderWorker {
    track: Arc<Track>,
    decoder: Box<dyn DecodeCapability>,
    state: Arc<ThreadStateController>,
    renderer_state: Arc<ThreadStateController>,
    demuxer: Arc<Demuxer>,
    running: Arc<AtomicBool>,
    frames_decoded: usize,
}

impl DecoderWorker {
    pub fn new(
        track: Arc<Track>,
        decoder: Box<dyn DecodeCapability>,
        state: Arc<ThreadStateController>,
        renderer_state: Arc<ThreadStateController>,
        demuxer: Arc<Demuxer>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            track,
            decoder,
            state,
            renderer_state,
            demuxer,
            running,
            frames_decoded: 0,
        }
    }

    /// 在独立线程中运行解码循环
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let name = self.state.role().thread_name();
        Ok(thread::Builder::new().name(name).spawn(move || self.run())?)
    }

    fn run(mut self) {
        let track_type = self.track.track_type();
        info!("{} 🎞 {} 解码线程启动", log_ctx(), track_type);

        while self.running.load(Ordering::SeqCst) {
            if self.state.is_blocking() {
                self.state.block();
                continue;
            }

            if self.track.take_flush_request() {
                debug!("{} 🔄 {} 解码器 flush", log_ctx(), track_type);
                self.decoder.flush();
            }

            if self.state.is_pausing() || self.track.frame_queue.is_full() {
                self.state.pause();
                continue;
            }

            if self.track.packet_queue.is_below_min() {
                self.demuxer.wake_up();
            }

            // 先读 EOF 再取包：EOF 置位之后不会再有新包入队
            let eof = self.demuxer.is_eof();
            let Some(packet) = self.track.packet_queue.try_dequeue() else {
                if eof && self.track.mark_decode_finished() {
                    info!(
                        "{} 📄 {} 解码完成（共 {} 帧）",
                        log_ctx(),
                        track_type,
                        self.frames_decoded
                    );
                    self.renderer_state.wake_up();
                } else if !eof {
                    // 低水位为 0 时 is_below_min 不会成立，空队列也要唤醒
                    self.demuxer.wake_up();
                }
                self.state.pause();
                continue;
            };

            self.decode_packet(packet);
        }

        self.state.mark_exited();
        info!(
            "{} 🛑 {} 解码线程退出（共解码 {} 帧）",
            log_ctx(),
            track_type,
            self.frames_decoded
        );
    }

    /// 送入一个包并取出所有帧
    fn decode_packet(&mut self, packet: Packet) {
        // 空包会被部分解码后端当作结束标记，永远不送
        if packet.is_empty() {
            debug!("跳过空包 (stream #{})", packet.stream_index);
            return;
        }

        if let Err(e) = self.decoder.send_packet(&packet) {
            if !e.is_transient() {
                warn!("{} 解码错误（已跳过）: {}", self.track.track_type(), e);
                return;
            }
        }

        loop {
            match self.decoder.receive_frame() {
                Ok(Some(frame)) => {
                    let queue = &self.track.frame_queue;
                    let previous = queue.size();
                    queue.enqueue(frame);
                    self.frames_decoded += 1;
                    if self.frames_decoded <= LOG_FIRST_N || self.frames_decoded % 100 == 0 {
                        debug!(
                            "{} 解码 {} 帧 #{} (队列 {})",
                            log_ctx(),
                            self.track.track_type(),
                            self.frames_decoded,
                            previous + 1
                        );
                    }
                    if previous <= queue.min() {
                        self.renderer_state.wake_up();
                    }
                }
                Ok(None) => break,
                Err(e) if e.is_transient() => break,
                Err(e) => {
                    warn!("{} 取帧错误（已跳过）: {}", self.track.track_type(), e);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        DecodeError, Frame, FrameFormat, MediaInfo, PixelFormat, QueueOptions, Rational,
        StreamInfo, ThreadRole, TrackType,
    };
    use crate::player::demuxer_source::DemuxerSource;
    use crate::player::queue::BoundedQueue;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    struct IdleSource;

    impl DemuxerSource for IdleSource {
        fn open(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }
        fn find_stream_info(&mut self) -> Result<MediaInfo> {
            Ok(MediaInfo::default())
        }
        fn read_packet(&mut self) -> Result<Option<Packet>> {
            Ok(None)
        }
        fn seek(&mut self, _stream_index: Option<usize>, _timestamp: i64) -> Result<()> {
            Ok(())
        }
        fn description(&self) -> String {
            "idle".to_string()
        }
    }

    /// 每个包出一帧；数据首字节为 0xFF 的包解码失败
    struct RecordingDecoder {
        seen: Arc<Mutex<Vec<Option<i64>>>>,
        pending: Option<Frame>,
    }

    impl DecodeCapability for RecordingDecoder {
        fn send_packet(&mut self, packet: &Packet) -> std::result::Result<(), DecodeError> {
            self.seen.lock().push(packet.pts);
            if packet.data[0] == 0xFF {
                return Err(DecodeError::Failed("corrupt".to_string()));
            }
            self.pending = Some(Frame {
                stream_index: packet.stream_index,
                pts: packet.pts,
                duration: packet.duration,
                format: FrameFormat::Video {
                    width: 2,
                    height: 2,
                    pixel: PixelFormat::RGBA,
                },
                hardware: false,
                data: packet.data.clone(),
            });
            Ok(())
        }

        fn receive_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError> {
            match self.pending.take() {
                Some(frame) => Ok(Some(frame)),
                None => Err(DecodeError::Again),
            }
        }

        fn flush(&mut self) {
            self.pending = None;
        }
    }

    fn packet(pts: i64, data: Vec<u8>) -> Packet {
        Packet {
            stream_index: 0,
            pts: Some(pts),
            duration: 1,
            keyframe: true,
            data,
        }
    }

    #[test]
    fn empty_and_corrupt_packets_do_not_stop_decoding() {
        let queues = QueueOptions::default();
        let stream = StreamInfo {
            index: 0,
            track_type: TrackType::Video,
            time_base: Rational::new(1, 25),
            frame_duration: 1,
            codec_name: "test".to_string(),
        };
        let packets = Arc::new(BoundedQueue::new(queues.packets(TrackType::Video)));
        packets.enqueue(packet(0, vec![]));
        packets.enqueue(packet(1, vec![0xFF]));
        packets.enqueue(packet(2, vec![7]));
        let track = Arc::new(Track::new(stream, packets, &queues));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(ThreadStateController::new(ThreadRole::Decoder(TrackType::Video)));
        let renderer = Arc::new(ThreadStateController::new(ThreadRole::Renderer(TrackType::Video)));
        let running = Arc::new(AtomicBool::new(true));

        let worker = DecoderWorker::new(
            track.clone(),
            Box::new(RecordingDecoder {
                seen: seen.clone(),
                pending: None,
            }),
            state.clone(),
            renderer,
            Arc::new(Demuxer::new(Box::new(IdleSource))),
            running.clone(),
        );
        let handle = worker.spawn().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while track.frame_queue.size() < 1 {
            assert!(Instant::now() < deadline, "decoder produced no frame");
            thread::sleep(Duration::from_millis(1));
        }

        running.store(false, Ordering::SeqCst);
        state.interrupt();
        handle.join().unwrap();

        // 空包从未送入解码器
        assert_eq!(*seen.lock(), vec![Some(1), Some(2)]);
        let frame = track.frame_queue.try_dequeue().unwrap();
        assert_eq!(frame.pts, Some(2));
        assert!(state.has_exited());
    }
}
