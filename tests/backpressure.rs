use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use avsync_player::core::{DecodeError, Frame, Packet, QueueOptions, ThreadRole, TrackType};
use avsync_player::player::decoder::DecoderWorker;
use avsync_player::player::synthetic::SyntheticSource;
use avsync_player::player::{
    first_stream_of_type, DecodeCapability, Demuxer, SyntheticMedia, SyntheticStats,
    ThreadStateController, ThreadStatus, Track,
};

fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn demuxer_pauses_at_high_watermark_and_resumes_below_low() {
    let _ = env_logger::builder().is_test(true).try_init();

    let source = SyntheticSource::new(
        SyntheticMedia::with_duration(120.0),
        Arc::new(SyntheticStats::default()),
    );
    let demuxer = Arc::new(Demuxer::new(Box::new(source)));
    let queues = QueueOptions::default();
    demuxer
        .open_and_select_streams(
            "synthetic://backpressure",
            &[TrackType::Video, TrackType::Audio],
            &first_stream_of_type,
            &queues,
        )
        .unwrap();
    let audio = demuxer.packet_queue(TrackType::Audio).unwrap();
    let state = demuxer.thread_state();

    demuxer.start().unwrap();

    // 音频包更密，先到达上限
    wait_until("demuxer to pause", || state.status() == ThreadStatus::Paused);
    assert_eq!(audio.size(), queues.audio_packets.max);
    let read_when_full = demuxer.packets_read();

    // 仍不低于下限：没有人唤醒，Demuxer 不读包
    while audio.size() > queues.audio_packets.min {
        audio.try_dequeue().unwrap();
    }
    thread::sleep(Duration::from_millis(50));
    assert_eq!(demuxer.packets_read(), read_when_full);

    // 低于下限后唤醒，重新填满
    audio.try_dequeue().unwrap();
    assert!(audio.is_below_min());
    demuxer.wake_up();
    wait_until("queue to refill", || audio.is_full());
    assert!(demuxer.packets_read() > read_when_full);

    demuxer.stop();
    demuxer.wait_stop();
    assert!(state.has_exited());
}

/// 每收到一个许可才消费一个包，不产出帧
struct GatedDecoder {
    permits: Receiver<()>,
}

impl DecodeCapability for GatedDecoder {
    fn send_packet(&mut self, _packet: &Packet) -> Result<(), DecodeError> {
        self.permits
            .recv()
            .map_err(|_| DecodeError::Failed("closed".to_string()))
    }

    fn receive_frame(&mut self) -> Result<Option<Frame>, DecodeError> {
        Ok(None)
    }

    fn flush(&mut self) {}
}

#[test]
fn decoder_wakes_demuxer_only_below_low_watermark() {
    let _ = env_logger::builder().is_test(true).try_init();

    let source = SyntheticSource::new(
        SyntheticMedia::with_duration(120.0),
        Arc::new(SyntheticStats::default()),
    );
    let demuxer = Arc::new(Demuxer::new(Box::new(source)));
    let queues = QueueOptions::default();
    demuxer
        .open_and_select_streams(
            "synthetic://decoder-drain",
            &[TrackType::Video],
            &first_stream_of_type,
            &queues,
        )
        .unwrap();
    let stream = demuxer
        .media_info()
        .streams
        .into_iter()
        .find(|s| s.track_type == TrackType::Video)
        .unwrap();
    let packets = demuxer.packet_queue(TrackType::Video).unwrap();
    let track = Arc::new(Track::new(stream, packets.clone(), &queues));
    let (max, min) = (queues.video_packets.max, queues.video_packets.min);

    let decoder_state = Arc::new(ThreadStateController::new(ThreadRole::Decoder(TrackType::Video)));
    {
        let decoder_state = decoder_state.clone();
        demuxer.set_packet_callback(TrackType::Video, Arc::new(move || decoder_state.wake_up()));
    }
    let (permits, permit_rx) = bounded::<()>(0);
    let running = Arc::new(AtomicBool::new(true));
    let handle = DecoderWorker::new(
        track,
        Box::new(GatedDecoder { permits: permit_rx }),
        decoder_state.clone(),
        Arc::new(ThreadStateController::new(ThreadRole::Renderer(TrackType::Video))),
        demuxer.clone(),
        running.clone(),
    )
    .spawn()
    .unwrap();

    let demuxer_state = demuxer.thread_state();
    demuxer.start().unwrap();

    // 解码线程手里压着一个包，队列被填满
    wait_until("demuxer to pause", || {
        demuxer_state.status() == ThreadStatus::Paused && packets.size() == max
    });
    let read_when_full = demuxer.packets_read();

    let permit = || permits.send_timeout((), Duration::from_secs(5)).unwrap();

    // 解码线程消费到 min：仍不低于下限，Demuxer 保持暂停
    for _ in 0..(max - min) {
        permit();
    }
    wait_until("queue to drain to min", || packets.size() == min);
    permit();
    wait_until("queue to drop below min", || packets.size() == min - 1);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(demuxer_state.status(), ThreadStatus::Paused);
    assert_eq!(demuxer.packets_read(), read_when_full);

    // 下一轮循环看到 size < min，由解码线程唤醒 Demuxer
    permit();
    wait_until("demuxer to resume", || demuxer.packets_read() > read_when_full);
    wait_until("queue to refill", || packets.is_full());

    running.store(false, Ordering::SeqCst);
    drop(permits);
    decoder_state.interrupt();
    demuxer.stop();
    demuxer.wait_stop();
    handle.join().unwrap();
}
