// 播放器核心模块

pub mod thread_state;
pub mod queue;
pub mod demuxer_source; // 容器 / 解码 / 渲染能力接口
pub mod demuxer;
pub mod demuxer_thread; // Demuxer 线程管理
pub mod track;
pub mod decoder;
pub mod renderer;
pub mod sync;
pub mod request_task;
pub mod synthetic; // 合成媒体后端（演示和测试用）
pub mod manager;

pub use demuxer::Demuxer;
pub use demuxer_source::{
    first_stream_of_type, DecodeCapability, DemuxerSource, FrameAdapter, FrameSink, MediaBackend,
    StreamSelector,
};
pub use manager::{Player, PlayerBuilder};
pub use queue::BoundedQueue;
pub use sync::{ClockSync, SyncDecision, ThresholdSync};
pub use synthetic::{SyntheticBackend, SyntheticMedia, SyntheticStats};
pub use thread_state::{ThreadStateController, ThreadStateManager, ThreadStatus};
pub use track::Track;

use std::{process, thread};

/// 日志前缀：进程号和线程号
pub(crate) fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}
