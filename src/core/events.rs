//! 播放器生命周期事件
//!
//! 事件在产生它的工作线程上同步投递，接收方不能长时间阻塞。

use std::fmt;
use std::sync::Arc;

use crate::core::types::{FrameContext, PlayerState, TrackType};

/// 控制请求的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Seek,
}

/// 控制请求处理所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    BeforeEnqueue,
    AfterEnqueue,
    BeforeHandle,
    AfterHandle,
}

/// 控制请求的描述（事件里携带的最小字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestInfo {
    pub kind: RequestKind,
    /// 请求序号（会话内单调递增）
    pub serial: u64,
    pub timestamp: i64,
    pub stream_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    PlaybackStateChange {
        new_state: PlayerState,
        old_state: PlayerState,
    },
    RequestHandle {
        phase: RequestPhase,
        request: RequestInfo,
    },
    Render(Arc<FrameContext>),
    RenderError {
        track: TrackType,
        message: String,
    },
    EndOfStream {
        track: TrackType,
    },
    PlaybackFinished,
}

impl PlayerEvent {
    /// 同一个请求换一个阶段
    pub fn with_phase(request: RequestInfo, phase: RequestPhase) -> Self {
        PlayerEvent::RequestHandle { phase, request }
    }
}

type Listener = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

/// 事件发射器（可克隆，传给各工作线程）
#[derive(Clone, Default)]
pub struct EventEmitter {
    listener: Option<Listener>,
}

impl EventEmitter {
    pub fn new<F>(listener: F) -> Self
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        Self {
            listener: Some(Arc::new(listener)),
        }
    }

    /// 没有监听者的发射器
    pub fn silent() -> Self {
        Self { listener: None }
    }

    pub fn emit(&self, event: PlayerEvent) {
        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("has_listener", &self.has_listener())
            .finish()
    }
}
