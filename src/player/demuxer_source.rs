use crate::core::{
    DecodeError, Frame, FrameContext, MediaInfo, Packet, Result, StreamInfo, TargetFormat,
    TrackType,
};

/// Demuxer 数据源抽象接口
///
/// 这个 trait 定义了容器读取能力必须提供的方法，
/// 不同的媒体源（本地文件、网络流、内存流等）可以实现这个接口。
/// 核心只通过它读包 / seek，不关心容器格式本身。
pub trait DemuxerSource: Send {
    /// 打开媒体源
    fn open(&mut self, url: &str) -> Result<()>;

    /// 探测流信息
    fn find_stream_info(&mut self) -> Result<MediaInfo>;

    /// 读取下一个数据包
    ///
    /// 返回：
    /// - Ok(Some(packet)): 成功读取一个包
    /// - Ok(None): 到达文件末尾
    /// - Err(e): 读取错误
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// Seek 到指定位置
    ///
    /// `stream_index` 为 None 时 `timestamp` 使用全局时间基（微秒），
    /// 否则使用该流的时间基。
    fn seek(&mut self, stream_index: Option<usize>, timestamp: i64) -> Result<()>;

    /// 丢弃某条流在源内部缓存的数据
    fn flush(&mut self, _stream_index: usize) {}

    /// 获取描述信息（用于调试）
    fn description(&self) -> String;
}

/// 解码能力（每条轨道一个，由解码线程独占）
pub trait DecodeCapability: Send {
    /// 送入一个压缩包（调用方保证不会送入空包）
    fn send_packet(&mut self, packet: &Packet) -> std::result::Result<(), DecodeError>;

    /// 取出一帧；`Ok(None)` 表示需要更多输入。可在一次 send 之后反复调用。
    fn receive_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError>;

    /// 清空解码器内部缓冲（seek 之后）
    fn flush(&mut self);
}

/// 解码后的格式转换（缩放 / 色彩空间 / 重采样），可选
pub trait FrameAdapter: Send {
    /// 该帧是否需要转换
    fn needs_adaptation(&self, frame: &Frame, target: &TargetFormat) -> bool;

    fn adapt(&mut self, frame: &Frame, target: &TargetFormat) -> Result<Frame>;
}

/// 外部渲染端（视频画布、音频设备等）
pub trait FrameSink: Send + Sync {
    fn render(&self, context: &FrameContext) -> Result<()>;
}

/// 流选择器：给定轨道类型和流列表，返回想绑定的流索引
pub type StreamSelector = dyn Fn(TrackType, &[StreamInfo]) -> Option<usize> + Send + Sync;

/// 默认选择器：该类型的第一条流
pub fn first_stream_of_type(track_type: TrackType, streams: &[StreamInfo]) -> Option<usize> {
    streams
        .iter()
        .find(|s| s.track_type == track_type)
        .map(|s| s.index)
}

/// 媒体后端：为一次播放会话创建各项能力
pub trait MediaBackend: Send + Sync {
    fn create_source(&self) -> Box<dyn DemuxerSource>;

    fn create_decoder(&self, stream: &StreamInfo) -> Result<Box<dyn DecodeCapability>>;

    fn create_adapter(&self, _stream: &StreamInfo) -> Option<Box<dyn FrameAdapter>> {
        None
    }
}
