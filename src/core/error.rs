use thiserror::Error;

use crate::core::types::{ThreadRole, TrackType};

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("配置解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("无法打开媒体源: {0}")]
    OpenError(String),

    #[error("无法获取流信息: {0}")]
    StreamInfoError(String),

    #[error("没有可解码的轨道")]
    NoDecodableTrack,

    #[error("无法创建 {0:?} 解码器: {1}")]
    DecoderOpenError(TrackType, String),

    #[error("读包错误: {0}")]
    ReadError(String),

    #[error("Seek 失败: {0}")]
    SeekError(String),

    #[error("格式转换失败: {0}")]
    AdaptError(String),

    #[error("渲染错误: {0}")]
    RenderError(String),

    #[error("找不到线程角色: {0:?}")]
    ThreadNotFound(ThreadRole),

    #[error("播放器状态不允许该操作: {0}")]
    InvalidState(String),

    #[error("配置无效: {0}")]
    ConfigError(String),

    #[error("其他错误: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;

/// 解码能力返回的错误
///
/// `Again` / `Eof` 属于正常流控信号，解码线程直接吞掉；
/// 只有 `Failed` 会被记录并跳过当前数据单元。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("解码器需要更多输入")]
    Again,

    #[error("解码器已到达结尾")]
    Eof,

    #[error("解码失败: {0}")]
    Failed(String),
}

impl DecodeError {
    /// 是否为可以静默忽略的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, DecodeError::Again | DecodeError::Eof)
    }
}
