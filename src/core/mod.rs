// 核心数据结构和类型定义

pub mod types;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;

// 重新导出常用类型
pub use types::{Frame, FrameContext, Packet, PlayerState, TrackType};

pub use types::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use events::*;
