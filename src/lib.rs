//! 流式媒体播放引擎核心
//!
//! 一个解封装线程，每条轨道一个解码线程和一个渲染线程，
//! 通过有界队列（高低水位）协作；seek 等控制请求在专门的线程上
//! 串行执行，执行期间整个流水线静止。

pub mod core;
pub mod player;

pub use crate::core::{PlayerError, PlayerEvent, PlayerOptions, PlayerState, Result, TrackType};
pub use crate::player::{Player, PlayerBuilder};
