//! # Dispatcher
//!
//! 跨通道链接分发模块。
//!
//! 负责：
//! - 接收曲轴引擎步进输出中的链接动作 (`ChannelAction::Link`)
//! - Fan-out 到凸轮日志与从属通道
//! - 隔离慢目标，不阻塞引擎主链路

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod targets;

pub use contracts::{LinkMessage, LinkTarget};
pub use dispatcher::{Collaborators, DispatcherBuilder, LinkDispatcher};
pub use error::DispatcherError;
pub use handle::LinkHandle;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use targets::{CamLog, CamLogTarget, DependentChannel, DependentStatus, LogTarget};
