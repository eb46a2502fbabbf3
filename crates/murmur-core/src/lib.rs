#![deny(unsafe_code)]

//! # murmur-core
//!
//! ## 定位与职责（Why）
//! - 群组通信工具箱的核心契约层：定义地址、视图、消息、请求关联头，以及
//!   把分发核心挂接到底层虚拟同步通道所需的事件与通道 trait；
//! - 上层 `murmur-dispatch` 在这些契约之上实现请求/响应归集，通道实现方
//!   只需满足 [`channel::Channel`] 与 [`event::UpHandler`] 即可接入。
//!
//! ## 架构嵌入（Where）
//! - `address` / `view`：成员标识与权威成员列表快照；
//! - `message` / `header`：不透明负载的消息单元与逐位确定的关联头编码；
//! - `event` / `channel`：上行事件模型与通道消费契约；
//! - `error`：跨层共享的稳定错误域与错误码登记处。
//!
//! ## 设计取舍（Trade-offs）
//! - 本 crate 不依赖异步运行时：契约层只描述形态，调度归上层与通道实现；
//! - 可靠投递、定序、流控均为通道职责，核心契约不重复表达。

pub mod address;
pub mod channel;
pub mod error;
pub mod event;
pub mod future;
pub mod header;
pub mod message;
pub mod view;

pub use address::Address;
pub use channel::Channel;
pub use error::{CoreError, codes};
pub use event::{Event, MessageBatch, UpHandler};
pub use future::BoxFuture;
pub use header::{HeaderKind, RequestHeader};
pub use message::{Destination, Message, MessageFlags, TransientFlags};
pub use view::{View, ViewId};
