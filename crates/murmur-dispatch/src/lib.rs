#![deny(unsafe_code)]

//! # murmur-dispatch
//!
//! ## 定位与职责（Why）
//! - 群组通信工具箱的请求/响应分发核心：在 `murmur-core` 的通道契约之上，
//!   把单向消息投递转化为面向成员组的同步/异步调用——单播、多播与任播；
//! - 困难的部分是请求相关器：在任意成员变更、并发发送、并发接收与并发
//!   视图事件之下，把应答匹配回未决请求，兑现完成模式（all / majority /
//!   first / none）、逐请求截止时间，并用 SUSPECT/VIEW 信号解除等待者。
//!
//! ## 架构嵌入（Where）
//! - `dispatcher`：应用面向的门面与装配器，目的地过滤与统计计数；
//! - `correlator`：未决表、编号分配、入站路由与入站请求执行；
//! - `collector` / `request`：逐请求记账与调用方手里的结果句柄；
//! - `options` / `response`：调用旋钮与结果模型；
//! - `stats` / `probe`：调用计数与只读诊断面；
//! - `error`：领域错误，收敛到 `murmur-core` 的稳定错误码。
//!
//! ## 非目标（Trade-offs）
//! - 可靠投递、定序与流控归底层通道；负载序列化归应用；本 crate 只搬运
//!   不透明字节。

pub mod collector;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod options;
pub mod probe;
pub mod request;
pub mod response;
pub mod stats;

pub use collector::ResponseCollector;
pub use correlator::{RequestCorrelator, RequestHandler, Responder};
pub use dispatcher::{ChannelListener, DispatcherBuilder, MessageDispatcher};
pub use error::DispatchError;
pub use options::{RequestOptions, ResponseMode, RspFilter};
pub use probe::{DETAILS_DISABLED_HINT, ProbeHandler, RpcStatsProbe};
pub use request::{GroupRequest, UnicastRequest};
pub use response::{Rsp, RspList};
pub use stats::{RpcScope, RpcStats};
