//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为分发门面对外暴露的错误语义提供集中定义，确保与 `murmur-core` 的
//!   稳定错误码对齐；
//! - 细粒度枚举支撑调用方的精确分支：超时可重试、被怀疑需换目标、远端
//!   失败应上抛业务层。
//!
//! ## 设计要求（What）
//! - 所有错误类型实现 `thiserror::Error` 以兼容 `std::error::Error`；
//! - 通过 [`From<DispatchError>`](From) 收敛为 [`CoreError`]，错误码
//!   选自 [`murmur_core::codes`]。

use murmur_core::{Address, CoreError, codes};
use thiserror::Error;

/// 分发核心的领域错误。
///
/// # 教案式说明
/// - **意图 (Why)**：把「参数非法 / 通道未连接 / 超时 / 怀疑 / 远端失败 /
///   发送失败 / 已停机」七类故障显式建模，调用方按变体决策而非解析字符串；
/// - **契约 (What)**：所有变体 `Send + Sync + 'static`，可安全跨线程传播；
///   `From` 实现为每个变体挑选稳定错误码；
/// - **设计权衡 (Trade-offs)**：`Remote` 以 `String` 携带远端失败描述，
///   牺牲少量堆分配换取跨成员传输后的可读性。
#[derive(Debug, Error)]
pub enum DispatchError {
    /// 结构性非法的调用参数，例如对单播附加任播选项。
    #[error("structurally invalid request argument: {reason}")]
    InvalidArgument { reason: String },

    /// 通道尚未连接即发起下行发送。
    #[error("channel is not connected")]
    NotConnected,

    /// 阻塞式单播在截止时间前未等到应答。
    #[error("request {request_id} timed out after {timeout_ms} ms")]
    Timeout { request_id: u64, timeout_ms: u64 },

    /// 预期应答者在回复前被成员协议怀疑。
    #[error("peer `{peer}` was suspected before replying")]
    Suspected { peer: Address },

    /// 目的地址被判定不可达。
    #[error("peer `{peer}` is unreachable")]
    Unreachable { peer: Address },

    /// 远端请求处理器执行失败。
    #[error("remote handler failed: {message}")]
    Remote { message: String },

    /// 传输层拒绝了请求，门面同步上抛。
    #[error("request could not be handed to the channel")]
    SendFailed(#[source] CoreError),

    /// 分发器已停机。
    #[error("dispatcher has been stopped")]
    Stopped,
}

impl DispatchError {
    /// 变体对应的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => codes::DISPATCH_INVALID_ARGUMENT,
            Self::NotConnected => codes::CHANNEL_NOT_CONNECTED,
            Self::Timeout { .. } => codes::DISPATCH_REQUEST_TIMEOUT,
            Self::Suspected { .. } => codes::DISPATCH_PEER_SUSPECTED,
            Self::Unreachable { .. } => codes::DISPATCH_PEER_UNREACHABLE,
            Self::Remote { .. } => codes::DISPATCH_REMOTE_FAILURE,
            Self::SendFailed(_) => codes::CHANNEL_SEND_FAILED,
            Self::Stopped => codes::DISPATCH_STOPPED,
        }
    }

    /// 把相关器上抛的核心错误映射回领域错误。
    ///
    /// - 已登记的「未连接 / 已停机」码值还原为对应变体，其余一律视作发送失败。
    pub(crate) fn from_send(err: CoreError) -> Self {
        if err.is(codes::CHANNEL_NOT_CONNECTED) {
            Self::NotConnected
        } else if err.is(codes::DISPATCH_STOPPED) {
            Self::Stopped
        } else {
            Self::SendFailed(err)
        }
    }
}

impl From<DispatchError> for CoreError {
    fn from(err: DispatchError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            DispatchError::SendFailed(cause) => CoreError::new(code, message).with_cause(cause),
            _ => CoreError::new(code, message),
        }
    }
}
