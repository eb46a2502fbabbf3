//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为群组通信核心提供跨层共享的稳定错误域：通道层、相关器层与门面层产生的
//!   故障在此合流为统一的错误码，方便日志、指标与告警系统执行自动化治理；
//! - 上层 crate（如 `murmur-dispatch`）可定义细粒度领域枚举，再通过 `From`
//!   收敛到本模块的 [`CoreError`]。
//!
//! ## 设计要求（What）
//! - 错误码恒为 `'static` 字符串，遵循 `<域>.<语义>` 命名约定并集中登记在
//!   [`codes`] 模块；
//! - `message` 面向排障人员，不得携带敏感信息；`cause` 保留底层根因链路。

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;

/// 核心层登记在案的稳定错误码。
///
/// # 契约说明（What）
/// - 所有码值遵循 `<域>.<语义>` 约定；新增码值必须同步更新分发层的映射与测试；
/// - 码值一经发布不得改写含义，只能废弃后另立新码。
pub mod codes {
    /// 通道尚未连接即发起下行发送。
    pub const CHANNEL_NOT_CONNECTED: &str = "channel.not_connected";
    /// 传输层拒绝了本次发送。
    pub const CHANNEL_SEND_FAILED: &str = "channel.send_failed";
    /// 关联头解码失败（字节不足或枚举越界）。
    pub const PROTOCOL_DECODE: &str = "protocol.decode";
    /// 结构性非法的调用参数。
    pub const DISPATCH_INVALID_ARGUMENT: &str = "dispatch.invalid_argument";
    /// 截止时间先于完成谓词到达。
    pub const DISPATCH_REQUEST_TIMEOUT: &str = "dispatch.request_timeout";
    /// 预期应答者在回复前被成员协议怀疑。
    pub const DISPATCH_PEER_SUSPECTED: &str = "dispatch.peer_suspected";
    /// 目的地址被判定不可达（跨站点路由失败等）。
    pub const DISPATCH_PEER_UNREACHABLE: &str = "dispatch.peer_unreachable";
    /// 远端请求处理器执行失败，失败详情由响应槽携带。
    pub const DISPATCH_REMOTE_FAILURE: &str = "dispatch.remote_failure";
    /// 相关器已停机，在途请求被强制结清。
    pub const DISPATCH_STOPPED: &str = "dispatch.stopped";
}

/// `CoreError` 是 murmur 各层共享的最底层错误形态。
///
/// # 设计背景（Why）
/// - 分发核心运行在传输投递线程与调用方任务之间，错误需要跨线程传播并在
///   观测链路中保持机读语义，因此以「稳定码 + 可读消息 + 可选根因」三元组表达；
/// - 不引入枚举而使用结构体，避免每新增一个故障场景都破坏下游匹配。
///
/// # 契约说明（What）
/// - `code`：来自 [`codes`] 或遵循同一约定的扩展码；
/// - `message`：自然语言描述，可为静态或堆分配字符串；
/// - `cause`：可选的底层根因，经 [`source`](StdError::source) 暴露完整链路。
///
/// # 风险提示（Trade-offs）
/// - `message` 使用 [`Cow`]，静态文案零分配、动态文案付出一次堆分配，换取
///   拼装上下文时的灵活性。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl CoreError {
    /// 构造核心错误。
    ///
    /// - **输入参数**：`code` 为稳定错误码；`message` 为排障描述；
    /// - **后置条件**：返回值拥有独立所有权，可安全跨线程移动，尚不含根因。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层根因并返回新的核心错误。
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 读取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 读取排障消息。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 判断错误码是否属于给定值，便于调用方做精确分支。
    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl StdError for CoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}
