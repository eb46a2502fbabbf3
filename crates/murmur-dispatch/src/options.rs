//! # options 模块说明
//!
//! ## 角色定位（Why）
//! - [`RequestOptions`] 是一次调用的全部旋钮：完成模式、截止时间、任播开关、
//!   标志位、排除列表与响应过滤器，以值类型随调用传递；
//! - builder 风格的 `with_*` 链路在构造期定型，发出后不再变化，避免并发
//!   调用间共享可变配置。

use std::fmt;
use std::sync::Arc;

use murmur_core::{Address, MessageFlags, TransientFlags};

use crate::response::Rsp;

/// 完成模式：多少个非缺失应答构成一次完成。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseMode {
    /// 不等待任何应答，发送交付后立即完成。
    GetNone,
    /// 任一值或异常应答即完成。
    GetFirst,
    /// ⌊N/2⌋+1 个有定论的槽位即完成，N 为初始预期数。
    GetMajority,
    /// 所有预期槽位有定论才完成。
    #[default]
    GetAll,
}

/// 响应过滤器契约。
///
/// # 契约说明（What）
/// - `is_acceptable` 拒绝的应答不落槽位（保持 `NotReceived`）；
/// - `needs_more_responses` 返回 `false` 时请求提前定格，即便完成模式
///   尚未满足；
/// - 实现必须线程安全：过滤器在传输投递线程上被并发调用。
pub trait RspFilter: Send + Sync + 'static {
    /// 是否接纳来自 `sender` 的这份应答。
    fn is_acceptable(&self, rsp: &Rsp, sender: &Address) -> bool;

    /// 是否还需要更多应答；默认永远需要。
    fn needs_more_responses(&self) -> bool {
        true
    }
}

/// 一次调用的选项集合。
///
/// # 契约说明（What）
/// - `timeout_ms == 0` 表示无限等待；
/// - `anycast` 把多目的地调用展开为逐个单播；`use_anycast_addresses`
///   进一步折叠为一条携带地址列表的消息；
/// - `exclusion_list` 中的地址在目的地过滤阶段被剔除。
#[derive(Clone, Default)]
pub struct RequestOptions {
    mode: ResponseMode,
    timeout_ms: u64,
    anycast: bool,
    use_anycast_addresses: bool,
    flags: MessageFlags,
    transient_flags: TransientFlags,
    exclusion_list: Vec<Address>,
    rsp_filter: Option<Arc<dyn RspFilter>>,
}

impl RequestOptions {
    /// 同步调用预设：`GET_ALL` + 给定截止时间。
    pub fn sync(timeout_ms: u64) -> Self {
        Self {
            mode: ResponseMode::GetAll,
            timeout_ms,
            ..Self::default()
        }
    }

    /// 异步调用预设：`GET_NONE`，发出即完成。
    pub fn asynchronous() -> Self {
        Self {
            mode: ResponseMode::GetNone,
            ..Self::default()
        }
    }

    /// 指定完成模式。
    pub fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    /// 指定截止时间（毫秒，0 为无限等待）。
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// 开关任播：多目的地展开为逐个单播。
    pub fn with_anycast(mut self, anycast: bool) -> Self {
        self.anycast = anycast;
        self
    }

    /// 以单条携带地址列表的消息实现任播；隐含开启任播。
    pub fn with_anycast_addresses(mut self, enabled: bool) -> Self {
        self.use_anycast_addresses = enabled;
        if enabled {
            self.anycast = true;
        }
        self
    }

    /// 叠加线上标志位。
    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = self.flags.union(flags);
        self
    }

    /// 叠加瞬态标志位。
    pub fn with_transient_flags(mut self, flags: TransientFlags) -> Self {
        self.transient_flags = self.transient_flags.union(flags);
        self
    }

    /// 追加一个排除地址。
    pub fn exclude(mut self, addr: Address) -> Self {
        self.exclusion_list.push(addr);
        self
    }

    /// 整体替换排除列表。
    pub fn with_exclusion_list(mut self, list: Vec<Address>) -> Self {
        self.exclusion_list = list;
        self
    }

    /// 安装响应过滤器。
    pub fn with_rsp_filter(mut self, filter: Arc<dyn RspFilter>) -> Self {
        self.rsp_filter = Some(filter);
        self
    }

    /// 完成模式。
    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// 截止时间（毫秒）。
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// 是否为同步调用（期待应答）。
    pub fn is_sync(&self) -> bool {
        self.mode != ResponseMode::GetNone
    }

    /// 是否任播。
    pub fn anycast(&self) -> bool {
        self.anycast
    }

    /// 是否使用紧凑地址列表任播。
    pub fn use_anycast_addresses(&self) -> bool {
        self.use_anycast_addresses
    }

    /// 线上标志位。
    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    /// 瞬态标志位。
    pub fn transient_flags(&self) -> TransientFlags {
        self.transient_flags
    }

    /// 排除列表。
    pub fn exclusion_list(&self) -> &[Address] {
        &self.exclusion_list
    }

    /// 响应过滤器。
    pub fn rsp_filter(&self) -> Option<&Arc<dyn RspFilter>> {
        self.rsp_filter.as_ref()
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("mode", &self.mode)
            .field("timeout_ms", &self.timeout_ms)
            .field("anycast", &self.anycast)
            .field("use_anycast_addresses", &self.use_anycast_addresses)
            .field("flags", &self.flags)
            .field("transient_flags", &self.transient_flags)
            .field("exclusion_list", &self.exclusion_list)
            .field("has_rsp_filter", &self.rsp_filter.is_some())
            .finish()
    }
}
