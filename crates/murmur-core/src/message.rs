//! # message 模块说明
//!
//! ## 角色定位（Why）
//! - 定义通道上下行的最小消息形态：目的地、来源、不透明负载、标志位与
//!   关联头。分发核心不理解负载内容，只负责搬运与归集；
//! - 标志位拆分为「线上标志」与「瞬态标志」两组：前者随消息上线传播，
//!   后者只影响本地发送路径（如 DONT_LOOPBACK），不会出现在对端。
//!
//! ## 设计要求（What）
//! - 消息对调用方近似不可变：除 `set_src`（由传输层落源地址）外全部以
//!   builder 风格在构造期定型；
//! - 负载使用 [`Bytes`]，克隆只增加引用计数，适合多目的地扇出。

use bytes::Bytes;

use crate::address::Address;
use crate::header::RequestHeader;

/// 随消息上线传播的标志位集合。
///
/// # 契约说明（What）
/// - 封闭枚举：仅 `OOB`、`DONT_BUNDLE`、`NO_FC`、`RSVP` 四个位有效；
/// - 分发核心只负责透传，具体语义由下层协议栈解释。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MessageFlags(u16);

impl MessageFlags {
    /// 乱序投递提示，绕过有序通道。
    pub const OOB: Self = Self(1 << 0);
    /// 禁止与其他消息合包。
    pub const DONT_BUNDLE: Self = Self(1 << 1);
    /// 绕过流控协议。
    pub const NO_FC: Self = Self(1 << 2);
    /// 要求传输层回执。
    pub const RSVP: Self = Self(1 << 3);

    /// 空标志集。
    pub const fn empty() -> Self {
        Self(0)
    }

    /// 合并另一组标志，返回新集合。
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// 是否包含给定标志的全部位。
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// 原始位值，供传输层编码使用。
    pub const fn bits(self) -> u16 {
        self.0
    }
}

/// 仅作用于本地发送路径的瞬态标志集合。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransientFlags(u16);

impl TransientFlags {
    /// 本地不回环：自己发出的多播不会被自己收到。
    pub const DONT_LOOPBACK: Self = Self(1 << 0);

    /// 空标志集。
    pub const fn empty() -> Self {
        Self(0)
    }

    /// 合并另一组标志，返回新集合。
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// 是否包含给定标志的全部位。
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// 消息的目的地形态。
///
/// # 设计背景（Why）
/// - 与其像原型系统那样以「特殊地址子类」表达任播目的地，不如用和类型把
///   三种投递形态显式写进类型里，匹配分支即穷尽语义；
/// - `Anycast` 承载紧凑地址列表，供启用 use-anycast-addresses 的调用方
///   以单条消息覆盖成员子集。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// 集群广播（多播）。
    Broadcast,
    /// 点对点单播。
    Single(Address),
    /// 携带地址列表的任播消息。
    Anycast(Vec<Address>),
}

/// 通道上下行的消息单元。
///
/// # 契约说明（What）
/// - `dest` 构造期定型；`src` 由传输层在投递前通过 [`set_src`](Message::set_src) 落定；
/// - `payload` 为不透明字节序列，分发核心不做任何解释；
/// - `header` 为可选的请求关联头，只有经相关器发出的消息才携带。
#[derive(Clone, Debug)]
pub struct Message {
    dest: Destination,
    src: Option<Address>,
    payload: Bytes,
    flags: MessageFlags,
    transient_flags: TransientFlags,
    header: Option<RequestHeader>,
}

impl Message {
    /// 以目的地与负载构造消息，标志位为空、来源未定。
    pub fn new(dest: Destination, payload: Bytes) -> Self {
        Self {
            dest,
            src: None,
            payload,
            flags: MessageFlags::empty(),
            transient_flags: TransientFlags::empty(),
            header: None,
        }
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

    /// 附加请求关联头。
    pub fn with_header(mut self, header: RequestHeader) -> Self {
        self.header = Some(header);
        self
    }

    /// 由传输层在投递前写入来源地址。
    pub fn set_src(&mut self, src: Address) {
        self.src = Some(src);
    }

    /// 目的地。
    pub fn dest(&self) -> &Destination {
        &self.dest
    }

    /// 来源地址，传输层落定前为 `None`。
    pub fn src(&self) -> Option<&Address> {
        self.src.as_ref()
    }

    /// 不透明负载。
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// 线上标志位。
    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    /// 瞬态标志位。
    pub fn transient_flags(&self) -> TransientFlags {
        self.transient_flags
    }

    /// 请求关联头。
    pub fn header(&self) -> Option<&RequestHeader> {
        self.header.as_ref()
    }
}
