//! # response 模块说明
//!
//! ## 角色定位（Why）
//! - 定义单个应答槽（[`Rsp`]）与按发送顺序组织的结果列表（[`RspList`]）；
//! - 远端失败是数据而非控制流：异常应答落在 [`Rsp::Exception`] 槽位里，
//!   不会在相关器内部以抛错形式传播。

use std::fmt;

use bytes::Bytes;
use murmur_core::Address;

/// 一个预期应答者对应的槽位状态。
///
/// # 契约说明（What）
/// - `NotReceived` 为初始态；
/// - `Value` / `Exception` 计入「已收到」（received）；
/// - `Suspected` / `Unreachable` 是成员协议或路由层的否定信号，计入
///   「已定论」（resolved）但不算收到；
/// - 完成谓词的计数口径见收集器实现。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rsp {
    /// 初始态：尚无任何信号。
    NotReceived,
    /// 远端处理器的返回值。
    Value(Bytes),
    /// 远端处理器的失败描述。
    Exception(String),
    /// 应答者在回复前被怀疑。
    Suspected,
    /// 应答者被判定不可达。
    Unreachable,
}

impl Rsp {
    /// 是否收到了远端的明确答复（值或异常）。
    pub fn is_received(&self) -> bool {
        matches!(self, Self::Value(_) | Self::Exception(_))
    }

    /// 是否已有定论（任何非初始态）。
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::NotReceived)
    }

    /// 是否为怀疑信号。
    pub fn is_suspected(&self) -> bool {
        matches!(self, Self::Suspected)
    }

    /// 取正常返回值。
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            Self::Value(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl fmt::Display for Rsp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReceived => write!(f, "not-received"),
            Self::Value(bytes) => write!(f, "value({} bytes)", bytes.len()),
            Self::Exception(message) => write!(f, "exception({message})"),
            Self::Suspected => write!(f, "suspected"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// 一次群组调用的结果：地址到应答槽的有序映射。
///
/// # 设计背景（Why）
/// - 迭代顺序即发送顺序，调用方可以据此做确定性的归并与展示；
/// - 列表在收集器完成后定格，所有等待者看到同一份终值。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RspList {
    entries: Vec<(Address, Rsp)>,
}

impl RspList {
    pub(crate) fn new(entries: Vec<(Address, Rsp)>) -> Self {
        Self { entries }
    }

    /// 空结果哨兵：过滤后目的集为空或 `GET_NONE` 调用的即时返回值。
    pub fn empty() -> Self {
        Self::default()
    }

    /// 指定地址的槽位。
    pub fn get(&self, addr: &Address) -> Option<&Rsp> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == addr)
            .map(|(_, rsp)| rsp)
    }

    /// 指定地址的正常返回值。
    pub fn value_of(&self, addr: &Address) -> Option<&Bytes> {
        self.get(addr).and_then(Rsp::value)
    }

    /// 按发送顺序出现的第一个正常返回值。
    pub fn first_value(&self) -> Option<&Bytes> {
        self.entries.iter().find_map(|(_, rsp)| rsp.value())
    }

    /// 「已收到」槽位数量（值或异常）。
    pub fn num_received(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, rsp)| rsp.is_received())
            .count()
    }

    /// 「已定论」槽位数量（任何非初始态）。
    pub fn num_resolved(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, rsp)| rsp.is_resolved())
            .count()
    }

    /// 预期应答者总数。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空结果。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按发送顺序迭代（地址, 槽位）。
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Rsp)> {
        self.entries.iter().map(|(addr, rsp)| (addr, rsp))
    }

    /// 按发送顺序迭代地址。
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.entries.iter().map(|(addr, _)| addr)
    }
}

impl fmt::Display for RspList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (idx, (addr, rsp)) in self.entries.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{addr}: {rsp}")?;
        }
        write!(f, "]")
    }
}

impl IntoIterator for RspList {
    type Item = (Address, Rsp);
    type IntoIter = std::vec::IntoIter<(Address, Rsp)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
