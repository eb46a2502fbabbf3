use std::fmt;

/// 集群成员的不透明标识。
///
/// # 设计背景（Why）
/// - 分发核心不关心地址的物理形态（UUID、主机名、逻辑名均可），只要求可比较、
///   可哈希、可全序排序，以支撑响应槽索引与稳定的统计输出；
/// - 跨站点地址（[`Address::Site`]）是一等公民：目的地过滤永远保留它们，
///   即便其不出现在本地视图中，这样跨站网关才能转发请求。
///
/// # 契约说明（What）
/// - `Node`：普通集群成员，必须出现在视图中才会被保留为预期应答者；
/// - `Site`：跨站点地址，绕过视图成员检查；
/// - 两个地址相等当且仅当变体与名字完全一致。
///
/// # 风险提示（Trade-offs）
/// - 名字以 `String` 存储，克隆有一次堆分配；响应槽与视图均按引用比较，
///   热路径上不构成瓶颈。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    /// 普通成员地址。
    Node(String),
    /// 跨站点地址，目的地过滤无条件保留。
    Site(String),
}

impl Address {
    /// 以名字构造普通成员地址。
    pub fn node(name: impl Into<String>) -> Self {
        Self::Node(name.into())
    }

    /// 以名字构造跨站点地址。
    pub fn site(name: impl Into<String>) -> Self {
        Self::Site(name.into())
    }

    /// 是否为跨站点地址。
    pub fn is_site_address(&self) -> bool {
        matches!(self, Self::Site(_))
    }

    /// 读取地址的逻辑名。
    pub fn name(&self) -> &str {
        match self {
            Self::Node(name) | Self::Site(name) => name,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(name) => write!(f, "{name}"),
            Self::Site(name) => write!(f, "site:{name}"),
        }
    }
}
