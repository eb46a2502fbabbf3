use std::fmt;

use crate::address::Address;

/// 视图编号，按集群单调递增。
pub type ViewId = u64;

/// 成员协议发布的权威成员列表快照。
///
/// # 设计背景（Why）
/// - 分发核心把视图当作「保留插入顺序的地址集合」使用：任播按顺序逐一单播，
///   响应列表按发送顺序迭代，因此构造时去重但不排序；
/// - 视图在上行事件中整体替换、从不原地修改，读者只会看到旧快照或新快照。
///
/// # 契约说明（What）
/// - `id`：视图编号，成员协议保证同一集群内单调；
/// - `members`：去重后的有序成员列表；
/// - **后置条件**：`contains` 与 `members` 反映构造时传入的顺序。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    id: ViewId,
    members: Vec<Address>,
}

impl View {
    /// 以编号与成员列表构造视图，重复地址保留首次出现的位置。
    pub fn new(id: ViewId, members: Vec<Address>) -> Self {
        let mut unique = Vec::with_capacity(members.len());
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }
        Self { id, members: unique }
    }

    /// 构造空视图，常用于尚未连接的通道。
    pub fn empty() -> Self {
        Self {
            id: 0,
            members: Vec::new(),
        }
    }

    /// 视图编号。
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// 有序成员列表。
    pub fn members(&self) -> &[Address] {
        &self.members
    }

    /// 指定地址是否为本视图成员。
    pub fn contains(&self, addr: &Address) -> bool {
        self.members.contains(addr)
    }

    /// 成员数量。
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// 是否为空视图。
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}|", self.id)?;
        for (idx, member) in self.members.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{member}")?;
        }
        write!(f, "]")
    }
}
