//! # event 模块说明
//!
//! ## 角色定位（Why）
//! - 通道把视图变更、怀疑通知、消息投递等上行信号统一为 [`Event`] 交给
//!   上行处理器。分发核心实现该处理器，消费与请求/响应相关的事件，并把
//!   其余事件原样转交应用；
//! - 以和类型而非继承层次建模事件消费者：一个对象安全的 [`UpHandler`]
//!   即可把核心挂到任意通道实现上。

use std::sync::Arc;

use crate::address::Address;
use crate::message::Message;
use crate::view::View;

/// 通道向上投递的事件。
///
/// # 契约说明（What）
/// - `ViewChange` 携带整体替换的新视图快照；
/// - `Suspect` / `SiteUnreachable` 是成员协议与站点路由的负面信号，
///   相关器将其视作对应地址的否定性应答；
/// - 状态转移类事件（`GetApplState` 等）核心不解释，原样转交应用；
/// - `Message` 为普通消息投递，来源已由传输层落定。
#[derive(Clone, Debug)]
pub enum Event {
    /// 成员协议发布新视图。
    ViewChange(Arc<View>),
    /// 指定成员被怀疑不可达。
    Suspect(Address),
    /// 跨站点路由报告目标站点不可达。
    SiteUnreachable(Address),
    /// 传输层确定了本地地址。
    SetLocalAddress(Address),
    /// 状态请求（核心透传）。
    GetApplState,
    /// 状态获取完成（核心透传）。
    GetStateOk,
    /// 状态转移输入流就绪（核心透传）。
    StateTransferInputStream,
    /// 状态转移输出流就绪（核心透传）。
    StateTransferOutputStream,
    /// flush 阶段开始，暂停发送（核心透传）。
    Block,
    /// flush 阶段结束（核心透传）。
    Unblock,
    /// 普通消息投递。
    Message(Message),
}

/// 同一发送方攒批投递的消息集合。
///
/// # 设计背景（Why）
/// - 传输层常把同源消息合并上行以摊薄调度成本；批内顺序即到达顺序，
///   消费方逐条处理即可保持语义。
#[derive(Clone, Debug)]
pub struct MessageBatch {
    sender: Option<Address>,
    messages: Vec<Message>,
}

impl MessageBatch {
    /// 以发送方与消息列表构造批次。
    pub fn new(sender: Option<Address>, messages: Vec<Message>) -> Self {
        Self { sender, messages }
    }

    /// 批次的发送方。
    pub fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// 批内消息数量。
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// 是否为空批次。
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// 按到达顺序取出全部消息。
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// 通道上行事件的消费契约。
///
/// # 契约说明（What）
/// - `up` 在传输投递线程上被并发调用，实现必须线程安全且不得长时间阻塞；
/// - `up_batch` 默认逐条退化为 `up`，对批量敏感的实现可覆写。
pub trait UpHandler: Send + Sync + 'static {
    /// 消费单个上行事件。
    fn up(&self, event: Event);

    /// 消费一批同源消息。
    fn up_batch(&self, batch: MessageBatch) {
        for message in batch.into_messages() {
            self.up(Event::Message(message));
        }
    }
}
