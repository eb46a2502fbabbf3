use std::sync::Arc;

use crate::address::Address;
use crate::error::CoreError;
use crate::event::UpHandler;
use crate::message::Message;
use crate::view::View;

/// 分发核心消费的虚拟同步通道契约。
///
/// # 设计背景（Why）
/// - 核心位于通道之上、应用之下：通道负责可靠投递、定序与流控，核心只要求
///   「能发消息、能看视图、能装上行处理器」这三件事；
/// - 以对象安全 trait 表达，测试中用内存通道替身即可驱动全部语义。
///
/// # 契约说明（What）
/// - `send`：下行发送一条消息，可能因背压阻塞，错误原样上抛；
/// - `view`：当前视图快照，整体替换、从不原地修改；
/// - `local_address`：本地地址，连接完成前可能为 `None`；
/// - `discard_own_messages`：通道是否丢弃自己发出的多播回环；
/// - `set_up_handler`：安装上行处理器，后续事件全部经由它投递。
///
/// # 风险提示（Trade-offs）
/// - `send` 为同步签名：通道实现若内部异步，需自行决定阻塞或排队策略，
///   核心不感知。
pub trait Channel: Send + Sync + 'static {
    /// 下行发送一条消息。
    fn send(&self, msg: Message) -> Result<(), CoreError>;

    /// 当前视图快照。
    fn view(&self) -> Arc<View>;

    /// 本地地址，连接前为 `None`。
    fn local_address(&self) -> Option<Address>;

    /// 通道是否丢弃自身多播回环。
    fn discard_own_messages(&self) -> bool;

    /// 通道是否处于已连接状态。
    fn is_connected(&self) -> bool;

    /// 安装上行事件处理器。
    fn set_up_handler(&self, handler: Arc<dyn UpHandler>);
}
