//! 集成测试的内存集群替身。
//!
//! # 教案级导览
//!
//! - **Why**：分发核心的语义（完成模式、截止时间、视图收缩、怀疑信号）
//!   必须在多成员拓扑下验证；内存枢纽以确定性的内联投递模拟虚拟同步
//!   通道，毫秒场景交给 Tokio 的虚拟时钟；
//! - **How**：[`Cluster`] 是路由枢纽，[`MemberChannel`] 实现核心的通道
//!   契约；广播/单播/任播按目的地形态逐一投递，投递前落源地址；
//! - **What**：提供回显、静默、失败、延迟回显与手动应答五种请求处理器，
//!   组合出集成场景所需的全部成员行为。

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use murmur_core::{
    Address, Channel, CoreError, Destination, Event, Message, TransientFlags, UpHandler, View,
    codes,
};
use murmur_dispatch::{MessageDispatcher, RequestHandler, Responder};
use parking_lot::Mutex;

/// 内存集群枢纽：按目的地形态把下行消息路由回各成员的上行处理器。
pub struct Cluster {
    members: Mutex<Vec<(Address, Arc<MemberChannel>)>>,
    view_id: AtomicU64,
}

impl Cluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            members: Mutex::new(Vec::new()),
            view_id: AtomicU64::new(0),
        })
    }

    /// 注册一个成员通道；记得在装好所有分发器后调用 [`install_view`](Self::install_view)。
    pub fn join(self: &Arc<Self>, name: &str) -> Arc<MemberChannel> {
        let local = Address::node(name);
        let channel = Arc::new(MemberChannel {
            cluster: Arc::downgrade(self),
            local: local.clone(),
            handler: Mutex::new(None),
            view: Mutex::new(Arc::new(View::empty())),
            connected: AtomicBool::new(true),
            discard_own: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            sent: AtomicU64::new(0),
        });
        self.members.lock().push((local, Arc::clone(&channel)));
        channel
    }

    /// 以全部在册成员发布新视图。
    pub fn install_view(&self) {
        let names: Vec<Address> = self
            .members
            .lock()
            .iter()
            .map(|(addr, _)| addr.clone())
            .collect();
        self.publish_view(names);
    }

    /// 以指定成员子集发布新视图（视图收缩场景）。
    pub fn install_view_of(&self, names: &[&str]) {
        let members = names.iter().map(|name| Address::node(*name)).collect();
        self.publish_view(members);
    }

    /// 向所有成员广播站点不可达信号。
    pub fn site_unreachable(&self, site: &str) {
        let addr = Address::site(site);
        for (_, channel) in self.snapshot() {
            if let Some(handler) = channel.handler() {
                handler.up(Event::SiteUnreachable(addr.clone()));
            }
        }
    }

    /// 向所有成员广播怀疑信号。
    pub fn suspect(&self, name: &str) {
        let addr = Address::node(name);
        for (_, channel) in self.snapshot() {
            if let Some(handler) = channel.handler() {
                handler.up(Event::Suspect(addr.clone()));
            }
        }
    }

    fn publish_view(&self, members: Vec<Address>) {
        let id = self.view_id.fetch_add(1, Ordering::Relaxed) + 1;
        let view = Arc::new(View::new(id, members));
        for (_, channel) in self.snapshot() {
            *channel.view.lock() = Arc::clone(&view);
            if let Some(handler) = channel.handler() {
                handler.up(Event::ViewChange(Arc::clone(&view)));
            }
        }
    }

    fn snapshot(&self) -> Vec<(Address, Arc<MemberChannel>)> {
        self.members.lock().clone()
    }

    fn route(&self, src: &Address, msg: Message) -> Result<(), CoreError> {
        let members = self.snapshot();
        match msg.dest().clone() {
            Destination::Broadcast => {
                let skip_loopback = msg
                    .transient_flags()
                    .contains(TransientFlags::DONT_LOOPBACK)
                    || members
                        .iter()
                        .find(|(addr, _)| addr == src)
                        .is_some_and(|(_, ch)| ch.discard_own_messages());
                for (addr, channel) in &members {
                    if skip_loopback && addr == src {
                        continue;
                    }
                    Self::deliver(channel, src, msg.clone());
                }
            }
            Destination::Single(target) => {
                // 无此成员（如跨站点地址）：当作黑洞，静默丢弃。
                if let Some((_, channel)) = members.iter().find(|(addr, _)| addr == &target) {
                    Self::deliver(channel, src, msg);
                }
            }
            Destination::Anycast(targets) => {
                for target in targets {
                    if let Some((_, channel)) = members.iter().find(|(addr, _)| addr == &target) {
                        Self::deliver(channel, src, msg.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn deliver(channel: &Arc<MemberChannel>, src: &Address, mut msg: Message) {
        msg.set_src(src.clone());
        if let Some(handler) = channel.handler() {
            handler.up(Event::Message(msg));
        }
    }
}

/// 单个成员的通道替身。
pub struct MemberChannel {
    cluster: Weak<Cluster>,
    local: Address,
    handler: Mutex<Option<Arc<dyn UpHandler>>>,
    view: Mutex<Arc<View>>,
    connected: AtomicBool,
    discard_own: AtomicBool,
    fail_sends: AtomicBool,
    sent: AtomicU64,
}

impl MemberChannel {
    /// 本成员发出的下行消息条数。
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// 模拟传输层拒绝发送。
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// 模拟连接断开。
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// 开关「丢弃自身回环」。
    pub fn set_discard_own(&self, discard: bool) {
        self.discard_own.store(discard, Ordering::Relaxed);
    }

    /// 取出已安装的上行处理器，供测试直接注入事件或批次。
    pub fn up_handler(&self) -> Arc<dyn UpHandler> {
        self.handler().expect("分发器装配后应已安装上行处理器")
    }

    fn handler(&self) -> Option<Arc<dyn UpHandler>> {
        self.handler.lock().clone()
    }
}

impl Channel for MemberChannel {
    fn send(&self, msg: Message) -> Result<(), CoreError> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(CoreError::new(
                codes::CHANNEL_SEND_FAILED,
                "simulated transport failure",
            ));
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        let cluster = self
            .cluster
            .upgrade()
            .expect("集群枢纽应在通道存活期内有效");
        cluster.route(&self.local, msg)
    }

    fn view(&self) -> Arc<View> {
        Arc::clone(&self.view.lock())
    }

    fn local_address(&self) -> Option<Address> {
        Some(self.local.clone())
    }

    fn discard_own_messages(&self) -> bool {
        self.discard_own.load(Ordering::Relaxed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn set_up_handler(&self, handler: Arc<dyn UpHandler>) {
        *self.handler.lock() = Some(handler);
    }
}

/// 原样回显负载。
pub struct EchoHandler;

impl RequestHandler for EchoHandler {
    fn on_request(&self, msg: Message, responder: Responder) -> Result<(), CoreError> {
        responder.reply(Ok(msg.payload().clone()))
    }
}

/// 永不应答。
pub struct SilentHandler;

impl RequestHandler for SilentHandler {
    fn on_request(&self, _msg: Message, _responder: Responder) -> Result<(), CoreError> {
        Ok(())
    }
}

/// 以固定描述同步失败，相关器代发异常应答。
pub struct FailingHandler {
    pub message: &'static str,
}

impl RequestHandler for FailingHandler {
    fn on_request(&self, _msg: Message, _responder: Responder) -> Result<(), CoreError> {
        Err(CoreError::new(
            codes::DISPATCH_REMOTE_FAILURE,
            self.message,
        ))
    }
}

/// 异步分发示例：把应答句柄移入后台任务，延迟后回显。
pub struct DelayedEchoHandler {
    pub delay: Duration,
}

impl RequestHandler for DelayedEchoHandler {
    fn on_request(&self, msg: Message, responder: Responder) -> Result<(), CoreError> {
        let payload = msg.payload().clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = responder.reply(Ok(payload));
        });
        Ok(())
    }
}

/// 手动应答：测试代码决定何时回复，用于构造迟到应答与怀疑竞态。
#[derive(Default)]
pub struct ManualHandler {
    pending: Mutex<Vec<(Bytes, Responder)>>,
}

impl ManualHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 回复所有积压请求。
    pub fn reply_all(&self) {
        for (payload, responder) in self.pending.lock().drain(..) {
            let _ = responder.reply(Ok(payload));
        }
    }

    /// 当前积压数量。
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl RequestHandler for ManualHandler {
    fn on_request(&self, msg: Message, responder: Responder) -> Result<(), CoreError> {
        self.pending.lock().push((msg.payload().clone(), responder));
        Ok(())
    }
}

/// 记录转交到应用侧的全部事件。
#[derive(Default)]
pub struct CollectingUpHandler {
    events: Mutex<Vec<Event>>,
}

impl CollectingUpHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 取走迄今收到的事件。
    pub fn drain(&self) -> Vec<Event> {
        self.events.lock().drain(..).collect()
    }
}

impl UpHandler for CollectingUpHandler {
    fn up(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// 组装一个成员：注册通道并建好分发门面。
pub fn build_member(
    cluster: &Arc<Cluster>,
    name: &str,
    handler: Arc<dyn RequestHandler>,
) -> (Arc<MemberChannel>, Arc<MessageDispatcher>) {
    let channel = cluster.join(name);
    let dispatcher = MessageDispatcher::builder(Arc::clone(&channel) as Arc<dyn Channel>)
        .request_handler(handler)
        .build();
    (channel, dispatcher)
}

/// 组装一个带应用侧上行处理器的成员。
pub fn build_member_with_app(
    cluster: &Arc<Cluster>,
    name: &str,
    handler: Arc<dyn RequestHandler>,
    app: Arc<CollectingUpHandler>,
) -> (Arc<MemberChannel>, Arc<MessageDispatcher>) {
    let channel = cluster.join(name);
    let dispatcher = MessageDispatcher::builder(Arc::clone(&channel) as Arc<dyn Channel>)
        .request_handler(handler)
        .app_handler(app)
        .build();
    (channel, dispatcher)
}
