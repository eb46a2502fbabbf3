//! # dispatcher 模块说明
//!
//! ## 角色定位（Why）
//! - [`MessageDispatcher`] 是应用面向的门面：持有相关器、成员视图快照与
//!   调用统计，向上实现通道的上行处理器契约，把请求/应答流量留给自己，
//!   其余事件原样转交应用；
//! - 目的地过滤、截止时间折算与统计计数都发生在门面：相关器只看到过滤后
//!   的确定性目的地列表。
//!
//! ## 并发契约（What）
//! - 成员视图以 [`ArcSwap`] 整体替换：读者看到旧快照或新快照，绝无撕裂；
//! - 视图事件先替换快照、后作用于收集器，保证两者之间发出的请求观察到
//!   一致的预期集；
//! - 通道监听器集合写时复制：注册/注销罕见，遍历频繁。
//!
//! ## 设计取舍（Trade-offs）
//! - 请求处理器与应用上行处理器都在构造期定型，换取运行期的无锁读取；
//!   需要热替换的场景应重建门面。

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use bytes::Bytes;
use murmur_core::{
    Address, Channel, CoreError, Event, MessageBatch, TransientFlags, UpHandler, View,
};
use tracing::{debug, warn};

use crate::correlator::{RequestCorrelator, RequestHandler};
use crate::error::DispatchError;
use crate::options::RequestOptions;
use crate::probe::RpcStatsProbe;
use crate::request::{GroupRequest, UnicastRequest};
use crate::response::RspList;
use crate::stats::{RpcScope, RpcStats};

/// 成员视图与本地身份的原子快照；视图事件整体替换，从不原地修改。
#[derive(Clone, Debug)]
struct Membership {
    view: Arc<View>,
    local: Option<Address>,
}

/// 通道生命周期的观察者契约。
///
/// # 契约说明（What）
/// - 回调失败只记录日志并吞掉，绝不中断相关器；
/// - 集合写时复制：注册/注销是罕见操作，通知遍历无锁。
pub trait ChannelListener: Send + Sync + 'static {
    /// 通道连接建立。
    fn channel_connected(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// 通道连接断开。
    fn channel_disconnected(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// 通道彻底关闭。
    fn channel_closed(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// 门面的装配器。
///
/// # 教案式说明
/// - **意图 (Why)**：把通道、请求处理器、相关器编号与统计开关收进一次
///   装配，`build` 之后全部只读；
/// - **契约 (What)**：`build` 返回 `Arc` 包装的门面，并已把它安装为通道
///   的上行处理器、启动相关器。
pub struct DispatcherBuilder {
    channel: Arc<dyn Channel>,
    request_handler: Option<Arc<dyn RequestHandler>>,
    app_handler: Option<Arc<dyn UpHandler>>,
    corr_id: u16,
    extended_stats: bool,
}

impl DispatcherBuilder {
    /// 以底层通道开始装配。
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            request_handler: None,
            app_handler: None,
            corr_id: 0,
            extended_stats: false,
        }
    }

    /// 安装入站请求处理器。
    pub fn request_handler(mut self, handler: Arc<dyn RequestHandler>) -> Self {
        self.request_handler = Some(handler);
        self
    }

    /// 安装应用侧上行处理器，接收非请求/应答事件。
    pub fn app_handler(mut self, handler: Arc<dyn UpHandler>) -> Self {
        self.app_handler = Some(handler);
        self
    }

    /// 指定相关器编号。
    pub fn corr_id(mut self, corr_id: u16) -> Self {
        self.corr_id = corr_id;
        self
    }

    /// 预先开启扩展统计。
    pub fn extended_stats(mut self, enabled: bool) -> Self {
        self.extended_stats = enabled;
        self
    }

    /// 完成装配：启动相关器并把门面挂为通道的上行处理器。
    pub fn build(self) -> Arc<MessageDispatcher> {
        let stats = Arc::new(RpcStats::new());
        stats.set_extended(self.extended_stats);
        let correlator = Arc::new(RequestCorrelator::new(
            Arc::clone(&self.channel),
            self.corr_id,
            self.request_handler,
        ));
        let membership = Membership {
            view: self.channel.view(),
            local: self.channel.local_address(),
        };
        let dispatcher = Arc::new(MessageDispatcher {
            channel: Arc::clone(&self.channel),
            correlator,
            membership: ArcSwap::from_pointee(membership),
            stats,
            app_handler: self.app_handler,
            listeners: ArcSwap::from_pointee(Vec::new()),
        });
        dispatcher.correlator.start();
        self.channel
            .set_up_handler(Arc::clone(&dispatcher) as Arc<dyn UpHandler>);
        dispatcher
    }
}

/// 群组调用门面。
pub struct MessageDispatcher {
    channel: Arc<dyn Channel>,
    correlator: Arc<RequestCorrelator>,
    membership: ArcSwap<Membership>,
    stats: Arc<RpcStats>,
    app_handler: Option<Arc<dyn UpHandler>>,
    listeners: ArcSwap<Vec<Arc<dyn ChannelListener>>>,
}

impl MessageDispatcher {
    /// 进入装配流程。
    pub fn builder(channel: Arc<dyn Channel>) -> DispatcherBuilder {
        DispatcherBuilder::new(channel)
    }

    /// 阻塞式多播/任播：等待完成谓词或截止时间，返回结果列表。
    pub async fn cast_message(
        &self,
        dests: Option<&[Address]>,
        payload: Bytes,
        opts: RequestOptions,
    ) -> Result<RspList, DispatchError> {
        Ok(self.cast_message_with_future(dests, payload, opts)?.results().await)
    }

    /// 非阻塞多播/任播：发出请求并返回结果句柄。
    ///
    /// # 契约说明（What）
    /// - `dests == None` 表示「当前视图全体成员」；
    /// - 过滤后目的集为空时返回立即就绪的空哨兵句柄，不触网；
    /// - 截止时间在过滤之后、通道发送之前起算。
    pub fn cast_message_with_future(
        &self,
        dests: Option<&[Address]>,
        payload: Bytes,
        opts: RequestOptions,
    ) -> Result<GroupRequest, DispatchError> {
        let sync = opts.is_sync();
        let scope = if opts.anycast() {
            RpcScope::Anycast
        } else {
            RpcScope::Multicast
        };
        self.stats.record_call(sync, scope);

        let targets = self.filter_destinations(dests, &opts);
        if targets.is_empty() {
            debug!("destination set filtered to empty, returning sentinel");
            return Ok(GroupRequest::completed_empty());
        }
        let deadline = Self::deadline_for(&opts);
        let collector = self
            .correlator
            .send_request(&targets, payload, &opts, deadline)
            .map_err(DispatchError::from_send)?;
        Ok(GroupRequest::new(
            collector,
            Arc::clone(&self.correlator),
            Arc::clone(&self.stats),
            sync,
        ))
    }

    /// 阻塞式单播：返回单个响应值；`GET_NONE` 调用返回 `None`。
    pub async fn send_message(
        &self,
        dest: &Address,
        payload: Bytes,
        opts: RequestOptions,
    ) -> Result<Option<Bytes>, DispatchError> {
        self.send_message_with_future(dest, payload, opts)?.result().await
    }

    /// 非阻塞单播：发出请求并返回单值句柄。
    pub fn send_message_with_future(
        &self,
        dest: &Address,
        payload: Bytes,
        opts: RequestOptions,
    ) -> Result<UnicastRequest, DispatchError> {
        if opts.anycast() || opts.use_anycast_addresses() {
            return Err(DispatchError::InvalidArgument {
                reason: "anycast options are not applicable to a unicast".into(),
            });
        }
        let sync = opts.is_sync();
        self.stats.record_call(sync, RpcScope::Unicast);
        let deadline = Self::deadline_for(&opts);
        let timeout_ms = opts.timeout_ms();
        let collector = self
            .correlator
            .send_request(std::slice::from_ref(dest), payload, &opts, deadline)
            .map_err(DispatchError::from_send)?;
        Ok(UnicastRequest::new(
            dest.clone(),
            timeout_ms,
            GroupRequest::new(
                collector,
                Arc::clone(&self.correlator),
                Arc::clone(&self.stats),
                sync,
            ),
        ))
    }

    /// 调用方放弃指定请求：释放资源并以现有结果唤醒等待者；幂等。
    pub fn done(&self, request_id: u64) {
        self.correlator.done(request_id);
    }

    /// 停机：结清所有在途请求。
    pub fn stop(&self) {
        self.correlator.stop();
    }

    /// 调用统计。
    pub fn stats(&self) -> Arc<RpcStats> {
        Arc::clone(&self.stats)
    }

    /// 绑定在本门面统计上的诊断探针。
    pub fn probe_handler(&self) -> RpcStatsProbe {
        RpcStatsProbe::new(Arc::clone(&self.stats))
    }

    /// 未决请求数量。
    pub fn outstanding_requests(&self) -> usize {
        self.correlator.outstanding()
    }

    /// 当前成员视图快照。
    pub fn view(&self) -> Arc<View> {
        Arc::clone(&self.membership.load().view)
    }

    /// 本地地址。
    pub fn local_address(&self) -> Option<Address> {
        self.membership.load().local.clone()
    }

    /// 注册通道监听器。
    pub fn add_channel_listener(&self, listener: Arc<dyn ChannelListener>) {
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&listener));
            next
        });
    }

    /// 注销通道监听器（按句柄同一性）。
    pub fn remove_channel_listener(&self, listener: &Arc<dyn ChannelListener>) {
        self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|entry| !Arc::ptr_eq(entry, listener))
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    /// 通知监听器通道已连接；回调失败只记日志。
    pub fn notify_channel_connected(&self) {
        self.notify_listeners("connected", |l| l.channel_connected());
    }

    /// 通知监听器通道已断开。
    pub fn notify_channel_disconnected(&self) {
        self.notify_listeners("disconnected", |l| l.channel_disconnected());
    }

    /// 通知监听器通道已关闭。
    pub fn notify_channel_closed(&self) {
        self.notify_listeners("closed", |l| l.channel_closed());
    }

    fn notify_listeners(
        &self,
        what: &'static str,
        callback: impl Fn(&Arc<dyn ChannelListener>) -> Result<(), CoreError>,
    ) {
        for listener in self.listeners.load().iter() {
            if let Err(err) = callback(listener) {
                warn!(error = %err, event = what, "channel listener failed, ignoring");
            }
        }
    }

    fn deadline_for(opts: &RequestOptions) -> Option<Instant> {
        (opts.is_sync() && opts.timeout_ms() > 0)
            .then(|| Instant::now() + Duration::from_millis(opts.timeout_ms()))
    }

    /// 目的地过滤：输出确定性的有序预期应答者列表。
    ///
    /// # 契约说明（What）
    /// 依次应用四条规则：
    /// 1. 给定 `dests` 时仅保留跨站点地址与当前视图成员，保序去重；
    /// 2. 否则以当前成员快照起步；
    /// 3. 通道丢弃自身回环或请求带 `DONT_LOOPBACK` 时剔除本地地址；
    /// 4. 剔除排除列表中的全部地址。
    fn filter_destinations(
        &self,
        dests: Option<&[Address]>,
        opts: &RequestOptions,
    ) -> Vec<Address> {
        let membership = self.membership.load();
        let mut targets: Vec<Address> = match dests {
            Some(list) => {
                let mut out = Vec::with_capacity(list.len());
                for addr in list {
                    if (addr.is_site_address() || membership.view.contains(addr))
                        && !out.contains(addr)
                    {
                        out.push(addr.clone());
                    }
                }
                out
            }
            None => membership.view.members().to_vec(),
        };
        let drop_local = self.channel.discard_own_messages()
            || opts
                .transient_flags()
                .contains(TransientFlags::DONT_LOOPBACK);
        if drop_local && let Some(local) = &membership.local {
            targets.retain(|addr| addr != local);
        }
        if !opts.exclusion_list().is_empty() {
            targets.retain(|addr| !opts.exclusion_list().contains(addr));
        }
        targets
    }

    fn forward(&self, event: Event) {
        if let Some(app) = &self.app_handler {
            app.up(event);
        }
    }
}

impl UpHandler for MessageDispatcher {
    fn up(&self, event: Event) {
        match event {
            Event::ViewChange(view) => {
                // 先替换成员视图，再作用于收集器：两者之间发出的请求
                // 观察到的预期集与视图一致。
                self.membership.rcu(|current| Membership {
                    view: Arc::clone(&view),
                    local: current.local.clone(),
                });
                self.correlator.receive_view(&view);
                self.forward(Event::ViewChange(view));
            }
            Event::Suspect(addr) => {
                self.correlator.receive_suspect(&addr);
                self.forward(Event::Suspect(addr));
            }
            Event::SiteUnreachable(addr) => {
                self.correlator.receive_site_unreachable(&addr);
                self.forward(Event::SiteUnreachable(addr));
            }
            Event::SetLocalAddress(addr) => {
                self.membership.rcu(|current| Membership {
                    view: Arc::clone(&current.view),
                    local: Some(addr.clone()),
                });
                self.forward(Event::SetLocalAddress(addr));
            }
            Event::Message(msg) => {
                if let Some(msg) = self.correlator.receive_message(msg) {
                    self.forward(Event::Message(msg));
                }
            }
            other => self.forward(other),
        }
    }

    fn up_batch(&self, batch: MessageBatch) {
        for msg in batch.into_messages() {
            if let Some(msg) = self.correlator.receive_message(msg) {
                self.forward(Event::Message(msg));
            }
        }
    }
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("correlator", &self.correlator)
            .field("view", &self.membership.load().view)
            .finish()
    }
}
