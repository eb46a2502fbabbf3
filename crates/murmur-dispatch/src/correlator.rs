//! # correlator 模块说明
//!
//! ## 角色定位（Why）
//! - [`RequestCorrelator`] 把应答匹配回未决请求：为出站请求分配单调递增的
//!   编号、把请求/应答写入通道、把入站消息与视图/怀疑事件路由到对应的
//!   收集器，并代表远端调用方执行本地请求处理器；
//! - 未决表是「请求编号 → 收集器」的并发映射：请求发出时登记，完成或显式
//!   取消时移除，完成后的迟到应答因查不到表项而被自然丢弃。
//!
//! ## 并发契约（What）
//! - 发送、应答、视图事件在不同线程上并发到达；表项的增删只发生在本模块，
//!   槽位级别的变更由收集器自身的互斥锁守护；
//! - 不跨通道发送持有任何分片守卫，通道回环投递不会造成自死锁。
//!
//! ## 设计取舍（Trade-offs）
//! - 本实现是通道上唯一的相关器消费者：关联头 `corr_id` 不匹配的流量被
//!   丢弃并打点，而不是转交某个注册表。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use murmur_core::{
    Address, Channel, CoreError, Destination, HeaderKind, Message, RequestHeader, View, codes,
};
use tracing::{debug, trace, warn};

use crate::collector::ResponseCollector;
use crate::options::RequestOptions;
use crate::response::Rsp;

/// 入站请求的处理契约。
///
/// # 契约说明（What）
/// - `on_request` 在传输投递线程上执行；同步处理器就地调用
///   [`Responder::reply`] 后返回，异步处理器把 [`Responder`] 移入后台任务
///   稍后在任意线程上完成；
/// - 返回 `Err` 且尚未应答时，相关器代为发送异常应答，保证发起方不悬挂。
pub trait RequestHandler: Send + Sync + 'static {
    /// 处理一条入站请求。
    fn on_request(&self, msg: Message, responder: Responder) -> Result<(), CoreError>;
}

/// 入站请求的一次性应答句柄。
///
/// # 设计背景（Why）
/// - 异步分发不需要回调注册表：处理器拿走句柄，在任何线程、任何时刻完成
///   即可，应答消息会带着原请求编号送回发起方；
/// - 幂等保护：重复 `reply` 是空操作，确保「恰好一次」的线上应答。
#[derive(Clone)]
pub struct Responder {
    inner: Arc<ResponderInner>,
}

struct ResponderInner {
    channel: Arc<dyn Channel>,
    corr_id: u16,
    request_id: u64,
    reply_to: Option<Address>,
    rsp_expected: bool,
    replied: AtomicBool,
}

impl Responder {
    fn new(
        channel: Arc<dyn Channel>,
        corr_id: u16,
        request_id: u64,
        reply_to: Option<Address>,
        rsp_expected: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ResponderInner {
                channel,
                corr_id,
                request_id,
                reply_to,
                rsp_expected,
                replied: AtomicBool::new(false),
            }),
        }
    }

    /// 发起方是否期待应答；`GET_NONE` 请求为 `false`。
    pub fn expects_response(&self) -> bool {
        self.inner.rsp_expected
    }

    /// 回送处理结果：`Ok` 走正常应答，`Err` 走异常应答。
    ///
    /// - **后置条件**：至多发出一条应答消息；不期待应答或重复调用时为
    ///   空操作并返回 `Ok(())`。
    pub fn reply(&self, result: Result<Bytes, CoreError>) -> Result<(), CoreError> {
        if !self.inner.rsp_expected {
            trace!(
                request_id = self.inner.request_id,
                "sender does not expect a response, dropping reply"
            );
            return Ok(());
        }
        if self.inner.replied.swap(true, Ordering::AcqRel) {
            trace!(
                request_id = self.inner.request_id,
                "duplicate reply suppressed"
            );
            return Ok(());
        }
        let Some(reply_to) = &self.inner.reply_to else {
            warn!(
                request_id = self.inner.request_id,
                "request carries no source address, cannot reply"
            );
            return Ok(());
        };
        let (header, payload) = match result {
            Ok(bytes) => (
                RequestHeader::response(self.inner.request_id, self.inner.corr_id),
                bytes,
            ),
            Err(err) => (
                RequestHeader::exception(self.inner.request_id, self.inner.corr_id),
                Bytes::from(err.to_string()),
            ),
        };
        self.inner.channel.send(
            Message::new(Destination::Single(reply_to.clone()), payload).with_header(header),
        )
    }
}

/// 请求相关器：未决表的唯一拥有者。
pub struct RequestCorrelator {
    channel: Arc<dyn Channel>,
    corr_id: u16,
    handler: Option<Arc<dyn RequestHandler>>,
    next_request_id: AtomicU64,
    table: DashMap<u64, Arc<ResponseCollector>>,
    running: AtomicBool,
}

impl RequestCorrelator {
    /// 构造相关器；请求处理器在构造期定型，之后只读。
    pub fn new(
        channel: Arc<dyn Channel>,
        corr_id: u16,
        handler: Option<Arc<dyn RequestHandler>>,
    ) -> Self {
        Self {
            channel,
            corr_id,
            handler,
            next_request_id: AtomicU64::new(1),
            table: DashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    /// 开始收发请求。
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// 停机：结清所有在途请求，等待者以异常槽位被唤醒，不会悬挂。
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let pending: Vec<u64> = self.table.iter().map(|entry| *entry.key()).collect();
        for request_id in pending {
            if let Some((_, collector)) = self.table.remove(&request_id) {
                collector.fail_remaining("correlator stopped");
                debug!(request_id, "drained pending request on stop");
            }
        }
    }

    /// 是否处于运行态。
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 相关器编号。
    pub fn corr_id(&self) -> u16 {
        self.corr_id
    }

    /// 未决请求数量。
    pub fn outstanding(&self) -> usize {
        self.table.len()
    }

    /// 发出一条请求。
    ///
    /// # 契约说明（What）
    /// - **输入**：过滤后的目的地列表（非空）、不透明负载、调用选项与
    ///   门面折算好的绝对截止时间；
    /// - **返回**：期待应答时返回已登记的收集器；`GET_NONE` 返回 `None`；
    /// - **后置条件**：发送失败时收集器以异常槽位定格并立即移出未决表，
    ///   绝不留下孤儿表项。
    pub fn send_request(
        &self,
        dests: &[Address],
        payload: Bytes,
        opts: &RequestOptions,
        deadline: Option<Instant>,
    ) -> Result<Option<Arc<ResponseCollector>>, CoreError> {
        if !self.is_running() {
            return Err(CoreError::new(
                codes::DISPATCH_STOPPED,
                "correlator is stopped",
            ));
        }
        if !self.channel.is_connected() {
            return Err(CoreError::new(
                codes::CHANNEL_NOT_CONNECTED,
                "channel is disconnected",
            ));
        }
        let rsp_expected = opts.is_sync();
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let collector = rsp_expected.then(|| {
            Arc::new(ResponseCollector::new(
                request_id,
                dests.to_vec(),
                opts.mode(),
                opts.rsp_filter().cloned(),
                deadline,
            ))
        });
        if let Some(collector) = &collector {
            self.table.insert(request_id, Arc::clone(collector));
        }
        let header = RequestHeader::request(request_id, rsp_expected, self.corr_id);
        if let Err(err) = self.ship(dests, payload, header, opts) {
            if let Some(collector) = &collector {
                self.table.remove(&request_id);
                collector.fail_remaining(&err.to_string());
            }
            return Err(err);
        }
        trace!(request_id, dests = dests.len(), "request shipped");
        Ok(collector)
    }

    fn ship(
        &self,
        dests: &[Address],
        payload: Bytes,
        header: RequestHeader,
        opts: &RequestOptions,
    ) -> Result<(), CoreError> {
        if opts.use_anycast_addresses() {
            let msg = Message::new(Destination::Anycast(dests.to_vec()), payload)
                .with_flags(opts.flags())
                .with_transient_flags(opts.transient_flags())
                .with_header(header);
            return self.channel.send(msg);
        }
        if dests.len() > 1 && !opts.anycast() {
            let msg = Message::new(Destination::Broadcast, payload)
                .with_flags(opts.flags())
                .with_transient_flags(opts.transient_flags())
                .with_header(header);
            return self.channel.send(msg);
        }
        // 任播或单目的地：逐个单播。
        for dest in dests {
            let msg = Message::new(Destination::Single(dest.clone()), payload.clone())
                .with_flags(opts.flags())
                .with_transient_flags(opts.transient_flags())
                .with_header(header);
            self.channel.send(msg)?;
        }
        Ok(())
    }

    /// 路由一条入站消息。
    ///
    /// - **返回值**：`None` 表示消息已被相关器消费；`Some(msg)` 表示消息
    ///   不带关联头，应由门面转交应用。
    pub fn receive_message(&self, msg: Message) -> Option<Message> {
        let Some(header) = msg.header().copied() else {
            return Some(msg);
        };
        if header.corr_id != self.corr_id {
            trace!(
                corr_id = header.corr_id,
                own = self.corr_id,
                "message for foreign correlator dropped"
            );
            return None;
        }
        if !self.is_running() {
            trace!(
                request_id = header.request_id,
                "correlator not running, message dropped"
            );
            return None;
        }
        match header.kind {
            HeaderKind::Req => self.dispatch_request(msg, header),
            HeaderKind::Rsp | HeaderKind::ExceptionRsp => self.route_response(msg, header),
        }
        None
    }

    fn dispatch_request(&self, msg: Message, header: RequestHeader) {
        let responder = Responder::new(
            Arc::clone(&self.channel),
            self.corr_id,
            header.request_id,
            msg.src().cloned(),
            header.rsp_expected,
        );
        let Some(handler) = &self.handler else {
            warn!(
                request_id = header.request_id,
                "no request handler installed, rejecting request"
            );
            let refusal = CoreError::new(
                codes::DISPATCH_REMOTE_FAILURE,
                "no request handler installed",
            );
            if let Err(err) = responder.reply(Err(refusal)) {
                warn!(error = %err, "failed to send handler-missing response");
            }
            return;
        };
        // 处理器同步失败且尚未应答时，代为回送异常应答。
        let fallback = responder.clone();
        if let Err(err) = handler.on_request(msg, responder) {
            if let Err(send_err) = fallback.reply(Err(err)) {
                warn!(error = %send_err, "failed to send exception response");
            }
        }
    }

    fn route_response(&self, msg: Message, header: RequestHeader) {
        let Some(sender) = msg.src().cloned() else {
            warn!(
                request_id = header.request_id,
                "response without source address dropped"
            );
            return;
        };
        let Some(entry) = self.table.get(&header.request_id) else {
            trace!(
                request_id = header.request_id,
                "late or unknown response dropped"
            );
            return;
        };
        let collector = Arc::clone(entry.value());
        drop(entry); // 不跨收集器锁持有分片守卫。
        let rsp = if header.kind == HeaderKind::ExceptionRsp {
            Rsp::Exception(String::from_utf8_lossy(msg.payload()).into_owned())
        } else {
            Rsp::Value(msg.payload().clone())
        };
        if collector.receive(&sender, rsp) {
            self.table.remove(&header.request_id);
        }
    }

    /// 把新视图作用于所有在途收集器；调用前门面必须已替换成员视图。
    pub fn receive_view(&self, view: &View) {
        self.table.retain(|_, collector| !collector.view_change(view));
    }

    /// 把怀疑信号作用于所有在途收集器。
    pub fn receive_suspect(&self, addr: &Address) {
        self.table.retain(|_, collector| !collector.suspect(addr));
    }

    /// 把站点不可达信号作用于所有在途收集器。
    pub fn receive_site_unreachable(&self, addr: &Address) {
        self.table.retain(|_, collector| !collector.unreachable(addr));
    }

    /// 调用方放弃请求：移出未决表并以现有结果唤醒等待者；幂等。
    pub fn done(&self, request_id: u64) {
        if let Some((_, collector)) = self.table.remove(&request_id) {
            collector.cancel();
            trace!(request_id, "request cancelled by caller");
        }
    }
}

impl std::fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("corr_id", &self.corr_id)
            .field("outstanding", &self.table.len())
            .field("running", &self.is_running())
            .finish()
    }
}
