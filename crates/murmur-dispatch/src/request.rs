//! # request 模块说明
//!
//! ## 角色定位（Why）
//! - [`GroupRequest`] / [`UnicastRequest`] 是收集器之上的薄包装：请求已经
//!   发出，句柄负责等待定格、兑现截止时间，并把结果折算成调用方期望的
//!   形态（结果列表或单个值）；
//! - 截止时间在句柄处兑现：等待路径把完成信号与定时器并联，定时器先到
//!   则结清收集器并带走已到的部分结果。这意味着未被轮询的句柄不会产生
//!   后台定时任务。

use std::time::Instant;

use bytes::Bytes;
use murmur_core::{Address, BoxFuture};
use std::sync::Arc;

use crate::collector::ResponseCollector;
use crate::correlator::RequestCorrelator;
use crate::error::DispatchError;
use crate::response::{Rsp, RspList};
use crate::stats::RpcStats;

/// 群组调用的结果句柄。
///
/// # 契约说明（What）
/// - `results().await`（或直接 `.await`）阻塞到完成谓词满足、截止时间到达
///   或请求被显式取消，返回定格的结果列表；
/// - `GET_NONE` 调用与空目的集的哨兵句柄立即就绪，返回空列表；
/// - 同步调用完成时，若扩展统计开启，为每个预期目的地记录一次往返耗时。
pub struct GroupRequest {
    collector: Option<Arc<ResponseCollector>>,
    correlator: Option<Arc<RequestCorrelator>>,
    stats: Option<Arc<RpcStats>>,
    started: Instant,
    sync: bool,
}

impl GroupRequest {
    pub(crate) fn new(
        collector: Option<Arc<ResponseCollector>>,
        correlator: Arc<RequestCorrelator>,
        stats: Arc<RpcStats>,
        sync: bool,
    ) -> Self {
        Self {
            collector,
            correlator: Some(correlator),
            stats: Some(stats),
            started: Instant::now(),
            sync,
        }
    }

    /// 空结果哨兵：不触网、立即就绪。
    pub(crate) fn completed_empty() -> Self {
        Self {
            collector: None,
            correlator: None,
            stats: None,
            started: Instant::now(),
            sync: false,
        }
    }

    /// 相关器分配的请求编号；哨兵句柄没有编号。
    pub fn request_id(&self) -> Option<u64> {
        self.collector.as_ref().map(|c| c.request_id())
    }

    /// 是否已定格。
    pub fn is_done(&self) -> bool {
        self.collector.as_ref().is_none_or(|c| c.is_completed())
    }

    /// 当前结果快照；定格前是部分结果，定格后即终值。
    pub fn results_now(&self) -> RspList {
        self.collector
            .as_ref()
            .map_or_else(RspList::empty, |c| c.results_now())
    }

    /// 等待定格并取走结果列表。
    pub async fn results(self) -> RspList {
        let Some(collector) = &self.collector else {
            return RspList::empty();
        };
        let list = match collector.deadline() {
            None => collector.completed().await,
            Some(deadline) => {
                tokio::select! {
                    list = collector.completed() => list,
                    _ = tokio::time::sleep_until(deadline.into()) => {
                        // 截止：结清收集器，带走已到的部分结果。
                        match &self.correlator {
                            Some(correlator) => correlator.done(collector.request_id()),
                            None => {
                                collector.cancel();
                            }
                        }
                        collector.results_now()
                    }
                }
            }
        };
        if self.sync
            && let Some(stats) = &self.stats
        {
            stats.record_round_trip(list.addresses(), self.started.elapsed());
        }
        list
    }
}

impl IntoFuture for GroupRequest {
    type Output = RspList;
    type IntoFuture = BoxFuture<'static, RspList>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.results())
    }
}

impl std::fmt::Debug for GroupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRequest")
            .field("request_id", &self.request_id())
            .field("done", &self.is_done())
            .finish()
    }
}

/// 单播调用的结果句柄：恰好一个预期应答者。
///
/// # 契约说明（What）
/// - 正常应答解析为 `Ok(Some(value))`；`GET_NONE` 调用解析为 `Ok(None)`；
/// - 异常应答、怀疑、不可达与截止分别映射为对应的 [`DispatchError`] 变体，
///   这是群组调用与单播调用在超时语义上的唯一分歧：前者返回部分结果，
///   后者抛出超时错误。
pub struct UnicastRequest {
    target: Address,
    timeout_ms: u64,
    request: GroupRequest,
}

impl UnicastRequest {
    pub(crate) fn new(target: Address, timeout_ms: u64, request: GroupRequest) -> Self {
        Self {
            target,
            timeout_ms,
            request,
        }
    }

    /// 目标地址。
    pub fn target(&self) -> &Address {
        &self.target
    }

    /// 相关器分配的请求编号；`GET_NONE` 调用没有编号。
    pub fn request_id(&self) -> Option<u64> {
        self.request.request_id()
    }

    /// 是否已定格。
    pub fn is_done(&self) -> bool {
        self.request.is_done()
    }

    /// 等待定格并折算为单值结果。
    pub async fn result(self) -> Result<Option<Bytes>, DispatchError> {
        if self.request.collector.is_none() {
            // GET_NONE：发出即完成，没有值可等。
            return Ok(None);
        }
        let target = self.target.clone();
        let request_id = self.request.request_id().unwrap_or_default();
        let timeout_ms = self.timeout_ms;
        let list = self.request.results().await;
        match list.get(&target) {
            Some(Rsp::Value(bytes)) => Ok(Some(bytes.clone())),
            Some(Rsp::Exception(message)) => Err(DispatchError::Remote {
                message: message.clone(),
            }),
            Some(Rsp::Suspected) => Err(DispatchError::Suspected { peer: target }),
            Some(Rsp::Unreachable) => Err(DispatchError::Unreachable { peer: target }),
            Some(Rsp::NotReceived) | None => Err(DispatchError::Timeout {
                request_id,
                timeout_ms,
            }),
        }
    }
}

impl IntoFuture for UnicastRequest {
    type Output = Result<Option<Bytes>, DispatchError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.result())
    }
}

impl std::fmt::Debug for UnicastRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnicastRequest")
            .field("target", &self.target)
            .field("request_id", &self.request_id())
            .field("done", &self.is_done())
            .finish()
    }
}
