//! # collector 模块说明
//!
//! ## 角色定位（Why）
//! - [`ResponseCollector`] 是每条未决请求的记账本：预期应答者、已落槽的
//!   应答、完成谓词与绝对截止时间。应答、怀疑、视图收缩与显式取消都汇聚
//!   到这里，由它裁决请求是否定格；
//! - 状态机只有 `Pending → Complete` 一条终态迁移，且恰好发生一次：所有
//!   等待者被唤醒后看到同一份定格的结果列表。
//!
//! ## 并发契约（What）
//! - 调用方任务与传输投递线程并发访问：槽位数据由收集器自身的互斥锁守护，
//!   完成标记额外冗余为原子布尔以支撑无锁快速路径；
//! - 唤醒在释放锁之后执行，等待者被唤醒时一定能观察到 `done == true`；
//! - 完成后到达的迟到应答一律丢弃，不再改写结果列表。
//!
//! ## 设计取舍（Trade-offs）
//! - 槽位用保序 `Vec` 而非哈希表：预期集通常只有几个到几十个成员，线性
//!   查找换来确定的迭代顺序（即发送顺序）。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::Instant;

use murmur_core::{Address, View};
use parking_lot::Mutex;

use crate::options::{ResponseMode, RspFilter};
use crate::response::{Rsp, RspList};

/// 每条未决请求的响应收集器。
pub struct ResponseCollector {
    request_id: u64,
    mode: ResponseMode,
    /// ⌊N/2⌋+1，N 为创建时的预期应答者数量。
    majority: usize,
    deadline: Option<Instant>,
    filter: Option<Arc<dyn RspFilter>>,
    /// `inner.done` 的无锁影子，供快速路径查询。
    completed: AtomicBool,
    inner: Mutex<CollectorInner>,
}

struct CollectorInner {
    slots: Vec<(Address, Rsp)>,
    done: bool,
    wakers: Vec<Waker>,
}

impl ResponseCollector {
    pub(crate) fn new(
        request_id: u64,
        expected: Vec<Address>,
        mode: ResponseMode,
        filter: Option<Arc<dyn RspFilter>>,
        deadline: Option<Instant>,
    ) -> Self {
        debug_assert!(
            mode != ResponseMode::GetNone,
            "GET_NONE 请求不登记收集器"
        );
        let majority = expected.len() / 2 + 1;
        let slots = expected
            .into_iter()
            .map(|addr| (addr, Rsp::NotReceived))
            .collect();
        Self {
            request_id,
            mode,
            majority,
            deadline,
            filter,
            completed: AtomicBool::new(false),
            inner: Mutex::new(CollectorInner {
                slots,
                done: false,
                wakers: Vec::new(),
            }),
        }
    }

    /// 相关器分配的请求编号。
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// 绝对截止时间。
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 是否已定格。
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// 当前结果快照；定格后即为终值。
    pub fn results_now(&self) -> RspList {
        RspList::new(self.inner.lock().slots.clone())
    }

    /// 预期应答者列表（发送顺序）。
    pub fn expected(&self) -> Vec<Address> {
        self.inner
            .lock()
            .slots
            .iter()
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    /// 等待定格的完成信号。
    pub fn completed(self: &Arc<Self>) -> CompletionFuture {
        CompletionFuture {
            collector: Arc::clone(self),
        }
    }

    /// 落一份来自 `sender` 的应答。
    ///
    /// # 契约说明（What）
    /// - 未知发送方（不在预期集）与已有定论的槽位直接忽略；
    /// - 过滤器拒绝的应答不落槽；`needs_more_responses` 返回 `false` 时
    ///   请求提前定格；
    /// - **返回值**：本次调用是否令收集器进入终态，调用方据此把收集器
    ///   移出未决表。
    pub(crate) fn receive(&self, sender: &Address, rsp: Rsp) -> bool {
        let mut wakers = Vec::new();
        let completed_now = {
            let mut inner = self.inner.lock();
            if inner.done {
                return false;
            }
            let Some(idx) = inner.slots.iter().position(|(addr, _)| addr == sender) else {
                return false;
            };
            if inner.slots[idx].1.is_resolved() {
                return false;
            }
            let mut accepted = true;
            let mut force_complete = false;
            if let Some(filter) = &self.filter {
                accepted = filter.is_acceptable(&rsp, sender);
                force_complete = !filter.needs_more_responses();
            }
            if accepted {
                inner.slots[idx].1 = rsp;
            }
            let done = force_complete || (accepted && self.predicate_met(&inner));
            if done {
                Self::finish(&mut inner, &self.completed, &mut wakers);
            }
            done
        };
        for waker in wakers {
            waker.wake();
        }
        completed_now
    }

    /// 把 `addr` 标记为被怀疑；重复标记是幂等的。
    pub(crate) fn suspect(&self, addr: &Address) -> bool {
        self.mark(addr, Rsp::Suspected)
    }

    /// 把 `addr` 标记为不可达。
    pub(crate) fn unreachable(&self, addr: &Address) -> bool {
        self.mark(addr, Rsp::Unreachable)
    }

    /// 应用新视图：缺席的普通成员槽位标记为怀疑，跨站点地址保留。
    pub(crate) fn view_change(&self, view: &View) -> bool {
        let mut wakers = Vec::new();
        let completed_now = {
            let mut inner = self.inner.lock();
            if inner.done {
                return false;
            }
            let mut changed = false;
            for (addr, rsp) in &mut inner.slots {
                if !rsp.is_resolved() && !addr.is_site_address() && !view.contains(addr) {
                    *rsp = Rsp::Suspected;
                    changed = true;
                }
            }
            let done = changed && self.predicate_met(&inner);
            if done {
                Self::finish(&mut inner, &self.completed, &mut wakers);
            }
            done
        };
        for waker in wakers {
            waker.wake();
        }
        completed_now
    }

    /// 立即定格，保留已到的部分结果；截止时间与显式 `done` 共用此路径。
    pub(crate) fn cancel(&self) -> bool {
        let mut wakers = Vec::new();
        let completed_now = {
            let mut inner = self.inner.lock();
            if inner.done {
                return false;
            }
            Self::finish(&mut inner, &self.completed, &mut wakers);
            true
        };
        for waker in wakers {
            waker.wake();
        }
        completed_now
    }

    /// 以失败描述结清所有未定论槽位并定格；发送失败与停机走此路径。
    pub(crate) fn fail_remaining(&self, reason: &str) -> bool {
        let mut wakers = Vec::new();
        let completed_now = {
            let mut inner = self.inner.lock();
            if inner.done {
                return false;
            }
            for (_, rsp) in &mut inner.slots {
                if !rsp.is_resolved() {
                    *rsp = Rsp::Exception(reason.to_string());
                }
            }
            Self::finish(&mut inner, &self.completed, &mut wakers);
            true
        };
        for waker in wakers {
            waker.wake();
        }
        completed_now
    }

    fn mark(&self, addr: &Address, value: Rsp) -> bool {
        let mut wakers = Vec::new();
        let completed_now = {
            let mut inner = self.inner.lock();
            if inner.done {
                return false;
            }
            let Some(idx) = inner.slots.iter().position(|(entry, _)| entry == addr) else {
                return false;
            };
            if inner.slots[idx].1.is_resolved() {
                return false;
            }
            inner.slots[idx].1 = value;
            let done = self.predicate_met(&inner);
            if done {
                Self::finish(&mut inner, &self.completed, &mut wakers);
            }
            done
        };
        for waker in wakers {
            waker.wake();
        }
        completed_now
    }

    fn predicate_met(&self, inner: &CollectorInner) -> bool {
        let total = inner.slots.len();
        let resolved = inner
            .slots
            .iter()
            .filter(|(_, rsp)| rsp.is_resolved())
            .count();
        let received = inner
            .slots
            .iter()
            .filter(|(_, rsp)| rsp.is_received())
            .count();
        match self.mode {
            ResponseMode::GetNone => true,
            // 全员被怀疑时没有值可等，同样定格。
            ResponseMode::GetFirst => received >= 1 || resolved == total,
            ResponseMode::GetMajority => resolved >= self.majority,
            ResponseMode::GetAll => resolved == total,
        }
    }

    fn finish(inner: &mut CollectorInner, completed: &AtomicBool, wakers: &mut Vec<Waker>) {
        inner.done = true;
        completed.store(true, Ordering::Release);
        wakers.append(&mut inner.wakers);
    }
}

impl std::fmt::Debug for ResponseCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ResponseCollector")
            .field("request_id", &self.request_id)
            .field("mode", &self.mode)
            .field("done", &inner.done)
            .field("slots", &inner.slots.len())
            .finish()
    }
}

/// 收集器定格时解析出终值的完成信号。
///
/// - 可被 `select!` 组合；未定格时登记 waker 并返回 `Pending`；
/// - 定格后任何一次轮询都返回同一份结果列表。
pub struct CompletionFuture {
    collector: Arc<ResponseCollector>,
}

impl std::future::Future for CompletionFuture {
    type Output = RspList;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.collector.inner.lock();
        if inner.done {
            return Poll::Ready(RspList::new(inner.slots.clone()));
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
