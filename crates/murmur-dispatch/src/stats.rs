//! # stats 模块说明
//!
//! ## 角色定位（Why）
//! - 门面的准入与观测决策依赖六个调用计数（同步/异步 × 单播/多播/任播）；
//!   热路径上只做无锁原子自增；
//! - 扩展统计（按目的地的同步往返耗时）默认关闭，开启与否通过一次布尔
//!   检查决定，互斥锁只在开启后才会被触碰。

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use murmur_core::Address;
use parking_lot::Mutex;

/// 一次调用的投递形态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcScope {
    /// 点对点单播。
    Unicast,
    /// 集群广播。
    Multicast,
    /// 成员子集任播。
    Anycast,
}

#[derive(Clone, Copy, Debug, Default)]
struct DestTiming {
    total: Duration,
    samples: u64,
}

/// 分发门面的调用计数器。
#[derive(Debug, Default)]
pub struct RpcStats {
    sync_unicasts: AtomicU64,
    async_unicasts: AtomicU64,
    sync_multicasts: AtomicU64,
    async_multicasts: AtomicU64,
    sync_anycasts: AtomicU64,
    async_anycasts: AtomicU64,
    extended: AtomicBool,
    per_dest: Mutex<BTreeMap<Address, DestTiming>>,
}

impl RpcStats {
    /// 构造全零计数器，扩展统计关闭。
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次调用。
    pub fn record_call(&self, sync: bool, scope: RpcScope) {
        let counter = match (sync, scope) {
            (true, RpcScope::Unicast) => &self.sync_unicasts,
            (false, RpcScope::Unicast) => &self.async_unicasts,
            (true, RpcScope::Multicast) => &self.sync_multicasts,
            (false, RpcScope::Multicast) => &self.async_multicasts,
            (true, RpcScope::Anycast) => &self.sync_anycasts,
            (false, RpcScope::Anycast) => &self.async_anycasts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次同步调用对各目的地的往返耗时；扩展统计关闭时为空操作。
    pub fn record_round_trip<'a>(
        &self,
        dests: impl IntoIterator<Item = &'a Address>,
        elapsed: Duration,
    ) {
        if !self.extended() {
            return;
        }
        let mut per_dest = self.per_dest.lock();
        for dest in dests {
            let timing = per_dest.entry(dest.clone()).or_default();
            timing.total += elapsed;
            timing.samples += 1;
        }
    }

    /// 扩展统计是否开启。
    pub fn extended(&self) -> bool {
        self.extended.load(Ordering::Acquire)
    }

    /// 开关扩展统计。
    pub fn set_extended(&self, enabled: bool) {
        self.extended.store(enabled, Ordering::Release);
    }

    /// 同步单播计数。
    pub fn sync_unicasts(&self) -> u64 {
        self.sync_unicasts.load(Ordering::Relaxed)
    }

    /// 异步单播计数。
    pub fn async_unicasts(&self) -> u64 {
        self.async_unicasts.load(Ordering::Relaxed)
    }

    /// 同步多播计数。
    pub fn sync_multicasts(&self) -> u64 {
        self.sync_multicasts.load(Ordering::Relaxed)
    }

    /// 异步多播计数。
    pub fn async_multicasts(&self) -> u64 {
        self.async_multicasts.load(Ordering::Relaxed)
    }

    /// 同步任播计数。
    pub fn sync_anycasts(&self) -> u64 {
        self.sync_anycasts.load(Ordering::Relaxed)
    }

    /// 异步任播计数。
    pub fn async_anycasts(&self) -> u64 {
        self.async_anycasts.load(Ordering::Relaxed)
    }

    /// 归零所有计数与扩展统计样本；扩展统计开关保持不变。
    pub fn reset(&self) {
        self.sync_unicasts.store(0, Ordering::Relaxed);
        self.async_unicasts.store(0, Ordering::Relaxed);
        self.sync_multicasts.store(0, Ordering::Relaxed);
        self.async_multicasts.store(0, Ordering::Relaxed);
        self.sync_anycasts.store(0, Ordering::Relaxed);
        self.async_anycasts.store(0, Ordering::Relaxed);
        self.per_dest.lock().clear();
    }

    /// 六个计数的单行文本摘要。
    pub fn summary(&self) -> String {
        format!(
            "sync unicasts: {}, async unicasts: {}, sync multicasts: {}, \
             async multicasts: {}, sync anycasts: {}, async anycasts: {}",
            self.sync_unicasts(),
            self.async_unicasts(),
            self.sync_multicasts(),
            self.async_multicasts(),
            self.sync_anycasts(),
            self.async_anycasts(),
        )
    }

    /// 按目的地址排序的耗时明细，每行一个目的地。
    pub fn print_order_by_dest(&self) -> String {
        let per_dest = self.per_dest.lock();
        let mut out = String::new();
        for (dest, timing) in per_dest.iter() {
            let avg_ms = if timing.samples == 0 {
                0.0
            } else {
                timing.total.as_secs_f64() * 1_000.0 / timing.samples as f64
            };
            out.push_str(&format!(
                "{dest}: avg {avg_ms:.2} ms over {} calls\n",
                timing.samples
            ));
        }
        out
    }
}
