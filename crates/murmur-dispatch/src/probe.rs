//! # probe 模块说明
//!
//! ## 角色定位（Why）
//! - 向运维工具暴露只读的「键 → 文本」诊断面；具体线上格式由外围工具决定，
//!   核心只保证同一次探查内按请求顺序输出。

use std::sync::Arc;

use crate::stats::RpcStats;

/// `rpcs-details` 在扩展统计关闭时返回的字面提示。
pub const DETAILS_DISABLED_HINT: &str =
    "<details not enabled: use rpcs-enable-details to enable>";

/// 诊断探针的处理契约。
pub trait ProbeHandler: Send + Sync + 'static {
    /// 本处理器支持的全部键。
    fn supported_keys(&self) -> &'static [&'static str];

    /// 处理一次探查，按入参顺序返回「键 → 文本」对；未知键被忽略。
    fn handle_probe(&self, keys: &[&str]) -> Vec<(String, String)>;
}

/// RPC 统计的探针处理器。
///
/// # 契约说明（What）
/// - `rpcs`：六计数摘要；
/// - `rpcs-reset`：归零计数；
/// - `rpcs-enable-details` / `rpcs-disable-details`：开关扩展统计；
/// - `rpcs-details`：按目的地的耗时明细，未开启时返回
///   [`DETAILS_DISABLED_HINT`] 字面文本。
pub struct RpcStatsProbe {
    stats: Arc<RpcStats>,
}

impl RpcStatsProbe {
    /// 绑定一份统计实例。
    pub fn new(stats: Arc<RpcStats>) -> Self {
        Self { stats }
    }
}

impl ProbeHandler for RpcStatsProbe {
    fn supported_keys(&self) -> &'static [&'static str] {
        &[
            "rpcs",
            "rpcs-reset",
            "rpcs-enable-details",
            "rpcs-disable-details",
            "rpcs-details",
        ]
    }

    fn handle_probe(&self, keys: &[&str]) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match *key {
                "rpcs" => self.stats.summary(),
                "rpcs-reset" => {
                    self.stats.reset();
                    "reset".to_string()
                }
                "rpcs-enable-details" => {
                    self.stats.set_extended(true);
                    "enabled".to_string()
                }
                "rpcs-disable-details" => {
                    self.stats.set_extended(false);
                    "disabled".to_string()
                }
                "rpcs-details" => {
                    if self.stats.extended() {
                        self.stats.print_order_by_dest()
                    } else {
                        DETAILS_DISABLED_HINT.to_string()
                    }
                }
                _ => continue,
            };
            out.push(((*key).to_string(), value));
        }
        out
    }
}
