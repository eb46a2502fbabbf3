//! 相关器的通用性质：编号单调、完成恰好一次、幂等取消与停机结清。

mod support;

use std::sync::Arc;

use bytes::Bytes;
use murmur_core::Address;
use murmur_dispatch::{RequestOptions, Rsp};
use support::{Cluster, EchoHandler, ManualHandler, SilentHandler, build_member};

fn payload() -> Bytes {
    Bytes::from_static(b"\x04")
}

/// 请求编号在一个相关器生命周期内唯一且严格递增。
#[tokio::test(start_paused = true)]
async fn request_ids_are_unique_and_monotone() {
    let cluster = Cluster::new();
    let (_a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    let manual = ManualHandler::new();
    let (_b_ch, _b) = build_member(&cluster, "b", manual.clone());
    cluster.install_view();

    let mut ids = Vec::new();
    for _ in 0..50 {
        let req = a
            .cast_message_with_future(
                Some(&[Address::node("b")]),
                payload(),
                RequestOptions::sync(0).with_anycast(true),
            )
            .expect("请求应成功发出");
        ids.push(req.request_id().expect("同步请求应有编号"));
    }
    for window in ids.windows(2) {
        assert!(window[0] < window[1], "编号必须严格递增：{ids:?}");
    }
    assert_eq!(a.outstanding_requests(), 50);

    a.stop();
    assert_eq!(a.outstanding_requests(), 0, "停机必须清空未决表");
}

/// 显式 done 幂等：第二次调用是空操作，等待者拿到已有的部分结果。
#[tokio::test(start_paused = true)]
async fn done_is_idempotent() {
    let cluster = Cluster::new();
    let (_a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    let (_b_ch, _b) = build_member(&cluster, "b", Arc::new(SilentHandler));
    cluster.install_view();

    let req = a
        .cast_message_with_future(None, payload(), RequestOptions::sync(0))
        .expect("多播应成功发出");
    let request_id = req.request_id().expect("同步请求应有编号");

    a.done(request_id);
    a.done(request_id);

    let rsps = req.results().await;
    assert!(rsps.value_of(&Address::node("a")).is_some(), "已到的应答保留");
    assert_eq!(rsps.get(&Address::node("b")), Some(&Rsp::NotReceived));
    assert_eq!(a.outstanding_requests(), 0);
}

/// 完成恰好一次：定格后的迟到应答不再改写结果列表。
#[tokio::test(start_paused = true)]
async fn late_responses_never_mutate_final_list() {
    let cluster = Cluster::new();
    let (_a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    let fast = ManualHandler::new();
    let slow = ManualHandler::new();
    let (_b_ch, _b) = build_member(&cluster, "b", fast.clone());
    let (_c_ch, _c) = build_member(&cluster, "c", slow.clone());
    cluster.install_view();

    let req = a
        .cast_message_with_future(
            Some(&[Address::node("b"), Address::node("c")]),
            payload(),
            RequestOptions::sync(0)
                .with_mode(murmur_dispatch::ResponseMode::GetFirst)
                .with_anycast(true),
        )
        .expect("任播应成功发出");

    fast.reply_all();
    assert!(req.is_done(), "首个值应定格 GET_FIRST 请求");
    let frozen = req.results_now();
    assert_eq!(frozen.num_received(), 1);
    assert_eq!(a.outstanding_requests(), 0, "定格即移出未决表");

    slow.reply_all();
    assert_eq!(req.results_now(), frozen, "迟到应答不得改写终值");
}

/// 停机结清：在途请求的未定论槽位落异常，等待者被唤醒而非悬挂。
#[tokio::test(start_paused = true)]
async fn stop_drains_pending_requests() {
    let cluster = Cluster::new();
    let (_a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    let (_b_ch, _b) = build_member(&cluster, "b", Arc::new(SilentHandler));
    cluster.install_view();

    let req = a
        .cast_message_with_future(
            Some(&[Address::node("b")]),
            payload(),
            RequestOptions::sync(0).with_anycast(true),
        )
        .expect("请求应成功发出");

    a.stop();
    let rsps = req.results().await;
    match rsps.get(&Address::node("b")) {
        Some(Rsp::Exception(message)) => assert!(message.contains("stopped")),
        other => panic!("停机应以异常槽位结清，实际 {other:?}"),
    }

    let err = a
        .cast_message(None, payload(), RequestOptions::sync(0))
        .await
        .expect_err("停机后的发送应被拒绝");
    assert!(matches!(err, murmur_dispatch::DispatchError::Stopped));
}

/// 发送失败同步上抛，且绝不留下孤儿收集器。
#[tokio::test(start_paused = true)]
async fn send_failure_leaves_no_orphan_collector() {
    let cluster = Cluster::new();
    let (a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    let (_b_ch, _b) = build_member(&cluster, "b", Arc::new(EchoHandler));
    cluster.install_view();

    a_ch.set_fail_sends(true);
    let err = a
        .cast_message(None, payload(), RequestOptions::sync(1_000))
        .await
        .expect_err("传输拒绝应同步上抛");
    assert!(matches!(
        err,
        murmur_dispatch::DispatchError::SendFailed(_)
    ));
    assert_eq!(a.outstanding_requests(), 0, "失败请求不得留在未决表");
}

/// 任播的两种线形：逐个单播与单条紧凑地址消息，统计都记任播。
#[tokio::test(start_paused = true)]
async fn anycast_wire_shapes_and_stats() {
    let cluster = Cluster::new();
    let (a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    let (_b_ch, _b) = build_member(&cluster, "b", Arc::new(EchoHandler));
    let (_c_ch, _c) = build_member(&cluster, "c", Arc::new(EchoHandler));
    cluster.install_view();
    let dests = [Address::node("b"), Address::node("c")];

    let before = a_ch.sent_count();
    let rsps = a
        .cast_message(
            Some(&dests),
            payload(),
            RequestOptions::sync(1_000).with_anycast(true),
        )
        .await
        .expect("任播应成功");
    assert_eq!(rsps.num_received(), 2);
    // 逐个单播：两条请求 + 两条应答。
    assert_eq!(a_ch.sent_count() - before, 2);

    let before = a_ch.sent_count();
    let rsps = a
        .cast_message(
            Some(&dests),
            payload(),
            RequestOptions::sync(1_000).with_anycast_addresses(true),
        )
        .await
        .expect("紧凑任播应成功");
    assert_eq!(rsps.num_received(), 2);
    // 紧凑地址列表：恰好一条下行请求。
    assert_eq!(a_ch.sent_count() - before, 1);

    assert_eq!(a.stats().sync_anycasts(), 2);
}

/// 扩展统计端到端：探针开启明细后，同步调用产生按目的地的耗时样本。
#[tokio::test(start_paused = true)]
async fn extended_stats_flow_through_probe() {
    let cluster = Cluster::new();
    let (_a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    let (_b_ch, _b) = build_member(&cluster, "b", Arc::new(EchoHandler));
    cluster.install_view();

    use murmur_dispatch::{DETAILS_DISABLED_HINT, ProbeHandler};
    let probe = a.probe_handler();

    let out = probe.handle_probe(&["rpcs-details"]);
    assert_eq!(out[0].1, DETAILS_DISABLED_HINT);

    probe.handle_probe(&["rpcs-enable-details"]);
    a.send_message(&Address::node("b"), payload(), RequestOptions::sync(1_000))
        .await
        .expect("单播应成功");

    let out = probe.handle_probe(&["rpcs", "rpcs-details"]);
    assert_eq!(out[0].0, "rpcs");
    assert!(out[0].1.contains("sync unicasts: 1"));
    assert!(out[1].1.contains("b: avg"), "明细应包含目的地 b 的样本");
}
