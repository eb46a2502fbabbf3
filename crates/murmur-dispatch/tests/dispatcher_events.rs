//! 门面的事件路由：批次投递、应用侧转交与通道监听器。

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use murmur_core::{
    Address, CoreError, Destination, Event, Message, MessageBatch, RequestHeader, codes,
};
use murmur_dispatch::{ChannelListener, RequestOptions};
use support::{Cluster, CollectingUpHandler, EchoHandler, ManualHandler, build_member,
    build_member_with_app};

fn payload() -> Bytes {
    Bytes::from_static(b"\x05")
}

/// 攒批上行：一批应答逐条路由到各自的收集器，两个请求都定格。
#[tokio::test(start_paused = true)]
async fn message_batch_routes_each_response() {
    let cluster = Cluster::new();
    let (a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    let manual = ManualHandler::new();
    let (_b_ch, _b) = build_member(&cluster, "b", manual.clone());
    cluster.install_view();

    let dests = [Address::node("b")];
    let opts = RequestOptions::sync(0).with_anycast(true);
    let first = a
        .cast_message_with_future(Some(&dests), payload(), opts.clone())
        .expect("第一条请求应成功发出");
    let second = a
        .cast_message_with_future(Some(&dests), payload(), opts)
        .expect("第二条请求应成功发出");
    assert_eq!(manual.pending_count(), 2);

    // 模拟传输层把两条应答攒成一批向上投递。
    let batch = MessageBatch::new(
        Some(Address::node("b")),
        vec![first, second]
            .iter()
            .map(|req| {
                let id = req.request_id().expect("同步请求应有编号");
                let mut msg = Message::new(Destination::Single(Address::node("a")), payload())
                    .with_header(RequestHeader::response(id, 0));
                msg.set_src(Address::node("b"));
                msg
            })
            .collect(),
    );
    a_ch.up_handler().up_batch(batch);

    assert_eq!(a.outstanding_requests(), 0, "批内应答应逐条完成两个请求");
}

/// 非相关器事件（Block/Unblock、无头消息）原样转交应用侧处理器。
#[tokio::test(start_paused = true)]
async fn non_correlator_events_are_forwarded() {
    let cluster = Cluster::new();
    let app = CollectingUpHandler::new();
    let (a_ch, a) = build_member_with_app(&cluster, "a", Arc::new(EchoHandler), app.clone());
    let (_b_ch, _b) = build_member(&cluster, "b", Arc::new(EchoHandler));
    cluster.install_view();
    let _ = app.drain(); // 丢掉装配期的视图事件。

    let handler = a_ch.up_handler();
    handler.up(Event::Block);
    let mut plain = Message::new(Destination::Single(Address::node("a")), payload());
    plain.set_src(Address::node("b"));
    handler.up(Event::Message(plain));
    handler.up(Event::Unblock);

    let events = app.drain();
    assert_eq!(events.len(), 3, "Block、无头消息与 Unblock 都应转交应用");
    assert!(matches!(events[0], Event::Block));
    assert!(matches!(events[1], Event::Message(_)));
    assert!(matches!(events[2], Event::Unblock));

    // 请求/应答流量自留：一次回显调用不会出现在应用侧。
    a.send_message(&Address::node("b"), payload(), RequestOptions::sync(1_000))
        .await
        .expect("单播应成功");
    assert!(app.drain().is_empty(), "相关器流量不得转交应用");
}

/// 通道监听器：写时复制集合按序通知，失败回调被吞掉不影响后继。
#[tokio::test(start_paused = true)]
async fn channel_listeners_swallow_failures() {
    struct Counting {
        connected: AtomicU64,
    }
    impl ChannelListener for Counting {
        fn channel_connected(&self) -> Result<(), CoreError> {
            self.connected.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }
    struct Failing;
    impl ChannelListener for Failing {
        fn channel_connected(&self) -> Result<(), CoreError> {
            Err(CoreError::new(codes::CHANNEL_SEND_FAILED, "listener boom"))
        }
    }

    let cluster = Cluster::new();
    let (_a_ch, a) = build_member(&cluster, "a", Arc::new(EchoHandler));
    cluster.install_view();

    let counting = Arc::new(Counting {
        connected: AtomicU64::new(0),
    });
    let failing: Arc<dyn ChannelListener> = Arc::new(Failing);
    a.add_channel_listener(Arc::clone(&failing));
    a.add_channel_listener(Arc::clone(&counting) as Arc<dyn ChannelListener>);

    a.notify_channel_connected();
    assert_eq!(
        counting.connected.load(Ordering::Relaxed),
        1,
        "失败监听器不得阻断后继通知"
    );

    a.remove_channel_listener(&failing);
    a.notify_channel_connected();
    assert_eq!(counting.connected.load(Ordering::Relaxed), 2);
}
