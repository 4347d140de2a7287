//! Bus, hub, and sink behavior.

use std::time::Duration;

use stategraph::event_bus::{
    ChannelSink, Event, EventBus, EventHub, MemorySink,
};

type TestEvent = Event<i64>;

#[tokio::test]
async fn hub_delivers_to_every_subscriber() {
    let hub = EventHub::<i64>::new(16);
    let mut first = hub.subscribe();
    let mut second = hub.subscribe();

    hub.publish(Event::NodeStart {
        node: "a".into(),
        step: 1,
    })
    .unwrap();

    assert_eq!(first.recv().await.unwrap().kind(), "node_start");
    assert_eq!(second.recv().await.unwrap().kind(), "node_start");
}

#[tokio::test]
async fn hub_close_terminates_subscribers_after_drain() {
    let hub = EventHub::<i64>::new(16);
    let mut stream = hub.subscribe();
    hub.publish(Event::ChainEnd { state: 7 }).unwrap();
    hub.close();

    // Buffered event still arrives, then the stream ends.
    assert!(stream.recv().await.is_some());
    assert!(stream.recv().await.is_none());
}

#[tokio::test]
async fn publish_after_close_reports_closed() {
    let hub = EventHub::<i64>::new(4);
    hub.close();
    assert!(hub.publish(Event::ChainEnd { state: 1 }).is_err());
}

#[tokio::test]
async fn publish_with_no_subscribers_is_a_no_op() {
    let hub = EventHub::<i64>::new(4);
    assert!(hub.publish(Event::ChainEnd { state: 1 }).is_ok());
    assert_eq!(hub.dropped(), 0);
}

#[tokio::test]
async fn lagged_subscribers_are_counted_as_drops() {
    let hub = EventHub::<i64>::new(2);
    let mut stream = hub.subscribe();
    for step in 0..32 {
        hub.publish(Event::NodeStart {
            node: "a".into(),
            step,
        })
        .unwrap();
    }
    // The first receive observes the gap and records it.
    let event = stream.recv().await.unwrap();
    assert!(matches!(event, Event::NodeStart { step, .. } if step >= 30));
    assert!(hub.dropped() > 0);
    assert_eq!(hub.metrics().capacity, 2);
    assert_eq!(hub.metrics().dropped, hub.dropped());
}

#[tokio::test]
async fn next_timeout_returns_none_when_idle() {
    let hub = EventHub::<i64>::new(4);
    let mut stream = hub.subscribe();
    assert!(
        stream
            .next_timeout(Duration::from_millis(10))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn memory_sink_receives_bus_events() {
    let sink: MemorySink<i64> = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    bus.start();

    let emitter = bus.emitter();
    emitter
        .emit(Event::NodeComplete {
            node: "a".into(),
            step: 1,
        })
        .unwrap();
    emitter.emit(Event::ChainEnd { state: 3 }).unwrap();

    bus.shutdown().await;
    let captured = sink.snapshot();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].kind(), "node_complete");
    assert_eq!(captured[1].kind(), "chain_end");
}

#[tokio::test]
async fn channel_sink_bridges_to_flume() {
    let (tx, rx) = flume::unbounded::<TestEvent>();
    let bus = EventBus::with_sink(ChannelSink::new(tx));
    bus.start();

    bus.emitter()
        .emit(Event::NodeStart {
            node: "n".into(),
            step: 2,
        })
        .unwrap();
    let event = rx.recv_async().await.unwrap();
    assert_eq!(event.node(), Some("n"));
    bus.shutdown().await;
}

#[tokio::test]
async fn sinks_added_after_start_still_receive_events() {
    let bus: EventBus<i64> = EventBus::new();
    bus.start();
    let sink: MemorySink<i64> = MemorySink::new();
    bus.add_sink(sink.clone());

    bus.emitter().emit(Event::ChainEnd { state: 1 }).unwrap();
    bus.shutdown().await;
    assert_eq!(sink.snapshot().len(), 1);
}
