//! Producer → ingest adapter → hub → WebSocket subscriber, end to end.

use crate::test_utils::*;
use tokio::time::Duration;

#[tokio::test]
async fn test_readings_reach_every_subscriber_in_order() {
    let pipeline = TestPipeline::start(Duration::from_secs(1)).await;
    let mut first = pipeline.subscribe().await;
    let mut second = pipeline.subscribe().await;

    let readings: Vec<_> = (0..5).map(|seq| reading(seq % 4, seq)).collect();
    let mut producer = pipeline.producer().await;
    send_readings(&mut producer, &readings).await;

    for expected in &readings {
        assert_eq!(&next_reading(&mut first).await, expected);
    }
    for expected in &readings {
        assert_eq!(&next_reading(&mut second).await, expected);
    }
}

#[tokio::test]
async fn test_malformed_records_are_skipped_without_closing_producer() {
    let pipeline = TestPipeline::start(Duration::from_secs(1)).await;
    let mut subscriber = pipeline.subscribe().await;
    let mut producer = pipeline.producer().await;

    send_raw(&mut producer, b"{\"sensor_id\":\"sensor-0\"}\n").await;
    send_raw(&mut producer, b"this is not json\n").await;
    send_raw(
        &mut producer,
        b"{\"sensor_id\":\"sensor-0\",\"temperature_c\":20.1,\"pressure_kpa\":101.0,\"humidity_pct\":42.5}\n",
    )
    .await;

    let received = next_reading(&mut subscriber).await;
    assert_eq!(received.sensor_id, "sensor-0");
    assert_eq!(received.temperature_c, 20.1);
    assert_eq!(received.pressure_kpa, 101.0);
    assert_eq!(received.humidity_pct, 42.5);

    // Same connection keeps working after the bad records
    send_readings(&mut producer, &[reading(1, 9)]).await;
    assert_eq!(next_reading(&mut subscriber).await, reading(1, 9));
}

#[tokio::test]
async fn test_late_subscriber_gets_only_later_readings() {
    let pipeline = TestPipeline::start(Duration::from_secs(1)).await;
    let mut early = pipeline.subscribe().await;
    let mut producer = pipeline.producer().await;

    send_readings(&mut producer, &[reading(0, 0)]).await;
    assert_eq!(next_reading(&mut early).await, reading(0, 0));

    let mut late = pipeline.subscribe().await;
    send_readings(&mut producer, &[reading(0, 1)]).await;

    assert_eq!(next_reading(&mut early).await, reading(0, 1));
    assert_eq!(next_reading(&mut late).await, reading(0, 1));
}

#[tokio::test]
async fn test_departed_subscriber_does_not_affect_others() {
    let pipeline = TestPipeline::start(Duration::from_millis(200)).await;
    let mut staying = pipeline.subscribe().await;
    let mut leaving = pipeline.subscribe().await;

    leaving.close(None).await.expect("close");
    drop(leaving);
    pipeline.wait_for_subscribers(1).await;

    let mut producer = pipeline.producer().await;
    send_readings(&mut producer, &[reading(2, 0), reading(2, 1)]).await;

    assert_eq!(next_reading(&mut staying).await, reading(2, 0));
    assert_eq!(next_reading(&mut staying).await, reading(2, 1));
    assert_eq!(pipeline.hub.subscriber_count().await, 1);
}

#[tokio::test]
async fn test_per_producer_order_with_concurrent_producers() {
    let pipeline = TestPipeline::start(Duration::from_secs(1)).await;
    let mut subscriber = pipeline.subscribe().await;

    let mut producer_a = pipeline.producer().await;
    let mut producer_b = pipeline.producer().await;
    let from_a: Vec<_> = (0..10).map(|seq| reading(0, seq)).collect();
    let from_b: Vec<_> = (0..10).map(|seq| reading(1, seq)).collect();

    let (a, b) = (from_a.clone(), from_b.clone());
    tokio::join!(
        async { send_readings(&mut producer_a, &a).await },
        async { send_readings(&mut producer_b, &b).await },
    );

    let mut seen_a = Vec::new();
    let mut seen_b = Vec::new();
    for _ in 0..20 {
        let received = next_reading(&mut subscriber).await;
        if received.sensor_id == "sensor-0" {
            seen_a.push(received);
        } else {
            seen_b.push(received);
        }
    }

    assert_eq!(seen_a, from_a);
    assert_eq!(seen_b, from_b);
}

#[tokio::test]
async fn test_producer_disconnect_leaves_hub_running() {
    let pipeline = TestPipeline::start(Duration::from_secs(1)).await;
    let mut subscriber = pipeline.subscribe().await;

    let mut first = pipeline.producer().await;
    // Unterminated trailing record is never emitted
    send_raw(&mut first, b"{\"sensor_id\":\"sensor-3\",\"temp").await;
    drop(first);

    let mut second = pipeline.producer().await;
    send_readings(&mut second, &[reading(3, 4)]).await;

    assert_eq!(next_reading(&mut subscriber).await, reading(3, 4));
}
