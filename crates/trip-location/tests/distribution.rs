//! Publish to fan-out through a broker that loops messages back to the engine.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{TimeZone, Utc};
use geometry::Coordinate;
use pretty_assertions::assert_eq;
use realtime::{Broker, ConnectionId, Message, TripId};
use tokio::sync::mpsc::{self, Receiver, UnboundedReceiver, UnboundedSender};
use trip_location::{EngineConfig, LocationEngine, LocationReport, ServerMessage};

#[derive(Debug, Clone)]
struct Loopback {
    tx: UnboundedSender<Message>,
}

impl Broker for Loopback {
    async fn send(&self, message: &Message) -> anyhow::Result<()> {
        self.tx.send(message.clone()).map_err(|e| anyhow!("loopback closed: {e}"))
    }
}

#[derive(Debug, Default)]
struct Unavailable;

impl Broker for Unavailable {
    async fn send(&self, _: &Message) -> anyhow::Result<()> {
        Err(anyhow!("broker unavailable"))
    }
}

fn loopback() -> (Arc<LocationEngine<Loopback>>, UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(LocationEngine::new(EngineConfig::default(), Loopback { tx })), rx)
}

// play the broker consumer: hand every queued message back to the engine
fn drain(engine: &LocationEngine<Loopback>, rx: &mut UnboundedReceiver<Message>) {
    while let Ok(message) = rx.try_recv() {
        let report: LocationReport = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(message.key(), Some(report.trip_id.key().as_str()));
        engine.on_delivered(&report);
    }
}

fn report(trip: u64, latitude: f64, longitude: f64) -> LocationReport {
    let timestamp = Utc.with_ymd_and_hms(2025, 3, 1, 7, 30, 0).unwrap();
    LocationReport::new(TripId(trip), Coordinate::from((latitude, longitude)), timestamp, "driver")
        .unwrap()
}

fn received(rx: &mut Receiver<ServerMessage>) -> Vec<LocationReport> {
    let mut reports = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let ServerMessage::LocationUpdate(report) = message {
            reports.push(report);
        }
    }
    reports
}

#[tokio::test]
async fn two_subscribers_then_one() {
    let (engine, mut queue) = loopback();
    engine.open_trip(TripId(1));

    let a = ConnectionId::new();
    let b = ConnectionId::new();
    let mut rx_a = engine.connect(a);
    let mut rx_b = engine.connect(b);
    engine.subscribe(TripId(1), a).await.unwrap();
    engine.subscribe(TripId(1), b).await.unwrap();

    let loc1 = report(1, 6.5244, 3.3792);
    engine.publish(loc1.clone()).await.unwrap();
    drain(&engine, &mut queue);

    assert_eq!(received(&mut rx_a), vec![loc1.clone()]);
    assert_eq!(received(&mut rx_b), vec![loc1]);

    engine.unsubscribe(TripId(1), a);

    let loc2 = report(1, 6.60, 3.50);
    engine.publish(loc2.clone()).await.unwrap();
    drain(&engine, &mut queue);

    assert!(received(&mut rx_a).is_empty());
    assert_eq!(received(&mut rx_b), vec![loc2]);
}

#[tokio::test]
async fn per_trip_order_is_preserved() {
    let (engine, mut queue) = loopback();
    engine.open_trip(TripId(1));
    engine.open_trip(TripId(2));

    let conn = ConnectionId::new();
    let mut rx = engine.connect(conn);
    engine.subscribe(TripId(1), conn).await.unwrap();

    let reports: Vec<LocationReport> =
        (0..20_u32).map(|i| report(1, 6.5 + f64::from(i) * 0.01, 3.4)).collect();
    for (i, r) in reports.iter().enumerate() {
        engine.publish(r.clone()).await.unwrap();
        // interleave another trip's traffic
        if i % 3 == 0 {
            engine.publish(report(2, 7.0, 3.9)).await.unwrap();
        }
    }
    drain(&engine, &mut queue);

    assert_eq!(received(&mut rx), reports);
    assert_eq!(engine.last_known(TripId(1)), reports.last().cloned());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishers_and_consumer() {
    let (engine, mut queue) = loopback();
    let trips: Vec<TripId> = (1..=4).map(TripId).collect();
    let mut receivers = Vec::new();
    for trip in &trips {
        engine.open_trip(*trip);
        let conn = ConnectionId::new();
        receivers.push((*trip, engine.connect(conn)));
        engine.subscribe(*trip, conn).await.unwrap();
    }

    let consumer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                let report: LocationReport = serde_json::from_slice(&message.payload).unwrap();
                engine.on_delivered(&report);
            }
        })
    };

    let mut publishers = Vec::new();
    for trip in trips.clone() {
        let engine = Arc::clone(&engine);
        publishers.push(tokio::spawn(async move {
            for i in 0..25_u32 {
                let r = report(trip.0, 6.0 + f64::from(i) * 0.001, 3.0);
                engine.publish(r).await.unwrap();
            }
        }));
    }
    for publisher in publishers {
        publisher.await.unwrap();
    }

    for (trip, mut rx) in receivers {
        let mut latitudes = Vec::new();
        while latitudes.len() < 25 {
            let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let ServerMessage::LocationUpdate(r) = message {
                assert_eq!(r.trip_id, trip);
                latitudes.push(r.position.latitude);
            }
        }
        let expected: Vec<f64> = (0..25_u32).map(|i| 6.0 + f64::from(i) * 0.001).collect();
        assert_eq!(latitudes, expected);
    }

    drop(engine);
    consumer.abort();
}

#[tokio::test]
async fn broker_failure_falls_back_to_direct_delivery() {
    let engine = LocationEngine::new(EngineConfig::default(), Unavailable);
    engine.open_trip(TripId(5));
    let conn = ConnectionId::new();
    let mut rx = engine.connect(conn);
    engine.subscribe(TripId(5), conn).await.unwrap();

    engine.publish(report(5, 6.6, 3.5)).await.unwrap();

    assert_eq!(received(&mut rx), vec![report(5, 6.6, 3.5)]);
}

#[tokio::test]
async fn broker_failure_without_fallback() {
    let config = EngineConfig { fallback_direct: false, ..EngineConfig::default() };
    let engine = LocationEngine::new(config, Unavailable);
    engine.open_trip(TripId(5));
    let conn = ConnectionId::new();
    let mut rx = engine.connect(conn);
    engine.subscribe(TripId(5), conn).await.unwrap();

    let err = engine.publish(report(5, 6.6, 3.5)).await.unwrap_err();

    assert_eq!(err.code(), "bad_gateway");
    assert!(err.is_transient());
    assert!(received(&mut rx).is_empty());
    // the report is still the trip's latest position
    assert_eq!(engine.last_known(TripId(5)), Some(report(5, 6.6, 3.5)));
}

#[tokio::test]
async fn closed_connection_does_not_block_others() {
    let (engine, mut queue) = loopback();
    engine.open_trip(TripId(1));

    let gone = ConnectionId::new();
    let live = ConnectionId::new();
    drop(engine.connect(gone));
    let mut rx = engine.connect(live);
    engine.subscribe(TripId(1), gone).await.unwrap();
    engine.subscribe(TripId(1), live).await.unwrap();

    engine.publish(report(1, 6.6, 3.5)).await.unwrap();
    drain(&engine, &mut queue);

    assert_eq!(received(&mut rx), vec![report(1, 6.6, 3.5)]);
}

#[tokio::test]
async fn catch_up_never_runs_ahead_of_queued_reports() {
    let (engine, mut queue) = loopback();
    engine.open_trip(TripId(1));

    engine.publish(report(1, 6.50, 3.5)).await.unwrap();
    engine.publish(report(1, 6.60, 3.5)).await.unwrap();

    let conn = ConnectionId::new();
    let mut rx = engine.connect(conn);
    engine.subscribe(TripId(1), conn).await.unwrap();
    engine.catch_up(TripId(1), conn).await;
    drain(&engine, &mut queue);

    let latitudes: Vec<f64> = received(&mut rx).iter().map(|r| r.position.latitude).collect();
    assert_eq!(latitudes, vec![6.50, 6.60]);

    // once delivered, a late joiner gets the last known location
    let late = ConnectionId::new();
    let mut late_rx = engine.connect(late);
    engine.subscribe(TripId(1), late).await.unwrap();
    assert!(engine.catch_up(TripId(1), late).await);
    assert_eq!(received(&mut late_rx), vec![report(1, 6.60, 3.5)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subscribe_racing_close_leaves_no_routing() {
    let (engine, _queue) = loopback();

    for round in 0..200_u64 {
        let trip = TripId(round);
        engine.open_trip(trip);
        let conn = ConnectionId::new();

        let subscriber = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.subscribe(trip, conn).await })
        };
        let closer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.close_trip(trip).await })
        };

        let subscribed = subscriber.await.unwrap();
        assert!(closer.await.unwrap());

        if let Err(e) = subscribed {
            assert_eq!(e.code(), "unknown_trip");
        }
        assert!(engine.registry().subscribers_of(trip).is_empty(), "round {round}");
        assert!(engine.registry().trips_of(conn).is_empty(), "round {round}");
    }
}
