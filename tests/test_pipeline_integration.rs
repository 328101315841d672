//! Integration tests for the MQTT → buffer → WebSocket pipeline
//!
//! The MQTT side is replaced by a plain payload channel; the WebSocket side
//! by a hub subscriber, which receives exactly the frames a dashboard would.

#[cfg(test)]
mod pipeline_integration_tests {
    use scrapflow::aggregator_core::{lock_buffer, AggregationBuffer, Payload};
    use scrapflow::config::BroadcastMode;
    use scrapflow::pipeline::start_ingestion;
    use scrapflow::server::{serve, AggregateSink, AppState, BroadcastHub};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::{broadcast, mpsc, oneshot};

    fn reading(machine: &str, index: i32, value: f64) -> Payload {
        Payload::new()
            .with("machineId", machine)
            .with("scrapIndex", index)
            .with("value", value)
    }

    async fn next_frame(frames: &mut broadcast::Receiver<String>) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .expect("frame within timeout")
            .expect("hub open");
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_three_readings_reach_dashboard_as_running_aggregate() {
        let (tx, rx) = mpsc::channel::<Payload>(100);
        let buffer = Arc::new(Mutex::new(AggregationBuffer::new(60)));
        let hub = Arc::new(BroadcastHub::default());
        let mut frames = hub.subscribe();

        let sink: Arc<dyn AggregateSink> = hub.clone();
        let ingestion = tokio::spawn(start_ingestion(
            rx,
            buffer.clone(),
            sink,
            BroadcastMode::EveryMessage,
        ));

        for value in [2.0, 4.0, 6.0] {
            tx.send(reading("A1", 1, value)).await.unwrap();
        }

        let mut last = Value::Null;
        for expected_count in 1..=3 {
            last = next_frame(&mut frames).await;
            assert_eq!(last["messageCount"], expected_count);
        }

        assert_eq!(last["machineId"], "A1");
        assert_eq!(last["scrapIndex"], 1);
        assert_eq!(last["sumLast60s"], 12.0);
        assert_eq!(last["avgLast60s"], 4.0);
        assert!(last["timestamp"].as_str().unwrap().ends_with('Z'));

        drop(tx);
        let stats = ingestion.await.unwrap();
        assert_eq!(stats.stored, 3);
    }

    #[tokio::test]
    async fn test_snapshot_frames_are_ordered_by_machine_then_index() {
        let (tx, rx) = mpsc::channel::<Payload>(100);
        let buffer = Arc::new(Mutex::new(AggregationBuffer::new(60)));
        let hub = Arc::new(BroadcastHub::default());

        // Load the buffer before anyone listens, then watch only the final flush
        tx.send(reading("B1", 1, 1.0)).await.unwrap();
        tx.send(
            Payload::new()
                .with("maschinenId", "A1")
                .with("scrapeIndex", 2)
                .with("wert", 3.5),
        )
        .await
        .unwrap();
        tx.send(reading("A1", 1, 2.0)).await.unwrap();
        drop(tx);

        let sink: Arc<dyn AggregateSink> = hub.clone();
        let ingestion = tokio::spawn(start_ingestion(
            rx,
            buffer.clone(),
            sink,
            BroadcastMode::Periodic(Duration::from_secs(3600)),
        ));
        let mut frames = hub.subscribe();
        ingestion.await.unwrap();

        let mut keys = Vec::new();
        while let Ok(text) = frames.try_recv() {
            let frame: Value = serde_json::from_str(&text).unwrap();
            keys.push((
                frame["machineId"].as_str().unwrap().to_string(),
                frame["scrapIndex"].as_i64().unwrap(),
            ));
        }

        // The final flush is the last three frames
        let tail: Vec<_> = keys.iter().rev().take(3).rev().cloned().collect();
        assert_eq!(
            tail,
            vec![
                ("A1".to_string(), 1),
                ("A1".to_string(), 2),
                ("B1".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_expired_readings_never_reach_dashboard() {
        let (tx, rx) = mpsc::channel::<Payload>(100);
        let buffer = Arc::new(Mutex::new(AggregationBuffer::new(60)));
        let hub = Arc::new(BroadcastHub::default());
        let mut frames = hub.subscribe();

        let sink: Arc<dyn AggregateSink> = hub.clone();
        let ingestion = tokio::spawn(start_ingestion(
            rx,
            buffer.clone(),
            sink,
            BroadcastMode::EveryMessage,
        ));

        tx.send(reading("A1", 1, 100.0).with("timestamp", "2000-01-01T00:00:00Z"))
            .await
            .unwrap();
        tx.send(reading("A1", 1, 5.0)).await.unwrap();
        drop(tx);
        ingestion.await.unwrap();

        let frame = next_frame(&mut frames).await;
        assert_eq!(frame["sumLast60s"], 5.0);
        assert_eq!(frame["messageCount"], 1);
        assert_eq!(lock_buffer(&buffer).len(), 1);
    }

    #[tokio::test]
    async fn test_server_reports_health_and_shuts_down_gracefully() {
        let buffer = Arc::new(Mutex::new(AggregationBuffer::new(30)));
        {
            let mut guard = lock_buffer(&buffer);
            guard.add(&reading("C1", 3, 1.0)).unwrap();
        }

        let state = AppState {
            hub: Arc::new(BroadcastHub::default()),
            buffer,
            frontend_dir: tempfile::tempdir().unwrap().path().join("missing"),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state, async move {
            let _ = stop_rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        let health: Value = serde_json::from_str(body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["buffered_readings"], 1);
        assert_eq!(health["window_seconds"], 30);

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
