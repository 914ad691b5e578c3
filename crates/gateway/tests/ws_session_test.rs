use base64::{Engine as _, engine::general_purpose::STANDARD};
use engine::{Detection, DetectionEngine, EngineError};
use futures_util::{SinkExt, StreamExt};
use gateway::dispatch::{DispatchConfig, DispatchHandle};
use gateway::routes;
use gateway::state::AppState;
use image::RgbImage;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message as WsMessage;

const PACING_INTERVAL: Duration = Duration::from_millis(100);

/// Echoes the frame's width into the detection so responses can be
/// matched back to the frame that produced them.
struct WidthEchoEngine;

impl DetectionEngine for WidthEchoEngine {
    fn infer(
        &self,
        image: &RgbImage,
        _confidence_threshold: f32,
    ) -> Result<Vec<Detection>, EngineError> {
        let w = image.width() as f32;
        Ok(vec![Detection {
            x1: w,
            y1: 0.0,
            x2: w + 1.0,
            y2: 1.0,
            confidence: 0.9,
            class_id: 0,
        }])
    }
}

/// Blocks each `infer` call until the test releases one token.
struct GatedEngine {
    gate: Mutex<mpsc::Receiver<()>>,
}

impl GatedEngine {
    fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Arc::new(Self {
                gate: Mutex::new(rx),
            }),
            tx,
        )
    }
}

impl DetectionEngine for GatedEngine {
    fn infer(
        &self,
        _image: &RgbImage,
        _confidence_threshold: f32,
    ) -> Result<Vec<Detection>, EngineError> {
        self.gate
            .lock()
            .unwrap()
            .recv()
            .map_err(|e| EngineError::Inference(e.to_string()))?;
        Ok(Vec::new())
    }
}

fn streaming_state(engine: Arc<dyn DetectionEngine>, queue_depth: usize) -> AppState {
    let dispatch = DispatchHandle::spawn(
        engine,
        DispatchConfig {
            queue_depth,
            infer_timeout: Duration::from_secs(5),
            confidence_threshold: 0.25,
        },
    );
    AppState::new(dispatch, PACING_INTERVAL)
}

async fn spawn_server(state: AppState) -> SocketAddr {
    let app = routes::router(state, None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn base64_frame(width: u32) -> String {
    let img = RgbImage::from_pixel(width, 4, image::Rgb([64, 64, 64]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    STANDARD.encode(bytes.into_inner())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn five_frames_yield_five_paced_responses_in_order() {
    let addr = spawn_server(streaming_state(Arc::new(WidthEchoEngine), 8)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("handshake should succeed");

    let widths: Vec<u32> = vec![10, 11, 12, 13, 14];
    for &width in &widths {
        ws.send(WsMessage::Text(base64_frame(width)))
            .await
            .unwrap();
    }

    let mut received = Vec::new();
    let mut arrival_times = Vec::new();
    while received.len() < widths.len() {
        let msg = ws.next().await.expect("stream open").expect("no error");
        if let WsMessage::Text(body) = msg {
            arrival_times.push(Instant::now());
            let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
            let arr = parsed.as_array().expect("detections are a bare array");
            assert_eq!(arr.len(), 1);
            received.push(arr[0]["x1"].as_i64().unwrap() as u32);
        }
    }

    assert_eq!(
        received, widths,
        "responses must come back in submission order"
    );

    // Dispatches are separated by at least the pacing interval; the
    // bound is checked with a little slack for local delivery jitter.
    for pair in arrival_times.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= PACING_INTERVAL - Duration::from_millis(20),
            "responses only {:?} apart, pacing interval is {:?}",
            gap,
            PACING_INTERVAL
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_frame_gets_error_payload_then_close() {
    let addr = spawn_server(streaming_state(Arc::new(WidthEchoEngine), 8)).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();

    ws.send(WsMessage::Text("!!!not@base64@at@all".to_string()))
        .await
        .unwrap();

    let msg = ws.next().await.expect("stream open").expect("no error");
    let WsMessage::Text(body) = msg else {
        panic!("expected an error payload, got {:?}", msg);
    };
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["error"]["kind"], "decode");

    // The session closes; the decoder failure never reaches the engine.
    let closed = matches!(
        ws.next().await,
        None | Some(Ok(WsMessage::Close(_))) | Some(Err(_))
    );
    assert!(closed, "connection must close after a decode failure");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overloaded_frame_is_dropped_but_stream_survives() {
    let (engine, gate) = GatedEngine::new();
    let state = streaming_state(engine, 1);
    let dispatch = state.dispatch.clone();
    let addr = spawn_server(state).await;

    // Occupy the single worker slot and fill the 1-deep queue from the
    // side so the streaming frame hits the ceiling.
    let occupants: Vec<_> = (0..2)
        .map(|i| {
            let dispatch = dispatch.clone();
            tokio::spawn(async move { dispatch.submit(RgbImage::new(4, 4), 100 + i).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    ws.send(WsMessage::Text(base64_frame(10))).await.unwrap();

    let msg = ws.next().await.expect("stream open").expect("no error");
    let WsMessage::Text(body) = msg else {
        panic!("expected an overload notification, got {:?}", msg);
    };
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["error"]["kind"], "overloaded");

    // Drain the backlog; the same connection keeps streaming.
    gate.send(()).unwrap();
    gate.send(()).unwrap();
    for occupant in occupants {
        occupant.await.unwrap().expect("queued requests complete");
    }

    gate.send(()).unwrap();
    ws.send(WsMessage::Text(base64_frame(11))).await.unwrap();
    let msg = ws.next().await.expect("stream open").expect("no error");
    let WsMessage::Text(body) = msg else {
        panic!("expected a detection payload, got {:?}", msg);
    };
    assert_eq!(body, "[]", "stream must still serve frames after a drop");
}
