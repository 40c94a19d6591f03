//! End-to-end message lifecycle over in-memory backends.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;

use mailrelay::queue::MemoryQueueStore;
use mailrelay::store::MemoryRecordStore;
use mailrelay::web::router;
use mailrelay::{
    AppState, Config, DeliveryWorker, Finalizer, Intervals, MailSender, Pipeline, PollLoop,
    QueueNames, TransportError, TransportPayload,
};

#[derive(Clone, Default)]
struct OutboxSender {
    fail: bool,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl MailSender for OutboxSender {
    async fn send(&self, payload: &TransportPayload) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.sent.lock().await.push(payload.message_id.clone());
        Ok(())
    }
}

fn intervals() -> Intervals {
    Intervals::new(Duration::from_millis(3000), Duration::from_millis(1000))
}

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn submit(app: &axum::Router) -> String {
    let request = Request::builder()
        .method("POST")
        .uri("/send")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"to": "a@b.com", "subject": "S", "message": "hi"}).to_string(),
        ))
        .unwrap();
    let (status, response) = call(app, request).await;
    assert_eq!(status, StatusCode::OK);
    response["result"].as_str().unwrap().to_string()
}

async fn status_of(app: &axum::Router, id: &str) -> Value {
    let request = Request::builder()
        .uri(format!("/messages/{}", id))
        .body(Body::empty())
        .unwrap();
    let (status, response) = call(app, request).await;
    assert_eq!(status, StatusCode::OK);
    response["result"].clone()
}

#[tokio::test]
async fn test_message_is_sent_and_finalized() {
    let queue = MemoryQueueStore::new();
    let records = MemoryRecordStore::new();
    let pipeline = Pipeline::new(Arc::new(queue.clone()), QueueNames::default());
    let app = router(AppState::new(
        Config::default(),
        pipeline.clone(),
        Arc::new(records.clone()),
    ));
    let sender = OutboxSender::default();

    let id = submit(&app).await;
    assert_eq!(status_of(&app, &id).await["processed"], false);

    let mut sending = PollLoop::new(
        DeliveryWorker::new(pipeline.clone(), Arc::new(sender.clone()), Duration::from_secs(1)),
        intervals(),
    );
    let mut finalizing = PollLoop::new(
        Finalizer::new(pipeline.clone(), Arc::new(records.clone())),
        intervals(),
    );

    assert_eq!(sending.tick().await, intervals().active);
    assert_eq!(queue.entries("processed").await, vec![id.clone()]);
    assert_eq!(sender.sent.lock().await.clone(), vec![id.clone()]);

    assert_eq!(finalizing.tick().await, intervals().active);
    let record = status_of(&app, &id).await;
    assert_eq!(record["processed"], true);
    assert!(record["done_at"].is_string());

    assert!(queue.entries("messages").await.is_empty());
    assert!(queue.entries("processing").await.is_empty());
    assert!(queue.entries("processed").await.is_empty());

    // Both loops go idle once drained
    assert_eq!(sending.tick().await, intervals().idle);
    assert_eq!(finalizing.tick().await, intervals().idle);
}

#[tokio::test]
async fn test_failed_send_leaves_record_unprocessed() {
    let queue = MemoryQueueStore::new();
    let records = MemoryRecordStore::new();
    let pipeline = Pipeline::new(Arc::new(queue.clone()), QueueNames::default());
    let app = router(AppState::new(
        Config::default(),
        pipeline.clone(),
        Arc::new(records.clone()),
    ));
    let sender = OutboxSender {
        fail: true,
        ..Default::default()
    };

    let id = submit(&app).await;

    let mut sending = PollLoop::new(
        DeliveryWorker::new(pipeline.clone(), Arc::new(sender), Duration::from_secs(1)),
        intervals(),
    );
    assert_eq!(sending.tick().await, intervals().idle);

    assert!(queue.entries("processing").await.is_empty());
    assert!(queue.entries("processed").await.is_empty());
    assert_eq!(status_of(&app, &id).await["processed"], false);
}
