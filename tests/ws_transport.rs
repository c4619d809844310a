//! End-to-end transport: WebSocket turns and the status endpoints.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use toolgate::agent::Orchestrator;
use toolgate::config::schema::PricingConfig;
use toolgate::http::{AppState, ConnectionManager};
use toolgate::llm::{ChatModel, EchoModel, ScriptedModel};
use toolgate::resilience::{BreakerRegistry, CircuitBreaker};
use toolgate::stream::{StreamEvent, ToolCallDelta};
use toolgate::tools::{
    commerce_registry, ImageGenerator, PriceComparer, ProductCatalog, ToolDispatcher,
};

mod common;
use common::{scenario_breaker_config, start_server};

fn state(model: Arc<dyn ChatModel>) -> AppState {
    let mut breakers = BreakerRegistry::default();
    breakers.insert(Arc::new(CircuitBreaker::new(
        "replicate_api",
        scenario_breaker_config(),
    )));
    let registry = commerce_registry(
        Arc::new(ProductCatalog::new()),
        Arc::new(ImageGenerator::unconfigured("flux")),
        Arc::new(PriceComparer::new(&PricingConfig::default())),
    )
    .unwrap();

    AppState {
        breakers: Arc::new(breakers),
        orchestrator: Arc::new(Orchestrator::new(
            model,
            ToolDispatcher::new(Arc::new(registry)),
            "sys",
        )),
        connections: ConnectionManager::new(),
    }
}

fn search_model() -> Arc<dyn ChatModel> {
    Arc::new(ScriptedModel::new(vec![
        Ok(StreamEvent::TextDelta("Searching".into())),
        Ok(StreamEvent::ToolCallDelta(ToolCallDelta::new(
            Some("call_a"),
            Some("search_products"),
            Some("{\"query\":\"lamp\"}"),
        ))),
        Ok(StreamEvent::End),
    ]))
}

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_message_turn_streams_envelopes_then_done() {
    let app = state(search_model());
    let connections = app.connections.clone();
    let (addr, shutdown) = start_server(app).await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/conn-1")).await.unwrap();
    ws.send(Message::text(
        json!({"type": "message", "content": "a lamp", "user_id": "u1"}).to_string(),
    ))
    .await
    .unwrap();

    assert_eq!(next_json(&mut ws).await, json!({"type": "text", "content": "Searching"}));
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "tool_start", "tool": "search_products", "call_id": "call_a"})
    );
    let result = next_json(&mut ws).await;
    assert_eq!(result["type"], "tool_result");
    assert_eq!(result["result"]["channel"], "products");
    assert_eq!(result["result"]["data"][0]["name"], "Premium Lamp");
    assert_eq!(next_json(&mut ws).await, json!({"type": "done"}));
    assert!(connections.contains("conn-1"));

    ws.close(None).await.unwrap();
    for _ in 0..50 {
        if connections.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(connections.is_empty());
    shutdown.trigger();
}

#[tokio::test]
async fn test_ping_and_invalid_frames() {
    let (addr, shutdown) = start_server(state(Arc::new(EchoModel::with_delay(Duration::ZERO)))).await;
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws/conn-2")).await.unwrap();

    ws.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();
    assert_eq!(next_json(&mut ws).await, json!({"type": "pong"}));

    ws.send(Message::text("not json")).await.unwrap();
    let error = next_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert!(error["error"].as_str().unwrap().starts_with("invalid message"));

    // The socket stays usable after a bad frame.
    ws.send(Message::text(r#"{"type":"message","content":"hello"}"#))
        .await
        .unwrap();
    let mut text = String::new();
    loop {
        let frame = next_json(&mut ws).await;
        match frame["type"].as_str() {
            Some("text") => text.push_str(frame["content"].as_str().unwrap()),
            Some("done") => break,
            other => panic!("unexpected frame type {other:?}"),
        }
    }
    assert_eq!(text, "Processing your request: hello...");
    shutdown.trigger();
}

#[tokio::test]
async fn test_status_endpoints() {
    let (addr, shutdown) = start_server(state(search_model())).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["services"]["breaker:replicate_api"], "closed");

    let breakers: Value = client
        .get(format!("http://{addr}/breakers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(breakers[0]["name"], "replicate_api");
    assert_eq!(breakers[0]["current_backoff_secs"], 30.0);

    let missing = client
        .get(format!("http://{addr}/breakers/stripe"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
    shutdown.trigger();
}
