//! Reasoning client integration tests
//!
//! Tests for the chat completions tool loop against a mock endpoint:
//! - Plain text replies
//! - Tool calls routed to the owning backend
//! - Round limits, upstream failures and cancellation

use std::sync::Arc;
use std::time::{Duration, Instant};

use opswatch::llm::{OpenAiChatClient, ReasoningClient};
use opswatch::mcp::{aggregate, ArgValue, BoundTool, ToolArgs, ToolClient};
use opswatch::testing::FakeToolClient;
use opswatch::AppError;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::common::constants::TEST_LLM_API_KEY;
use crate::mocks::MockLlmGateway;

fn client_for(gateway: &MockLlmGateway, max_rounds: usize) -> OpenAiChatClient {
    OpenAiChatClient::with_endpoint(
        reqwest::Client::new(),
        gateway.base_url(),
        Some(TEST_LLM_API_KEY.to_string()),
        "gpt-4o",
        max_rounds,
    )
}

async fn tools_of(backend: &Arc<FakeToolClient>) -> Vec<BoundTool> {
    let clients: Vec<Arc<dyn ToolClient>> = vec![backend.clone()];
    aggregate(&clients, &CancellationToken::new()).await.unwrap()
}

// =============================================================================
// Text replies
// =============================================================================

#[tokio::test]
async fn test_text_reply_is_returned() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_text_reply("ROOT CAUSE: bad deploy").await;

    let session = client_for(&gateway, 4).create_session("You are an SRE.", "Investigator");
    let reply = session
        .run("CPU spiked", &[], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.as_deref(), Some("ROOT CAUSE: bad deploy"));

    let bodies = gateway.request_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0]["messages"],
        json!([
            {"role": "system", "content": "You are an SRE."},
            {"role": "user", "content": "CPU spiked"}
        ])
    );
    assert_eq!(bodies[0]["model"], "gpt-4o");
    assert!(bodies[0].get("tools").is_none(), "no tools should be advertised");
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_text_reply("done").await;

    let session = client_for(&gateway, 4).create_session("instruction", "test");
    session
        .run("hello", &[], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        gateway.authorization_headers().await,
        vec![format!("Bearer {}", TEST_LLM_API_KEY)]
    );
}

#[tokio::test]
async fn test_empty_reply_is_none() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_empty_reply().await;

    let session = client_for(&gateway, 4).create_session("instruction", "test");
    let reply = session
        .run("hello", &[], &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply, None);
}

// =============================================================================
// Tool calls
// =============================================================================

#[tokio::test]
async fn test_tools_are_advertised_as_functions() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_text_reply("done").await;
    let backend = Arc::new(FakeToolClient::new("azure").with_tools(&["monitor.query", "resource_list"]));
    let tools = tools_of(&backend).await;

    let session = client_for(&gateway, 4).create_session("instruction", "test");
    session
        .run("hello", &tools, &CancellationToken::new())
        .await
        .unwrap();

    let bodies = gateway.request_bodies().await;
    let names: Vec<&str> = bodies[0]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["function"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["monitor_query", "resource_list"]);
    assert_eq!(bodies[0]["tools"][0]["type"], "function");
}

#[tokio::test]
async fn test_tool_call_is_routed_and_answered() {
    let gateway = MockLlmGateway::start().await;
    gateway
        .mock_tool_call_then_reply(
            "monitor_query",
            json!({"query": "cpu", "top": 5}),
            "ROOT CAUSE: worker count doubled",
        )
        .await;
    let backend = Arc::new(FakeToolClient::new("azure").with_tools(&["monitor.query"]));
    let tools = tools_of(&backend).await;

    let session = client_for(&gateway, 4).create_session("instruction", "Investigator");
    let reply = session
        .run("CPU spiked", &tools, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.as_deref(), Some("ROOT CAUSE: worker count doubled"));

    // The sanitized function name maps back to the original tool name.
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "monitor.query");
    let mut expected = ToolArgs::new();
    expected.insert("query".to_string(), ArgValue::from("cpu"));
    expected.insert("top".to_string(), ArgValue::from(5i64));
    assert_eq!(calls[0].1, expected);

    let bodies = gateway.request_bodies().await;
    assert_eq!(bodies.len(), 2);
    let messages = bodies[1]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
    assert_eq!(
        messages[3],
        json!({"role": "tool", "content": "monitor.query ok", "tool_call_id": "call_1"})
    );
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_model() {
    let gateway = MockLlmGateway::start().await;
    gateway
        .mock_tool_call_then_reply("delete_everything", json!({}), "understood")
        .await;
    let backend = Arc::new(FakeToolClient::new("github").with_tools(&["list_commits"]));
    let tools = tools_of(&backend).await;

    let session = client_for(&gateway, 4).create_session("instruction", "test");
    let reply = session
        .run("hello", &tools, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.as_deref(), Some("understood"));
    assert!(backend.calls().is_empty());

    let bodies = gateway.request_bodies().await;
    assert_eq!(
        bodies[1]["messages"][3]["content"],
        "Error: unknown tool 'delete_everything'"
    );
}

#[tokio::test]
async fn test_tool_transport_error_is_reported_to_model() {
    let gateway = MockLlmGateway::start().await;
    gateway
        .mock_tool_call_then_reply("list_commits", json!({}), "could not read commits")
        .await;
    let backend = Arc::new(
        FakeToolClient::new("github")
            .with_tools(&["list_commits"])
            .with_transport_error("list_commits", "github server exited"),
    );
    let tools = tools_of(&backend).await;

    let session = client_for(&gateway, 4).create_session("instruction", "test");
    let reply = session
        .run("hello", &tools, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.as_deref(), Some("could not read commits"));
    let bodies = gateway.request_bodies().await;
    assert_eq!(
        bodies[1]["messages"][3]["content"],
        "Error: Tool transport error: github server exited"
    );
}

#[tokio::test]
async fn test_round_limit_withholds_tools_on_last_request() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_endless_tool_calls("list_commits").await;
    let backend = Arc::new(FakeToolClient::new("github").with_tools(&["list_commits"]));
    let tools = tools_of(&backend).await;

    let session = client_for(&gateway, 2).create_session("instruction", "test");
    let reply = session
        .run("hello", &tools, &CancellationToken::new())
        .await
        .unwrap();

    // The final response still asks for tools, but carries no text.
    assert_eq!(reply, None);
    assert_eq!(backend.calls().len(), 2);

    let bodies = gateway.request_bodies().await;
    assert_eq!(bodies.len(), 3);
    assert!(bodies[0].get("tools").is_some());
    assert!(bodies[1].get("tools").is_some());
    assert!(bodies[2].get("tools").is_none());
}

#[tokio::test]
async fn test_zero_tool_rounds_sends_one_request_without_tools() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_text_reply("answer without tools").await;
    let backend = Arc::new(FakeToolClient::new("github").with_tools(&["list_commits"]));
    let tools = tools_of(&backend).await;

    let session = client_for(&gateway, 0).create_session("instruction", "test");
    let reply = session
        .run("hello", &tools, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(reply.as_deref(), Some("answer without tools"));
    let bodies = gateway.request_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].get("tools").is_none());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_rate_limit_is_upstream_error() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_rate_limited().await;

    let session = client_for(&gateway, 4).create_session("instruction", "test");
    let err = session
        .run("hello", &[], &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        AppError::UpstreamError(message) => {
            assert!(message.contains("429"), "unexpected message: {}", message);
            assert!(message.contains("Rate limit exceeded"));
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_interrupts_pending_request() {
    let gateway = MockLlmGateway::start().await;
    gateway.mock_slow_reply(Duration::from_secs(10)).await;

    let session = client_for(&gateway, 4).create_session("instruction", "test");
    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let started = Instant::now();
    let err = session.run("hello", &[], &cancel).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, AppError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}
