/// Full MCP sessions over an in-memory pipe, against mock payment and
/// generation services.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use creditgate_bridge::{build_registry, BridgeConfig, McpServer};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLAN: &str = "did:nv:plan-e2e";
const AGENT: &str = "did:nv:agent-e2e";

struct Backend {
    server: MockServer,
}

impl Backend {
    async fn start(balance: u64, token: Option<&str>) -> Self {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/api/v1/payments/plans/{}/balance", PLAN)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balance": balance})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/assets/{}/ddo", AGENT)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"metadata": {"minCreditsRequired": "1"}})),
            )
            .mount(&server)
            .await;

        let mut access = json!({"baseUri": server.uri()});
        if let Some(token) = token {
            access["accessToken"] = json!(token);
        }
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/agents/{}/access-config", AGENT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(access))
            .mount(&server)
            .await;

        Self { server }
    }

    fn config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.payments.base_url = Some(self.server.uri());
        config.payments.api_key = "sk-e2e".to_string();
        config.plan_did = PLAN.to_string();
        config.agent_did = AGENT.to_string();
        config.server_name = "creditgate-e2e".to_string();
        config
    }

    async fn image_pipeline(&self, bytes: usize, delay: Duration) {
        let uri = format!("{}/files/out.jpg", self.server.uri());
        Mock::given(method("POST"))
            .and(path("/text2image"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"imageUrl": uri}))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/out.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; bytes]))
            .mount(&self.server)
            .await;
    }
}

/// Feed `frames` to a fresh server, close input, and collect every reply
async fn session(config: &BridgeConfig, frames: &[Value], raw: &[&str]) -> Vec<Value> {
    let registry = build_registry(config).await.unwrap();
    let server = Arc::new(McpServer::new(registry, config.server_name.clone()));

    let (mut client_in, server_in) = tokio::io::duplex(1 << 20);
    let (server_out, client_out) = tokio::io::duplex(1 << 20);
    let serving = tokio::spawn(server.serve(server_in, server_out));

    for frame in frames {
        let mut line = serde_json::to_vec(frame).unwrap();
        line.push(b'\n');
        client_in.write_all(&line).await.unwrap();
    }
    for line in raw {
        client_in.write_all(line.as_bytes()).await.unwrap();
        client_in.write_all(b"\n").await.unwrap();
    }
    drop(client_in);

    let mut replies = Vec::new();
    let mut lines = BufReader::new(client_out).lines();
    while let Some(line) = tokio::time::timeout(Duration::from_secs(10), lines.next_line())
        .await
        .expect("session stalled")
        .unwrap()
    {
        replies.push(serde_json::from_str(&line).unwrap());
    }

    serving.await.unwrap().unwrap();
    replies
}

fn by_id(replies: &[Value]) -> HashMap<String, Value> {
    replies
        .iter()
        .map(|r| (r["id"].to_string(), r.clone()))
        .collect()
}

fn call(id: u64, tool: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": tool, "arguments": arguments}
    })
}

#[tokio::test]
async fn handshake_listing_and_paid_call() {
    let backend = Backend::start(10, Some("tok")).await;
    backend.image_pipeline(2048, Duration::ZERO).await;

    let replies = session(
        &backend.config(),
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"protocolVersion": "2025-03-26", "capabilities": {},
                              "clientInfo": {"name": "e2e", "version": "0"}}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            call(3, "text2image", json!({"prompt": "a lighthouse"})),
            json!({"jsonrpc": "2.0", "id": 4, "method": "prompts/list"}),
        ],
        &["this is not json"],
    )
    .await;

    assert_eq!(replies.len(), 5, "notification must not be answered");
    let replies = by_id(&replies);

    assert_eq!(replies["1"]["result"]["protocolVersion"], json!("2025-03-26"));
    assert_eq!(replies["1"]["result"]["serverInfo"]["name"], json!("creditgate-e2e"));

    let tools: Vec<&str> = replies["2"]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tools, vec!["image2image", "purchase_plan", "text2image", "text2video"]);

    let result = &replies["3"]["result"];
    assert_eq!(result["isError"], json!(false));
    assert_eq!(result["content"][0]["type"], json!("image"));
    assert_eq!(result["content"][0]["mimeType"], json!("image/jpeg"));
    assert_eq!(result["metadata"]["sizeBytes"], json!(2048));

    assert_eq!(replies["4"]["error"]["code"], json!(-32601));
    assert_eq!(replies["null"]["error"]["code"], json!(-32700));
}

#[tokio::test]
async fn empty_plan_answers_with_purchase_prompt() {
    let backend = Backend::start(0, Some("tok")).await;
    Mock::given(method("POST"))
        .and(path("/text2image"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend.server)
        .await;

    let replies = session(
        &backend.config(),
        &[call(1, "text2image", json!({"prompt": "a lighthouse"}))],
        &[],
    )
    .await;

    let result = &replies[0]["result"];
    assert_eq!(result["isError"], json!(false));
    assert_eq!(result["metadata"]["needsPurchase"], json!(true));
    assert_eq!(result["metadata"]["planDid"], json!(PLAN));
}

#[tokio::test]
async fn missing_grant_token_is_an_internal_error() {
    let backend = Backend::start(10, None).await;

    let replies = session(
        &backend.config(),
        &[call(1, "text2image", json!({"prompt": "a lighthouse"}))],
        &[],
    )
    .await;

    let error = &replies[0]["error"];
    assert_eq!(error["code"], json!(-32603));
    assert_eq!(error["data"]["code"], json!("UNAUTHORIZED"));
}

#[tokio::test]
async fn bad_arguments_and_unknown_tools_are_invalid_params() {
    let backend = Backend::start(10, Some("tok")).await;

    let replies = session(
        &backend.config(),
        &[
            call(1, "text2image", json!({"prompt": ""})),
            call(2, "text2music", json!({"prompt": "jazz"})),
        ],
        &[],
    )
    .await;
    let replies = by_id(&replies);

    assert_eq!(replies["1"]["error"]["code"], json!(-32602));
    assert_eq!(replies["2"]["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn slow_call_does_not_block_a_fast_one() {
    let backend = Backend::start(10, Some("tok")).await;
    backend.image_pipeline(16, Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(path("/text2video"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"url": format!("{}/files/out.jpg", backend.server.uri())}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&backend.server)
        .await;

    let replies = session(
        &backend.config(),
        &[
            call(1, "text2video", json!({"prompt": "slow"})),
            call(2, "text2image", json!({"prompt": "fast"})),
        ],
        &[],
    )
    .await;

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["id"], json!(2));
    assert_eq!(replies[1]["id"], json!(1));
}
