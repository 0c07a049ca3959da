mod harness;

use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_llm::MockLlm;
use harness::server::TestServer;
use serde_json::json;

#[tokio::test]
async fn execution_events_are_streamed() {
    let mock = MockLlm::start().await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("openai", &mock.base_url())
        .with_model("tutor", "openai", &["mathematics"])
        .build();
    let server = TestServer::start(config).await.unwrap();

    let mut stream = server.client().get(server.url("/v1/events")).send().await.unwrap();
    assert_eq!(stream.status(), 200);
    assert!(
        stream.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let (status, _) = server
        .post_json(
            "/v1/execute",
            &json!({"request": {"use_case": "mathematics", "problem": "1 + 1"}}),
        )
        .await;
    assert_eq!(status, 200);

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        let mut text = String::new();
        while !text.contains("event: execution_succeeded") {
            let chunk = stream.chunk().await.unwrap().expect("stream ended early");
            text.push_str(&String::from_utf8_lossy(&chunk));
        }
        text
    })
    .await
    .expect("events arrive in time");

    assert!(received.contains("event: route_selected"));
    assert!(received.contains("event: attempt_started"));
    assert!(received.contains("event: outcome_recorded"));
    assert!(received.contains(r#""model_id":"tutor""#));
}
