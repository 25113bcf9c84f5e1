use std::sync::Arc;

use reqwest::Client;
use serde_json::json;
use titanic_chat::agent::Agent;
use titanic_chat::agent::prompt::build_system_prompt;
use titanic_chat::chart::ChartKind;
use titanic_chat::chat::{ChatRequest, ChatService, ConversationTurn, FailureKind};
use titanic_chat::data::DatasetSource;
use titanic_chat::http::{HttpClient, HttpDebugConfig};
use titanic_chat::llm::{AnyProvider, ProviderKind, ProviderSettings};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/passengers.csv");

fn service_for(kind: ProviderKind, server: &MockServer, model: &str) -> ChatService {
    let data = Arc::new(DatasetSource::new(FIXTURE));
    let facts = data.get().expect("fixture dataset").facts();
    let provider = AnyProvider::new(
        kind,
        HttpClient::new(Client::new(), HttpDebugConfig::disabled()),
        ProviderSettings {
            api_key: Some("test-key".to_string()),
            model: model.to_string(),
            base_url: server.uri(),
            temperature: 0.1,
        },
    )
    .expect("provider");
    ChatService::new(Agent::new(provider, build_system_prompt(Some(facts))), data)
}

fn groq_tool_call(name: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": "{}"}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    }))
}

fn groq_text(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    }))
}

async fn mount_groq_round_trip(server: &MockServer, tool: &str, answer: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(groq_text(answer))
        .with_priority(1)
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(groq_tool_call(tool))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn male_percentage_question_answers_with_text_only() {
    let server = MockServer::start().await;
    mount_groq_round_trip(
        &server,
        "get_male_percentage",
        "In this dataset, 40.00% of passengers were male.",
    )
    .await;
    let service = service_for(ProviderKind::Groq, &server, "llama-test");

    let response = service
        .answer(ChatRequest::new("What percentage of passengers were male?"))
        .await
        .expect("answer");

    assert!(response.answer.contains("40.00%"), "{}", response.answer);
    assert_eq!(response.chart_base64, None);
    assert_eq!(response.chart_type, None);
    assert_eq!(response.error, None);

    let requests = server.received_requests().await.expect("recorded requests");
    let second = String::from_utf8_lossy(&requests[1].body).to_string();
    assert!(second.contains("40.00%"), "tool result not replayed: {second}");
}

#[tokio::test]
async fn age_histogram_question_returns_chart_outside_the_answer() {
    let server = MockServer::start().await;
    mount_groq_round_trip(
        &server,
        "age_histogram",
        "Here is the age distribution. Most passengers in this dataset were adults.",
    )
    .await;
    let service = service_for(ProviderKind::Groq, &server, "llama-test");

    let response = service
        .answer(ChatRequest::new("Show me a histogram of passenger ages"))
        .await
        .expect("answer");

    assert_eq!(response.chart_type, Some(ChartKind::AgeHistogram));
    let encoded = response.chart_base64.as_deref().expect("chart data");
    assert!(encoded.starts_with("iVBORw0KGgo"));
    assert!(!response.answer.is_empty());
    assert!(!response.answer.contains("iVBORw0KGgo"));

    let requests = server.received_requests().await.expect("recorded requests");
    let second = String::from_utf8_lossy(&requests[1].body).to_string();
    assert!(second.contains("Age distribution histogram generated"));
    assert!(!second.contains("iVBORw0KGgo"), "image bytes leaked to the model");
}

#[tokio::test]
async fn history_is_replayed_without_blank_turns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(groq_text("Among the 15 records, women all survived."))
        .expect(1)
        .mount(&server)
        .await;
    let service = service_for(ProviderKind::Groq, &server, "llama-test");

    let response = service
        .answer(ChatRequest {
            question: "And what about their survival?".to_string(),
            history: vec![
                ConversationTurn::user("How many women were aboard?"),
                ConversationTurn::assistant("In this dataset, 9 passengers were female."),
                ConversationTurn::assistant(""),
            ],
        })
        .await
        .expect("answer");

    assert_eq!(response.answer, "Among the 15 records, women all survived.");
    let requests = server.received_requests().await.expect("recorded requests");
    let body: serde_json::Value = requests[0].body_json().expect("json body");
    let messages = body["messages"].as_array().expect("messages");
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "How many women were aboard?");
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[3]["content"], "And what about their survival?");
}

#[tokio::test]
async fn provider_error_becomes_model_failure_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
        .mount(&server)
        .await;
    let service = service_for(ProviderKind::Groq, &server, "llama-test");

    let response = service
        .answer(ChatRequest::new("How many survived?"))
        .await
        .expect("answer");

    assert_eq!(response.error, Some(FailureKind::ModelFailure));
    assert_eq!(response.chart_base64, None);
}

#[tokio::test]
async fn gemini_provider_runs_the_same_tool_loop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("functionResponse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "finishReason": "STOP",
                "content": {"role": "model", "parts": [{"text": "In this dataset, 60.00% survived."}]}
            }]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "finishReason": "STOP",
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "survival_pie_chart", "args": {}}}
                ]}
            }]
        })))
        .mount(&server)
        .await;
    let service = service_for(ProviderKind::Gemini, &server, "gemini-test");

    let response = service
        .answer(ChatRequest::new("Show the survival split as a pie chart"))
        .await
        .expect("answer");

    assert_eq!(response.answer, "In this dataset, 60.00% survived.");
    assert_eq!(response.chart_type, Some(ChartKind::SurvivalPieChart));
}
