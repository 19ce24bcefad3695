//! Wire-level tests for the query generator backends.
//!
//! Each test starts a throwaway HTTP server on a loopback port that answers
//! with canned responses and records what it received.

use askdb::prelude::*;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const SCHEMA: &str = "Table: employees, Column: id, Type: integer\nTable: employees, Column: name, Type: text\nTable: employees, Column: hired, Type: date";
const QUESTION: &str = "names hired before May 2022";

#[derive(Debug, Clone)]
struct Captured {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Value,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

struct Stub {
    url: String,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl Stub {
    /// Serve `responses` in order, one per connection.
    async fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut socket).await;
                captured.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self { url, requests }
    }

    fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = serde_json::from_slice(&buf[header_end..header_end + content_length]).unwrap_or(Value::Null);
    Captured {
        method,
        path,
        headers,
        body,
    }
}

/// (system, user) texts as each backend puts them on the wire.
fn openai_style_prompt(body: &Value) -> (String, String) {
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    (
        messages[0]["content"].as_str().unwrap().to_string(),
        messages[1]["content"].as_str().unwrap().to_string(),
    )
}

fn gemini_prompt(body: &Value) -> (String, String) {
    (
        body["systemInstruction"]["parts"][0]["text"].as_str().unwrap().to_string(),
        body["contents"][0]["parts"][0]["text"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_openai_returns_trimmed_completion() {
    let stub = Stub::start(vec![(
        200,
        r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"\n  SELECT name FROM employees WHERE hired < '2022-05-01';  \n"}}]}"#,
    )])
    .await;

    let generator = OpenAiGenerator::new("gpt-4")
        .with_base_url(format!("{}/v1", stub.url))
        .with_api_key("sk-test");
    let sql = generator.generate_sql_from_nl(SCHEMA, QUESTION).await.unwrap();
    assert_eq!(sql, "SELECT name FROM employees WHERE hired < '2022-05-01';");

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v1/chat/completions");
    assert_eq!(requests[0].header("authorization"), Some("Bearer sk-test"));
    assert_eq!(requests[0].body["model"], "gpt-4");
}

#[tokio::test]
async fn test_openai_auth_failure_carries_backend_message() {
    let stub = Stub::start(vec![(
        401,
        r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#,
    )])
    .await;

    let generator = OpenAiGenerator::new("gpt-4")
        .with_base_url(&stub.url)
        .with_api_key("sk-wrong");
    let err = generator.generate_sql_from_nl(SCHEMA, QUESTION).await.unwrap_err();
    match err {
        AskError::Llm { backend, message } => {
            assert_eq!(backend, "OpenAI");
            assert!(message.contains("401"));
            assert!(message.contains("Incorrect API key provided"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_ollama_returns_content_untrimmed() {
    let stub = Stub::start(vec![(
        200,
        r#"{"model":"llama3.2:latest","message":{"role":"assistant","content":"SELECT name FROM employees;\n"},"done":true}"#,
    )])
    .await;

    let generator = OllamaGenerator::default().with_host(&stub.url);
    let sql = generator.generate_sql_from_nl(SCHEMA, QUESTION).await.unwrap();
    assert_eq!(sql, "SELECT name FROM employees;\n");

    let requests = stub.requests();
    assert_eq!(requests[0].path, "/api/chat");
    assert_eq!(requests[0].body["stream"], false);
    assert!(requests[0].header("authorization").is_none());
}

#[tokio::test]
async fn test_ollama_missing_model_pulls_without_retry() {
    let stub = Stub::start(vec![
        (404, r#"{"error":"model \"llama3.2:latest\" not found, try pulling it first"}"#),
        (200, r#"{"status":"success"}"#),
    ])
    .await;

    let generator = OllamaGenerator::default().with_host(&stub.url);
    let err = generator.generate_sql_from_nl(SCHEMA, QUESTION).await.unwrap_err();
    assert!(matches!(
        err,
        AskError::ModelMissing { ref model, pulled: true } if model == "llama3.2:latest"
    ));

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "/api/chat");
    assert_eq!(requests[1].path, "/api/pull");
    assert_eq!(requests[1].body["model"], "llama3.2:latest");
}

#[tokio::test]
async fn test_ollama_failed_pull_is_reported() {
    let stub = Stub::start(vec![
        (404, r#"{"error":"model not found"}"#),
        (500, r#"{"error":"no space left on device"}"#),
    ])
    .await;

    let generator = OllamaGenerator::new("sqlcoder").with_host(&stub.url);
    let err = generator.generate_sql_from_nl(SCHEMA, QUESTION).await.unwrap_err();
    assert!(matches!(err, AskError::ModelMissing { pulled: false, .. }));
}

#[tokio::test]
async fn test_ollama_unreachable_daemon() {
    // Nothing listens on port 1.
    let generator = OllamaGenerator::default().with_host("http://127.0.0.1:1");
    let err = generator.generate_sql_from_nl(SCHEMA, QUESTION).await.unwrap_err();
    assert!(matches!(err, AskError::Llm { backend: "Ollama", .. }));
}

#[tokio::test]
async fn test_gemini_request_and_response() {
    let stub = Stub::start(vec![(
        200,
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"SELECT name FROM employees WHERE hired < '2022-05-01'"}]},"finishReason":"STOP"}]}"#,
    )])
    .await;

    let generator = GeminiGenerator::default()
        .with_base_url(&stub.url)
        .with_api_key("gm-test");
    let sql = generator.generate_sql_from_nl(SCHEMA, QUESTION).await.unwrap();
    assert_eq!(sql, "SELECT name FROM employees WHERE hired < '2022-05-01'");

    let requests = stub.requests();
    assert_eq!(requests[0].path, "/models/gemini-1.5-pro-002:generateContent");
    assert_eq!(requests[0].header("x-goog-api-key"), Some("gm-test"));
    assert_eq!(requests[0].body["generationConfig"]["temperature"], 1);
}

#[tokio::test]
async fn test_gemini_error_status() {
    let stub = Stub::start(vec![(
        400,
        r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
    )])
    .await;

    let generator = GeminiGenerator::default()
        .with_base_url(&stub.url)
        .with_api_key("bad");
    let err = generator.generate_sql_from_nl(SCHEMA, QUESTION).await.unwrap_err();
    assert!(err.to_string().contains("API key not valid"));
}

#[tokio::test]
async fn test_all_backends_put_the_same_prompt_on_the_wire() {
    let openai = Stub::start(vec![(200, r#"{"choices":[{"message":{"content":"SELECT 1"}}]}"#)]).await;
    let ollama = Stub::start(vec![(200, r#"{"message":{"role":"assistant","content":"SELECT 1"}}"#)]).await;
    let gemini = Stub::start(vec![(200, r#"{"candidates":[{"content":{"parts":[{"text":"SELECT 1"}]}}]}"#)]).await;

    let registry = ModelRegistry::new()
        .with("a", OpenAiGenerator::new("gpt-4").with_base_url(&openai.url).with_api_key("k"))
        .with("b", OllamaGenerator::default().with_host(&ollama.url))
        .with("c", GeminiGenerator::default().with_base_url(&gemini.url).with_api_key("k"));

    for label in registry.labels() {
        let sql = registry
            .get(label)
            .unwrap()
            .generate_sql_from_nl(SCHEMA, QUESTION)
            .await
            .unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    let from_openai = openai_style_prompt(&openai.requests()[0].body);
    let from_ollama = openai_style_prompt(&ollama.requests()[0].body);
    let from_gemini = gemini_prompt(&gemini.requests()[0].body);

    assert_eq!(from_openai, from_ollama);
    assert_eq!(from_openai, from_gemini);
    assert!(from_openai.1.contains(SCHEMA));
    assert!(from_openai.1.contains(QUESTION));
}
