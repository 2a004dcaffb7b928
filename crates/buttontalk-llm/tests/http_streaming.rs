//! Providers against a throwaway local HTTP server.

use buttontalk_core::{ConversationTurn, LanguageModel, LanguageModelError, Role};
use buttontalk_llm::{Ollama, OpenAiCompatible};
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one canned response and hand back the raw request.
async fn serve_once(status: &'static str, content_type: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let head = format!(
            "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\nconnection: close\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });
    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0_u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + length {
                return text;
            }
        }
        if n == 0 {
            return text;
        }
    }
}

fn turns() -> Vec<ConversationTurn> {
    vec![
        ConversationTurn {
            role: Role::System,
            content: "Answer short.".to_string(),
            index: 0,
        },
        ConversationTurn {
            role: Role::User,
            content: "what is two plus two".to_string(),
            index: 1,
        },
    ]
}

async fn collect(model: &dyn LanguageModel) -> Vec<Result<String, String>> {
    model
        .stream(&turns(), 0.7)
        .await
        .unwrap()
        .map(|r| r.map_err(|e| e.to_string()))
        .collect()
        .await
}

fn sse(deltas: &[&str]) -> String {
    let mut body = String::from(": connected\n\n");
    body.push_str("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
    for delta in deltas {
        let chunk = serde_json::json!({"choices": [{"delta": {"content": delta}}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body
}

#[tokio::test]
async fn openai_stream_yields_deltas_until_done() {
    let mut body = sse(&["Four", ". That's", " basic math."]);
    body.push_str("data: [DONE]\n\n");
    body.push_str("data: {\"choices\":[{\"delta\":{\"content\":\"after done\"}}]}\n\n");
    let (url, server) = serve_once("200 OK", "text/event-stream", body).await;

    let model = OpenAiCompatible::new(reqwest::Client::new(), format!("{url}/v1"), "test-key", "gpt-test");
    let tokens = collect(&model).await;

    assert_eq!(
        tokens,
        vec![
            Ok("Four".to_string()),
            Ok(". That's".to_string()),
            Ok(" basic math.".to_string()),
        ]
    );

    let request = server.await.unwrap();
    let lower = request.to_ascii_lowercase();
    assert!(request.starts_with("POST /v1/chat/completions"));
    assert!(lower.contains("authorization: bearer test-key"));
    let body: serde_json::Value =
        serde_json::from_str(&request[request.find("\r\n\r\n").unwrap() + 4..]).unwrap();
    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "what is two plus two");
}

#[tokio::test]
async fn openai_stream_cut_short_ends_without_error() {
    let (url, _server) = serve_once("200 OK", "text/event-stream", sse(&["Four."])).await;
    let model = OpenAiCompatible::new(reqwest::Client::new(), url, "k", "m");

    assert_eq!(collect(&model).await, vec![Ok("Four.".to_string())]);
}

#[tokio::test]
async fn openai_error_payload_mid_stream_is_an_error_item() {
    let mut body = sse(&["Four."]);
    body.push_str("data: {\"error\":{\"message\":\"overloaded\"}}\n\n");
    let (url, _server) = serve_once("200 OK", "text/event-stream", body).await;
    let model = OpenAiCompatible::new(reqwest::Client::new(), url, "k", "m");

    let tokens = collect(&model).await;
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0], Ok("Four.".to_string()));
    assert!(tokens[1].as_ref().is_err_and(|e| e.contains("overloaded")));
}

#[tokio::test]
async fn rejected_request_fails_to_open() {
    let (url, _server) = serve_once(
        "401 Unauthorized",
        "application/json",
        r#"{"error":{"message":"bad key"}}"#.to_string(),
    )
    .await;
    let model = OpenAiCompatible::new(reqwest::Client::new(), url, "wrong", "m");

    let Err(err) = model.stream(&turns(), 0.7).await else {
        panic!("expected the request to be rejected");
    };
    assert!(matches!(&err, LanguageModelError::Request(m) if m.contains("401") && m.contains("bad key")));
}

#[tokio::test]
async fn unreachable_server_fails_to_open() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let model = Ollama::new(reqwest::Client::new(), format!("http://{addr}"), "gemma3:1b");

    assert!(matches!(
        model.stream(&turns(), 0.7).await,
        Err(LanguageModelError::Request(_))
    ));
}

#[tokio::test]
async fn ollama_stream_yields_message_content() {
    let lines = [
        r#"{"model":"gemma3:1b","message":{"role":"assistant","content":"Four"},"done":false}"#,
        r#"{"model":"gemma3:1b","message":{"role":"assistant","content":"."},"done":false}"#,
        r#"{"model":"gemma3:1b","message":{"role":"assistant","content":""},"done":false}"#,
        r#"{"model":"gemma3:1b","message":{"role":"assistant","content":""},"done":true}"#,
    ];
    let body = lines.join("\n") + "\n";
    let (url, server) = serve_once("200 OK", "application/x-ndjson", body).await;

    let model = Ollama::new(reqwest::Client::new(), url, "gemma3:1b");
    assert_eq!(
        collect(&model).await,
        vec![Ok("Four".to_string()), Ok(".".to_string())]
    );

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/chat"));
    let body: serde_json::Value =
        serde_json::from_str(&request[request.find("\r\n\r\n").unwrap() + 4..]).unwrap();
    assert_eq!(body["options"]["temperature"].as_f64().map(|t| (t * 10.0).round()), Some(7.0));
    assert_eq!(body["messages"][0]["role"], "system");
}
