// HTTP transport tests against a one-shot local server

use pretty_assertions::assert_eq;
use pytrace::config::TracerConfig;
use pytrace::tracer::assist::{connect_http, AssistStream, CancelToken, Chunk};
use pytrace::tracer::session::{RunRequest, Session};
use pytrace::tracer::translate::{HttpTranslator, Translator};
use pytrace::tracer::TranslateError;
use serde_json::Value as Json;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

/// Answer one request with `status` and `body`; the handle yields the request body
fn serve_once(status: &'static str, content_type: &'static str, body: String) -> (String, JoinHandle<Json>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local port");
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept connection");
        let request = read_body(&mut stream);
        let reply = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );
        stream.write_all(reply.as_bytes()).unwrap();
        serde_json::from_slice(&request).unwrap()
    });
    (url, handle)
}

fn read_body(stream: &mut TcpStream) -> Vec<u8> {
    let mut reader = BufReader::new(stream);
    let mut length = 0;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        if line.trim().is_empty() {
            break;
        }
        if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            length = value.trim().parse().unwrap();
        }
    }
    let mut body = vec![0; length];
    reader.read_exact(&mut body).unwrap();
    body
}

fn unused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}/v1/chat/completions", listener.local_addr().unwrap())
}

#[test]
fn test_http_translator_posts_conversion_request() {
    let answer = r#"{"choices":[{"message":{"content":"```python\nx = 1 + 1\n```"}}]}"#;
    let (url, server) = serve_once("200 OK", "application/json", answer.to_string());
    let translator = HttpTranslator::new(url, Duration::from_secs(5)).unwrap();

    let raw = translator.translate("int x = 1 + 1;", "C").unwrap();
    assert_eq!(raw, "```python\nx = 1 + 1\n```");
    let request = server.join().unwrap();
    assert_eq!(request["stream"], false);
    assert!(request["messages"][1]["content"].as_str().unwrap().contains("int x = 1 + 1;"));
}

#[test]
fn test_http_translator_reports_server_errors() {
    let (url, server) = serve_once("500 Internal Server Error", "text/plain", "model not loaded".to_string());
    let translator = HttpTranslator::new(url, Duration::from_secs(5)).unwrap();
    let err = translator.translate("int x;", "C").unwrap_err();
    server.join().unwrap();
    assert!(matches!(&err, TranslateError::Request(detail) if detail.contains("model not loaded")));
    assert!(err.to_string().starts_with("Error:"));
}

#[test]
fn test_unreachable_endpoint_is_setup_failure() {
    let translator = HttpTranslator::new(unused_endpoint(), Duration::from_secs(5)).unwrap();
    let mut session = Session::new(TracerConfig::default()).with_translator(Box::new(translator));
    let response = session.submit(RunRequest::new("int x = 1;").with_language("C"));
    assert!(response.finished);
    assert_eq!(response.trace.len(), 1);
    assert_eq!(response.trace[0].code, "Error Setup/Conversion");
    assert!(response.error.unwrap().starts_with("Error: API request failed"));
}

#[test]
fn test_translated_submission_runs_end_to_end() {
    let answer = r#"{"choices":[{"message":{"content":"Sure:\nprint(6 * 7)"}}]}"#;
    let (url, server) = serve_once("200 OK", "application/json", answer.to_string());
    let translator = HttpTranslator::new(url, Duration::from_secs(5)).unwrap();
    let mut session = Session::new(TracerConfig::default()).with_translator(Box::new(translator));
    let response = session.submit(RunRequest::new("console.log(6 * 7)").with_language("JavaScript"));
    server.join().unwrap();
    assert!(response.finished);
    assert_eq!(session.code(), Some("print(6 * 7)"));
    assert_eq!(response.trace.last().unwrap().stdout, "42\n");
}

#[test]
fn test_assistant_streams_over_http() {
    let events = "data: {\"choices\":[{\"delta\":{\"content\":\"It \"}}]}\n\n: ping - 1\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"loops.\"}}]}\n\ndata: [DONE]\n\n";
    let (url, server) = serve_once("200 OK", "text/event-stream", events.to_string());
    let chunks: Vec<Chunk> = AssistStream::open("for i in range(3): pass", "What does it do?", CancelToken::new(), |request| {
        connect_http(&url, Duration::from_secs(5), request)
    })
    .collect();

    let request = server.join().unwrap();
    assert_eq!(request["stream"], true);
    let text: String = chunks.iter().filter_map(Chunk::text).collect();
    assert_eq!(text, "It loops.");
    assert_eq!(chunks.last(), Some(&Chunk::Done));
    assert!(chunks.contains(&Chunk::KeepAlive));
}

#[test]
fn test_assistant_connection_failure_is_one_error_chunk() {
    let endpoint = unused_endpoint();
    let chunks: Vec<Chunk> = AssistStream::open("x = 1", "why?", CancelToken::new(), |request| {
        connect_http(&endpoint, Duration::from_secs(5), request)
    })
    .collect();
    assert_eq!(chunks.len(), 1);
    assert!(matches!(&chunks[0], Chunk::Error(message) if message.starts_with("LLM API request failed")));
}
