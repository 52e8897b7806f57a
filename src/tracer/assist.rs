//! Advisory assistant stream
//!
//! Answers to a question about a snippet arrive from an upstream server-sent
//! event stream. [`AssistStream`] normalizes each upstream line into a
//! [`Chunk`] and ends after the first terminal chunk, on end of input, or
//! once its [`CancelToken`] is cancelled.

use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use serde_json::{json, Value as Json};
use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a helpful and insightful AI programming assistant.
The user will provide you with a code snippet and a specific question or doubt they have about that code.
Your task is to analyze the code and provide a clear, concise, and accurate explanation or answer to the user's question, focusing on the provided code.
If the question is unclear or the code is insufficient to answer, politely ask for clarification or more context.
Do not provide general programming advice unless it's directly relevant to the question and code.
Structure your response in a readable way. You can use markdown for formatting if appropriate (e.g., code blocks for small examples, lists).
Keep your response focused and to the point. Avoid overly verbose explanations.
";

/// One normalized piece of the answer stream
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// An upstream completion delta, as JSON
    Content(Json),
    Done,
    KeepAlive,
    /// Terminal failure message
    Error(String),
}

impl Chunk {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Chunk::Done | Chunk::Error(_))
    }

    /// Text carried by a content delta
    pub fn text(&self) -> Option<&str> {
        match self {
            Chunk::Content(delta) => delta.pointer("/choices/0/delta/content").and_then(Json::as_str),
            _ => None,
        }
    }

    /// Server-sent event encoding
    pub fn to_sse(&self) -> String {
        match self {
            Chunk::Content(delta) => format!("data: {}\n\n", delta),
            Chunk::Done => {
                let done = json!({"choices": [{"delta": {"content": ""}, "finish_reason": "stop"}]});
                format!("data: {}\n\n", done)
            }
            Chunk::KeepAlive => ": keep-alive\n\n".to_string(),
            Chunk::Error(message) => format!("data: {}\n\n", json!({ "error": message })),
        }
    }
}

/// Normalize one upstream line; blank and unrecognized lines yield nothing
pub fn parse_line(line: &str) -> Option<Chunk> {
    let trimmed = line.trim();
    if let Some(data) = line.strip_prefix("data: ") {
        let data = data.trim();
        if data == "[DONE]" {
            return Some(Chunk::Done);
        }
        return Some(match serde_json::from_str::<Json>(data) {
            Ok(delta) => Chunk::Content(delta),
            Err(err) => {
                tracing::warn!(%err, "malformed upstream chunk");
                Chunk::Error(format!("Malformed upstream chunk ({})", err))
            }
        });
    }
    if trimmed == ":" || trimmed.starts_with(": ping") {
        return Some(Chunk::KeepAlive);
    }
    if !trimmed.is_empty() {
        tracing::debug!(line = trimmed, "ignoring non-data upstream line");
    }
    None
}

/// Streaming chat request for a question about `code`
pub fn insight_request(code: &str, question: &str) -> Json {
    let user = format!(
        "Here is the code:\n```python\n{code}\n```\n\nMy question about this code is:\n{question}\n\nPlease provide your insight:"
    );
    json!({
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": user},
        ],
        "model": "local-model",
        "temperature": 0.3,
        "max_tokens": 1500,
        "stream": true,
    })
}

/// Reject empty submissions before contacting the upstream
pub fn validate(code: &str, question: &str) -> Result<(), Chunk> {
    if code.trim().is_empty() {
        return Err(Chunk::Error("Code cannot be empty.".to_string()));
    }
    if question.trim().is_empty() {
        return Err(Chunk::Error("Question cannot be empty.".to_string()));
    }
    Ok(())
}

/// Shared flag that ends a stream at its next chunk
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Iterator of normalized chunks read from an upstream event stream
pub struct AssistStream<R> {
    upstream: Option<R>,
    pending: Option<Chunk>,
    cancel: CancelToken,
}

impl<R: BufRead> AssistStream<R> {
    /// Validate the question and open the upstream with `connect`
    pub fn open(
        code: &str,
        question: &str,
        cancel: CancelToken,
        connect: impl FnOnce(&Json) -> io::Result<R>,
    ) -> Self {
        if let Err(chunk) = validate(code, question) {
            return AssistStream::failed(chunk, cancel);
        }
        tracing::info!("sending insight stream request");
        match connect(&insight_request(code, question)) {
            Ok(upstream) => AssistStream {
                upstream: Some(upstream),
                pending: None,
                cancel,
            },
            Err(err) if err.kind() == io::ErrorKind::TimedOut => {
                AssistStream::failed(Chunk::Error("LLM request timed out".to_string()), cancel)
            }
            Err(err) => AssistStream::failed(Chunk::Error(format!("LLM API request failed ({})", err.kind())), cancel),
        }
    }

    /// Stream over an already connected upstream
    pub fn from_reader(upstream: R, cancel: CancelToken) -> Self {
        AssistStream {
            upstream: Some(upstream),
            pending: None,
            cancel,
        }
    }

    fn failed(chunk: Chunk, cancel: CancelToken) -> Self {
        AssistStream {
            upstream: None,
            pending: Some(chunk),
            cancel,
        }
    }
}

impl<R: BufRead> Iterator for AssistStream<R> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if let Some(chunk) = self.pending.take() {
            return Some(chunk);
        }
        loop {
            if self.cancel.is_cancelled() {
                self.upstream = None;
                return None;
            }
            let upstream = self.upstream.as_mut()?;
            let mut line = String::new();
            let chunk = match upstream.read_line(&mut line) {
                Ok(0) => {
                    self.upstream = None;
                    return None;
                }
                Ok(_) => match parse_line(line.trim_end_matches(['\r', '\n'])) {
                    Some(chunk) => chunk,
                    None => continue,
                },
                Err(err) => Chunk::Error(format!("Unexpected error during LLM stream ({})", err.kind())),
            };
            if chunk.is_terminal() {
                self.upstream = None;
                tracing::info!("insight stream finished");
            }
            return Some(chunk);
        }
    }
}

/// Event stream read from a chat-completions endpoint
pub type HttpUpstream = BufReader<Response>;

/// Post `request` to `endpoint` and hand back the streaming response body
pub fn connect_http(endpoint: &str, timeout: Duration, request: &Json) -> io::Result<HttpUpstream> {
    let client = Client::builder().timeout(timeout).build().map_err(io::Error::other)?;
    let response = client
        .post(endpoint)
        .header(ACCEPT, "text/event-stream")
        .json(request)
        .send()
        .and_then(Response::error_for_status)
        .map_err(|err| {
            if err.is_timeout() {
                io::Error::new(io::ErrorKind::TimedOut, err)
            } else {
                io::Error::other(err)
            }
        })?;
    Ok(BufReader::new(response))
}

/// Upstream produced by a shell command reading the request on stdin
pub struct CommandUpstream {
    child: Child,
    reader: BufReader<ChildStdout>,
}

impl CommandUpstream {
    pub fn spawn(command: &str, request: &Json) -> io::Result<Self> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            io::Write::write_all(&mut stdin, request.to_string().as_bytes())?;
        }
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "assistant stdout unavailable"))?;
        Ok(CommandUpstream {
            child,
            reader: BufReader::new(stdout),
        })
    }
}

impl io::Read for CommandUpstream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for CommandUpstream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl Drop for CommandUpstream {
    fn drop(&mut self) {
        // The command may already have exited
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn stream(text: &str) -> AssistStream<Cursor<Vec<u8>>> {
        AssistStream::from_reader(Cursor::new(text.as_bytes().to_vec()), CancelToken::new())
    }

    #[test]
    fn test_normalizes_upstream_lines() {
        let upstream = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n: ping - 1\nevent: noise\ndata: [DONE]\ndata: {\"late\":1}\n";
        let chunks: Vec<Chunk> = stream(upstream).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text(), Some("Hi"));
        assert_eq!(chunks[1], Chunk::KeepAlive);
        assert_eq!(chunks[2], Chunk::Done);
    }

    #[test]
    fn test_malformed_chunk_ends_stream() {
        let chunks: Vec<Chunk> = stream("data: {oops\ndata: {\"a\":1}\n").collect();
        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], Chunk::Error(message) if message.starts_with("Malformed")));
    }

    #[test]
    fn test_empty_inputs_yield_single_error() {
        let cancel = CancelToken::new();
        let chunks: Vec<Chunk> =
            AssistStream::open("  ", "why?", cancel.clone(), |_| Ok(Cursor::new(Vec::new()))).collect();
        assert_eq!(chunks, vec![Chunk::Error("Code cannot be empty.".to_string())]);
        let chunks: Vec<Chunk> = AssistStream::open("x = 1", "", cancel, |_| Ok(Cursor::new(Vec::new()))).collect();
        assert_eq!(chunks, vec![Chunk::Error("Question cannot be empty.".to_string())]);
    }

    #[test]
    fn test_cancel_stops_stream() {
        let cancel = CancelToken::new();
        let mut chunks = AssistStream::from_reader(Cursor::new(b": \ndata: [DONE]\n".to_vec()), cancel.clone());
        assert_eq!(chunks.next(), Some(Chunk::KeepAlive));
        cancel.cancel();
        assert_eq!(chunks.next(), None);
    }

    #[test]
    fn test_sse_encoding() {
        assert_eq!(Chunk::KeepAlive.to_sse(), ": keep-alive\n\n");
        assert_eq!(Chunk::Error("x".into()).to_sse(), "data: {\"error\":\"x\"}\n\n");
        assert!(Chunk::Done.to_sse().contains("\"finish_reason\":\"stop\""));
    }

    #[test]
    fn test_request_carries_question() {
        let request = insight_request("x = 1", "what is x?");
        let user = request["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("```python\nx = 1\n```"));
        assert!(user.contains("what is x?"));
        assert_eq!(request["stream"], true);
    }
}
