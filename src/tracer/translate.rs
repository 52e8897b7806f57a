//! Foreign-language front door
//!
//! Snippets written in another language are handed to a [`Translator`] and
//! the answer is cleaned down to the runnable code it contains.
//! [`HttpTranslator`] posts a chat-completion request to an OpenAI-compatible
//! endpoint; [`CommandTranslator`] pipes the same request to an external
//! command and reads the model's answer from its stdout.

use super::errors::TranslateError;
use regex::Regex;
use reqwest::blocking::Client;
use serde_json::{json, Value as Json};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

/// Languages run without translation
pub fn is_native(language: &str) -> bool {
    matches!(language.trim().to_ascii_lowercase().as_str(), "" | "python" | "py" | "python3")
}

/// Converts a snippet into the runnable language
pub trait Translator {
    /// Raw collaborator answer; cleaning happens in [`translate`]
    fn translate(&self, code: &str, language: &str) -> Result<String, TranslateError>;
}

/// Translate `code` and clean the answer.
///
/// The returned text is either runnable code or an `Error:` message.
pub fn translate(translator: &dyn Translator, code: &str, language: &str) -> String {
    match translator.translate(code, language) {
        Ok(answer) => clean_code_response(&answer),
        Err(err) => {
            tracing::warn!(%err, language, "translation failed");
            err.to_string()
        }
    }
}

/// Chat-completion request asking for a plain code conversion
pub fn conversion_request(code: &str, language: &str) -> Json {
    let system = format!(
        "You are an expert code conversion engine. Your sole task is to translate the user-provided code snippet from {language} into its equivalent Python code.\n\
         **CRITICAL INSTRUCTIONS:**\n\
         1.  Output ONLY the raw Python code. 2.  Do NOT include any introductory text. 3.  Do NOT include any explanations or summaries.\n\
         4.  Do NOT wrap the code in markdown fences. 5.  Your entire response MUST consist *only* of the valid, executable Python code.\n\
         6.  **Do NOT include the `if __name__ == '__main__':` code block.** All code should be at the top level."
    );
    let user = format!("Convert the following {language} code to Python:\n\n```{language}\n{code}\n```\nPython code:");
    json!({
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
        "model": "local-model",
        "temperature": 0.1,
        "max_tokens": 4000,
        "stream": false,
    })
}

/// Posts the conversion request to a chat-completions endpoint
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTranslator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::Request(e.to_string()))?;
        Ok(HttpTranslator {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, code: &str, language: &str) -> Result<String, TranslateError> {
        tracing::info!(language, endpoint = %self.endpoint, "sending code conversion request");
        let failed = |err: reqwest::Error| {
            if err.is_timeout() {
                TranslateError::TimedOut {
                    secs: self.timeout.as_secs(),
                }
            } else {
                TranslateError::Request(err.to_string())
            }
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&conversion_request(code, language))
            .send()
            .map_err(failed)?;
        let status = response.status();
        let body = response.text().map_err(failed)?;
        if !status.is_success() {
            let detail: String = body.chars().take(200).collect();
            return Err(TranslateError::Request(format!("{}: {}", status, detail.trim())));
        }
        completion_content(&body)
    }
}

/// Runs a shell command with the request on stdin
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    command: String,
}

impl CommandTranslator {
    pub fn new(command: impl Into<String>) -> Self {
        CommandTranslator {
            command: command.into(),
        }
    }
}

impl Translator for CommandTranslator {
    fn translate(&self, code: &str, language: &str) -> Result<String, TranslateError> {
        tracing::info!(language, command = %self.command, "sending code conversion request");
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TranslateError::Failed(e.to_string()))?;

        let request = conversion_request(code, language).to_string();
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(request.as_bytes())
                .map_err(|e| TranslateError::Failed(e.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| TranslateError::Failed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranslateError::Failed(format!("{} ({})", output.status, stderr.trim())));
        }
        let text = String::from_utf8(output.stdout).map_err(|_| TranslateError::Encoding)?;
        completion_content(&text)
    }
}

/// Model answer inside a chat-completion response; plain text passes through
fn completion_content(text: &str) -> Result<String, TranslateError> {
    let Ok(response) = serde_json::from_str::<Json>(text) else {
        return Ok(text.to_string());
    };
    match response.pointer("/choices/0/message/content").and_then(Json::as_str) {
        Some(content) => Ok(content.to_string()),
        None if response.is_object() => {
            let data: String = response.to_string().chars().take(500).collect();
            Err(TranslateError::Rejected(format!("Error: Invalid API response. Data: {}", data)))
        }
        None => Ok(text.to_string()),
    }
}

fn think_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid think pattern"))
}

fn code_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_]*\s*=|[A-Za-z_][A-Za-z0-9_]*\s*\(.*\)\s*:|print\(|[A-Za-z_][A-Za-z0-9_]*\()")
            .expect("valid code line pattern")
    })
}

fn opening_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?im)^\s*```(python|py)?\s*\n").expect("valid fence pattern"))
}

fn closing_fence() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)\n\s*```\s*$").expect("valid fence pattern"))
}

/// Drop `<think>...</think>` reasoning blocks
pub fn remove_think_tag(text: &str) -> String {
    think_block().replace_all(text, "").into_owned()
}

fn looks_like_code(line: &str) -> bool {
    const PREFIXES: [&str; 7] = ["def ", "class ", "import ", "from ", "#", "\"\"\"", "'''"];
    PREFIXES.iter().any(|p| line.starts_with(p)) || code_line().is_match(line)
}

/// Reduce a model answer to the code it contains.
///
/// Reasoning blocks, prose before the first code-like line and markdown
/// fences are removed. Answers already starting with `Error:` pass through.
pub fn clean_code_response(response: &str) -> String {
    if response.trim().starts_with("Error:") {
        return response.to_string();
    }
    let answer = remove_think_tag(response);
    let lines: Vec<&str> = answer.lines().collect();
    let cleaned = match lines.iter().position(|line| {
        let line = line.trim();
        !line.is_empty() && looks_like_code(line)
    }) {
        Some(start) => lines[start..].join("\n"),
        None => answer.clone(),
    };
    let cleaned = opening_fence().replace_all(&cleaned, "");
    let cleaned = closing_fence().replace_all(&cleaned, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return "Error: Code cleaning failed (empty). Original might be non-code.".to_string();
    }
    cleaned.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixed(Result<String, TranslateError>);

    impl Translator for Fixed {
        fn translate(&self, _code: &str, _language: &str) -> Result<String, TranslateError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_native_languages() {
        assert!(is_native("Python"));
        assert!(is_native(" py "));
        assert!(!is_native("JavaScript"));
    }

    #[test]
    fn test_strips_reasoning_prose_and_fences() {
        let answer = "<think>\nthe user wants python\n</think>\nHere is the code:\n```python\nx = 1\nprint(x)\n```";
        assert_eq!(clean_code_response(answer), "x = 1\nprint(x)");
    }

    #[test]
    fn test_error_answers_pass_through() {
        assert_eq!(clean_code_response("Error: timed out"), "Error: timed out");
        assert_eq!(
            clean_code_response("<THINK>nothing</THINK>\n  "),
            "Error: Code cleaning failed (empty). Original might be non-code."
        );
    }

    #[test]
    fn test_translate_reports_collaborator_failure() {
        let failing = Fixed(Err(TranslateError::Failed("exit status: 1".into())));
        assert!(translate(&failing, "int x;", "C").starts_with("Error:"));
        let working = Fixed(Ok("```py\ndef f():\n    return 1\n```".into()));
        assert_eq!(translate(&working, "int f() { return 1; }", "C"), "def f():\n    return 1");
    }

    #[test]
    fn test_completion_content_extraction() {
        let response = r#"{"choices":[{"message":{"content":"x = 2"}}]}"#;
        assert_eq!(completion_content(response).unwrap(), "x = 2");
        assert_eq!(completion_content("y = 3").unwrap(), "y = 3");
        assert!(completion_content(r#"{"detail":"bad"}"#).is_err());
    }

    #[test]
    fn test_conversion_request_names_language() {
        let request = conversion_request("int x = 1;", "C");
        assert_eq!(request["messages"][0]["role"], "system");
        assert!(request["messages"][1]["content"].as_str().unwrap().contains("```C\nint x = 1;\n```"));
        assert_eq!(request["stream"], false);
    }
}
