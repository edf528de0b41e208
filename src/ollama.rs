//! Ollama API client (http://127.0.0.1:11434 by default).
//! Streaming chat over NDJSON, plus the tags endpoint used as a health probe.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    #[error("ollama request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ollama api error: {0}")]
    Api(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatStreamEvent {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    /// Present when the server signals failure mid-stream (e.g. model not found).
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<OllamaModel>>,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// GET /api/tags: list available models; doubles as the reachability probe.
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(OllamaError::Api(format!("{} {}", status, body)));
        }
        let data: TagsResponse = res.json().await?;
        Ok(data.models.unwrap_or_default())
    }

    /// POST /api/chat with stream: true. Parses NDJSON, calls on_chunk for each
    /// content delta, and returns the concatenated reply.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, OllamaError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: model.to_string(),
            messages,
            stream: true,
        };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(OllamaError::Api(format!("{} {}", status, body)));
        }

        let mut stream = res.bytes_stream();
        let mut buffer = Vec::new();
        let mut content = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(OllamaError::Request)?;
            buffer.extend_from_slice(&chunk);
            while let Some(line) = next_line(&mut buffer) {
                if line.is_empty() {
                    continue;
                }
                let event: ChatStreamEvent = match serde_json::from_str(&line) {
                    Ok(event) => event,
                    Err(_) => continue,
                };
                if let Some(error) = event.error {
                    return Err(OllamaError::Api(error));
                }
                if let Some(message) = event.message {
                    if !message.content.is_empty() {
                        on_chunk(&message.content);
                        content.push_str(&message.content);
                    }
                }
                if event.done {
                    return Ok(content);
                }
            }
        }
        Ok(content)
    }
}

/// Pop the next newline-terminated line out of the NDJSON buffer.
fn next_line(buffer: &mut Vec<u8>) -> Option<String> {
    let i = buffer.iter().position(|&b| b == b'\n')?;
    let line_bytes: Vec<u8> = buffer.drain(..i).collect();
    buffer.drain(..1);
    Some(String::from_utf8_lossy(&line_bytes).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::{next_line, ChatStreamEvent};

    #[test]
    fn next_line_splits_lines_across_chunk_boundaries() {
        let mut buffer = b"{\"done\":false}\n{\"do".to_vec();
        assert_eq!(next_line(&mut buffer).as_deref(), Some("{\"done\":false}"));
        assert_eq!(next_line(&mut buffer), None);

        buffer.extend_from_slice(b"ne\":true}\n");
        assert_eq!(next_line(&mut buffer).as_deref(), Some("{\"done\":true}"));
        assert_eq!(next_line(&mut buffer), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn stream_event_parses_content_delta() {
        let raw = r#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#;
        let event: ChatStreamEvent = serde_json::from_str(raw).expect("delta should parse");
        assert_eq!(event.message.expect("message").content, "Hi");
        assert!(!event.done);
        assert!(event.error.is_none());
    }

    #[test]
    fn stream_event_parses_terminal_and_error_lines() {
        let done: ChatStreamEvent =
            serde_json::from_str(r#"{"done":true}"#).expect("done should parse");
        assert!(done.done);
        assert!(done.message.is_none());

        let failed: ChatStreamEvent =
            serde_json::from_str(r#"{"error":"model \"llama3\" not found"}"#)
                .expect("error should parse");
        assert_eq!(failed.error.as_deref(), Some("model \"llama3\" not found"));
    }
}
