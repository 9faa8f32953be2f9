use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::models::chat::ChatMessage;

use super::generator::{BackendError, FragmentStream, TextGenerator};

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    pub messages: &'a [ChatMessage],
    pub max_tokens: usize,
    pub temperature: f32,
    pub stream: bool,
}

// Local response structs
#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    pub choices: Vec<ChoiceChunk>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceChunk {
    pub delta: Delta,
}

#[derive(Debug, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint
/// (llama-server and friends).
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    config: LlmConfig,
}

impl LlmService {
    pub fn new(config: LlmConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BackendError::Request(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "LLM backend at {} (stream={}, concurrent={})",
            config.base_url, config.stream_response, config.concurrent_inference
        );

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn post(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response, BackendError> {
        let request = ChatCompletionRequest {
            model: self.config.model.as_deref(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl TextGenerator for LlmService {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        debug!("Starting chat generation with {} messages", messages.len());

        let chat_response: ChatCompletionResponse = self
            .post(messages, false)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BackendError::Decode("No choices returned from LLM".to_string()))
    }

    async fn generate_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream, BackendError> {
        debug!("Starting chat stream with {} messages", messages.len());

        let response = self.post(messages, true).await?;
        Ok(parse_sse_stream(response.bytes_stream()))
    }

    fn supports_concurrent_inference(&self) -> bool {
        self.config.concurrent_inference
    }
}

/// Turn an SSE byte stream (`data: {...}` lines, `[DONE]` terminator) into
/// content fragments. Lines may be split across network chunks.
pub fn parse_sse_stream<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(BackendError::Stream(e.to_string()));
                    return;
                }
            };
            buf.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line)) {
                    SseLine::Content(content) => yield Ok(content),
                    SseLine::Done => return,
                    SseLine::Skip => {}
                }
            }
        }

        // trailing line without newline
        match parse_sse_line(&String::from_utf8_lossy(&buf)) {
            SseLine::Content(content) => yield Ok(content),
            SseLine::Done => return,
            SseLine::Skip => {}
        }

        // body closed without the terminator: the reply is truncated
        yield Err(BackendError::Stream("stream ended before [DONE]".to_string()));
    })
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Content(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|content| !content.is_empty())
            .map(SseLine::Content)
            .unwrap_or(SseLine::Skip),
        Err(e) => {
            debug!("Skipping undecodable SSE payload: {}", e);
            SseLine::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn delta(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    async fn collect(chunks: Vec<Result<Vec<u8>, String>>) -> Vec<Result<String, String>> {
        parse_sse_stream(stream::iter(chunks))
            .map(|item| item.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_parses_fragments_until_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", delta("Hi"), delta(" there"), delta("ignored"));
        let out = collect(vec![Ok(body.into_bytes())]).await;
        assert_eq!(out, vec![Ok("Hi".to_string()), Ok(" there".to_string())]);
    }

    #[tokio::test]
    async fn test_line_split_across_chunks() {
        let line = delta("héllo");
        let bytes = line.as_bytes();
        // split inside the multi-byte é
        let cut = line.find('é').unwrap() + 1;
        let out = collect(vec![
            Ok(bytes[..cut].to_vec()),
            Ok(bytes[cut..].to_vec()),
            Ok(b"data: [DONE]\n\n".to_vec()),
        ])
        .await;
        assert_eq!(out, vec![Ok("héllo".to_string())]);
    }

    #[tokio::test]
    async fn test_role_only_and_comment_lines_skipped() {
        let body = format!(
            ": keep-alive\n\ndata: {{\"choices\":[{{\"delta\":{{\"role\":\"assistant\"}}}}]}}\n\n{}data: [DONE]\n\n",
            delta("ok")
        );
        let out = collect(vec![Ok(body.into_bytes())]).await;
        assert_eq!(out, vec![Ok("ok".to_string())]);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let out = collect(vec![
            Ok(delta("partial").into_bytes()),
            Err("connection reset".to_string()),
            Ok(delta("never").into_bytes()),
        ])
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok("partial".to_string()));
        assert!(out[1].as_ref().unwrap_err().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_missing_done_is_an_error() {
        let out = collect(vec![Ok(delta("partial").into_bytes())]).await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok("partial".to_string()));
        assert!(out[1].as_ref().unwrap_err().contains("[DONE]"));
    }

    #[tokio::test]
    async fn test_done_without_trailing_newline() {
        let body = format!("{}data: [DONE]", delta("ok"));
        let out = collect(vec![Ok(body.into_bytes())]).await;
        assert_eq!(out, vec![Ok("ok".to_string())]);
    }

    #[test]
    fn test_request_body_shape() {
        let messages = vec![ChatMessage::user("prompt: hi")];
        let body = serde_json::to_value(ChatCompletionRequest {
            model: None,
            messages: &messages,
            max_tokens: 64,
            temperature: 0.8,
            stream: true,
        })
        .unwrap();

        assert!(body.get("model").is_none());
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["content"], "prompt: hi");
    }
}
