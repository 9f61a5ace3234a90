use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::ollama};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::config::ServiceConfig;
use crate::error::{PipelineError, PipelineResult};

/// Create an LLM agent against the configured Ollama endpoint.
pub fn get_llm_agent(
    config: &ServiceConfig,
    preamble: &str,
) -> anyhow::Result<Agent<ollama::CompletionModel>> {
    let client = ollama::Client::builder()
        .base_url(&config.ollama_url)
        .build()?;
    Ok(client
        .agent(&config.generation_model)
        .preamble(preamble)
        .build())
}

/// Run a single completion, bounded by the configured request timeout.
///
/// A hung or unreachable endpoint surfaces as `ModelUnavailable` instead of
/// blocking the caller indefinitely.
pub async fn complete(
    config: &ServiceConfig,
    preamble: &str,
    prompt: &str,
) -> PipelineResult<String> {
    let agent =
        get_llm_agent(config, preamble).map_err(|e| PipelineError::ModelUnavailable(e.to_string()))?;

    let response = tokio::time::timeout(config.request_timeout, agent.prompt(prompt))
        .await
        .map_err(|_| {
            PipelineError::ModelUnavailable(format!(
                "no response from {} ({}) within {:?}",
                config.generation_model, config.ollama_url, config.request_timeout
            ))
        })?
        .map_err(|e| PipelineError::ModelUnavailable(e.to_string()))?;

    if response.trim().is_empty() {
        return Err(PipelineError::ModelUnavailable(format!(
            "{} returned an empty completion",
            config.generation_model
        )));
    }

    Ok(response)
}

/// A lazy, single-pass sequence of answer fragments.
///
/// Fragments arrive in generation order; concatenating them yields the full
/// answer. The stream is not restartable.
pub struct AnswerStream {
    rx: mpsc::Receiver<PipelineResult<String>>,
}

impl Stream for AnswerStream {
    type Item = PipelineResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// One line of Ollama's newline-delimited streaming response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Run a completion with `stream: true`, yielding text fragments as the
/// model produces them.
///
/// The request timeout bounds connection establishment; once the endpoint
/// is producing fragments the stream runs until `done`.
pub async fn stream_generate(config: &ServiceConfig, prompt: &str) -> PipelineResult<AnswerStream> {
    let url = format!("{}/api/generate", config.ollama_url.trim_end_matches('/'));
    let payload = serde_json::json!({
        "model": config.generation_model,
        "prompt": prompt,
        "stream": true,
    });

    let client = reqwest::Client::new();
    let response = tokio::time::timeout(
        config.request_timeout,
        client.post(&url).json(&payload).send(),
    )
    .await
    .map_err(|_| {
        PipelineError::ModelUnavailable(format!(
            "no response from {} within {:?}",
            url, config.request_timeout
        ))
    })?
    .map_err(|e| PipelineError::ModelUnavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(PipelineError::ModelUnavailable(format!(
            "generation request failed: {}",
            response.status()
        )));
    }

    let (tx, rx) = mpsc::channel::<PipelineResult<String>>(32);

    tokio::spawn(async move {
        let mut bytes = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = tx
                        .send(Err(PipelineError::ModelUnavailable(e.to_string())))
                        .await;
                    return;
                }
            };

            buffer.extend_from_slice(&chunk);

            while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match parse_stream_line(line) {
                    Ok(parsed) => {
                        if !parsed.response.is_empty()
                            && tx.send(Ok(parsed.response)).await.is_err()
                        {
                            // Receiver dropped; stop reading.
                            return;
                        }
                        if parsed.done {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "aborting generation stream");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        }
    });

    Ok(AnswerStream { rx })
}

fn parse_stream_line(line: &str) -> PipelineResult<GenerateChunk> {
    let parsed: GenerateChunk = serde_json::from_str(line)
        .map_err(|e| PipelineError::ModelUnavailable(format!("malformed stream line: {e}")))?;

    if let Some(error) = parsed.error {
        return Err(PipelineError::ModelUnavailable(error));
    }

    Ok(parsed)
}
