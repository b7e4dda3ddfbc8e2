// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use puzzle_common::{ChatRole, ChatTurn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::LlmSettings,
    retry::{PermanentFailure, RetryPolicy, retry_transient},
};

/// Stateless single-turn text completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        system_instructions: &str,
        conversation: &[ChatTurn],
        max_output_tokens: u32,
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// Azure OpenAI deployments: `api-key: <key>`.
    ApiKeyHeader,
    /// `Authorization: Bearer <key>`.
    Bearer,
}

impl AuthStyle {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "api-key" | "api_key" | "azure" => Some(Self::ApiKeyHeader),
            "bearer" | "openai" => Some(Self::Bearer),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: ChatRole,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    auth_style: AuthStyle,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ChatCompletionsClient {
    pub fn new(settings: &LlmSettings, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            auth_style: settings.auth_style,
            timeout,
            retry,
        }
    }

    async fn post_completion(&self, request: &ChatCompletionRequest<'_>) -> anyhow::Result<String> {
        let builder = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request);
        let builder = match self.auth_style {
            AuthStyle::ApiKeyHeader => builder.header("api-key", &self.api_key),
            AuthStyle::Bearer => builder.bearer_auth(&self.api_key),
        };

        let response = builder
            .send()
            .await
            .context("failed to call chat completions endpoint")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read chat completions response body")?;
        if !status.is_success() {
            let message = format!("chat completions endpoint returned {status}: {body}");
            if status.is_server_error() || status.as_u16() == 429 {
                anyhow::bail!(message);
            }
            return Err(PermanentFailure(message).into());
        }

        extract_reply(&body)
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn complete(
        &self,
        system_instructions: &str,
        conversation: &[ChatTurn],
        max_output_tokens: u32,
    ) -> anyhow::Result<String> {
        let request = build_request(
            &self.model,
            system_instructions,
            conversation,
            max_output_tokens,
        );
        let reply = retry_transient(self.retry, "chat.completions", || {
            self.post_completion(&request)
        })
        .await?;

        debug!(
            model = %self.model,
            turns = conversation.len(),
            max_output_tokens,
            reply_len = reply.chars().count(),
            "chat completion received"
        );
        Ok(reply)
    }
}

fn build_request<'a>(
    model: &'a str,
    system_instructions: &'a str,
    conversation: &'a [ChatTurn],
    max_output_tokens: u32,
) -> ChatCompletionRequest<'a> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(WireMessage {
        role: ChatRole::System,
        content: system_instructions,
    });
    messages.extend(conversation.iter().map(|turn| WireMessage {
        role: turn.role,
        content: &turn.content,
    }));

    ChatCompletionRequest {
        model,
        messages,
        max_tokens: max_output_tokens,
    }
}

fn extract_reply(body: &str) -> anyhow::Result<String> {
    let parsed = serde_json::from_str::<ChatCompletionResponse>(body)
        .context("failed to decode chat completions response")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .context("chat completions response has no message content")
}
