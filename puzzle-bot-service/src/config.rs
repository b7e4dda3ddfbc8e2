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
use puzzle_common::{
    DEFAULT_CHANNEL_PREFIX, DEFAULT_GENERATION_MAX_TOKENS, DEFAULT_GENERATION_PROMPT,
    DEFAULT_HINT_THRESHOLD, DEFAULT_JUDGE_MAX_TOKENS, DEFAULT_JUDGE_PROMPT, expand_env_vars,
    fold_newlines,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{llm::AuthStyle, retry::RetryPolicy};

pub const DEFAULT_SLASH_COMMAND: &str = "/start-puzzle";
pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-2025-04-14";
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CALL_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub slack: SlackSettings,
    pub llm: LlmSettings,
    pub prompts: PromptConfig,
    pub generation_max_tokens: u32,
    pub judge_max_tokens: u32,
    pub hint_threshold: u32,
    pub channel_prefix: String,
    pub private_channels: bool,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct SlackSettings {
    pub bot_token: String,
    pub api_base_url: String,
    /// Invited explicitly after channel creation when set.
    pub bot_user_id: Option<String>,
    pub slash_command: String,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub auth_style: AuthStyle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    pub generation_prompt: String,
    pub judge_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            generation_prompt: DEFAULT_GENERATION_PROMPT.to_string(),
            judge_prompt: DEFAULT_JUDGE_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PromptConfigFile {
    #[serde(default)]
    generation_prompt: Option<String>,
    #[serde(default, alias = "customization_prompt")]
    judge_prompt: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| normalize_optional_string(lookup(name));
        let required = |name: &str| {
            var(name).with_context(|| format!("missing required environment variable {name}"))
        };

        let auth_style = match var("LLM_AUTH_STYLE") {
            Some(raw) => AuthStyle::parse(&raw)
                .with_context(|| format!("invalid LLM_AUTH_STYLE '{raw}'"))?,
            None => AuthStyle::ApiKeyHeader,
        };

        let prompts = match var("PUZZLE_PROMPTS_CONFIG_PATH") {
            Some(path) => load_prompt_config(&path),
            None => PromptConfig::default(),
        };

        Ok(Self {
            slack: SlackSettings {
                bot_token: required("SLACK_BOT_TOKEN")?,
                api_base_url: var("SLACK_API_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_SLACK_API_BASE_URL.to_string()),
                bot_user_id: var("SLACK_BOT_USER_ID"),
                slash_command: var("PUZZLE_SLASH_COMMAND")
                    .unwrap_or_else(|| DEFAULT_SLASH_COMMAND.to_string()),
            },
            llm: LlmSettings {
                endpoint: required("LLM_ENDPOINT")?,
                api_key: required("LLM_API_KEY")?,
                model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                auth_style,
            },
            prompts,
            generation_max_tokens: parse_number(
                var("PUZZLE_GENERATION_MAX_TOKENS"),
                DEFAULT_GENERATION_MAX_TOKENS,
            ),
            judge_max_tokens: parse_number(var("PUZZLE_JUDGE_MAX_TOKENS"), DEFAULT_JUDGE_MAX_TOKENS),
            hint_threshold: parse_number(var("PUZZLE_HINT_THRESHOLD"), DEFAULT_HINT_THRESHOLD),
            channel_prefix: var("PUZZLE_CHANNEL_PREFIX")
                .unwrap_or_else(|| DEFAULT_CHANNEL_PREFIX.to_string()),
            private_channels: parse_bool(var("PUZZLE_PRIVATE_CHANNELS"), false),
            call_timeout: Duration::from_millis(parse_number(
                var("EXTERNAL_CALL_TIMEOUT_MS"),
                DEFAULT_CALL_TIMEOUT_MS,
            )),
            retry: RetryPolicy {
                max_attempts: parse_number(
                    var("EXTERNAL_CALL_MAX_ATTEMPTS"),
                    DEFAULT_CALL_MAX_ATTEMPTS,
                )
                .max(1),
                base_delay: Duration::from_millis(parse_number(
                    var("EXTERNAL_CALL_RETRY_BASE_MS"),
                    DEFAULT_RETRY_BASE_MS,
                )),
            },
        })
    }
}

/// Falls back to the built-in prompts when the file is unreadable or invalid.
fn load_prompt_config(path: &str) -> PromptConfig {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path, error = %error, "failed to read puzzle prompt config path");
            return PromptConfig::default();
        }
    };

    match prompt_config_from_yaml(&raw) {
        Ok(prompts) => {
            info!(
                path = %path,
                generation_prompt_len = prompts.generation_prompt.chars().count(),
                judge_prompt_len = prompts.judge_prompt.chars().count(),
                "loaded puzzle prompt config"
            );
            prompts
        }
        Err(error) => {
            warn!(path = %path, error = %format!("{error:#}"), "failed to parse puzzle prompt config yaml");
            PromptConfig::default()
        }
    }
}

fn prompt_config_from_yaml(raw: &str) -> anyhow::Result<PromptConfig> {
    let expanded = expand_env_vars(raw);
    let parsed = serde_yaml::from_str::<PromptConfigFile>(&expanded)
        .context("invalid prompt config yaml")?;
    let defaults = PromptConfig::default();

    Ok(PromptConfig {
        generation_prompt: normalize_optional_string(parsed.generation_prompt)
            .map(|prompt| fold_newlines(&prompt))
            .unwrap_or(defaults.generation_prompt),
        judge_prompt: normalize_optional_string(parsed.judge_prompt)
            .map(|prompt| fold_newlines(&prompt))
            .unwrap_or(defaults.judge_prompt),
    })
}

pub fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    value
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            if normalized.is_empty() {
                default
            } else {
                !matches!(normalized.as_str(), "0" | "false" | "no" | "off")
            }
        })
        .unwrap_or(default)
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}
