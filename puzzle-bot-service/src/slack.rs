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
use serde::Deserialize;
use tracing::debug;

use crate::{
    config::{SlackSettings, normalize_optional_string},
    retry::{PermanentFailure, RetryPolicy, retry_transient},
};

const USERS_PAGE_LIMIT: &str = "200";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformUser {
    pub id: String,
    pub name: String,
    pub display_name: Option<String>,
}

/// Operations the game needs from the chat workspace.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn list_users(&self) -> anyhow::Result<Vec<PlatformUser>>;
    /// Returns the new channel's id.
    async fn create_channel(&self, name: &str, private: bool) -> anyhow::Result<String>;
    async fn invite_members(&self, channel_id: &str, user_ids: &[String]) -> anyhow::Result<()>;
    async fn post_message(&self, channel_id: &str, text: &str) -> anyhow::Result<()>;
    /// Delayed reply to a slash command through its `response_url`.
    async fn respond(&self, response_url: &str, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Deserialize)]
struct UsersListPage {
    #[serde(default)]
    members: Vec<SlackMember>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackMember {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationCreated {
    channel: CreatedChannel,
}

#[derive(Debug, Deserialize)]
struct CreatedChannel {
    id: String,
}

/// Slack Web API client authenticated with a bot token.
#[derive(Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SlackClient {
    pub fn new(settings: &SlackSettings, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.api_base_url.clone(),
            bot_token: settings.bot_token.clone(),
            timeout,
            retry,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), method)
    }

    async fn call_api(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> anyhow::Result<serde_json::Value> {
        let response = request
            .bearer_auth(&self.bot_token)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("failed to call slack {method}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read slack {method} response body"))?;
        if !status.is_success() {
            let message = format!("slack {method} returned {status}: {body}");
            if status.is_server_error() || status.as_u16() == 429 {
                anyhow::bail!(message);
            }
            return Err(PermanentFailure(message).into());
        }

        check_ok(method, &body)
    }

    async fn post_method(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let request = self.client.post(self.endpoint(method)).json(payload);
        self.call_api(method, request).await
    }

    async fn users_page(&self, cursor: Option<&str>) -> anyhow::Result<UsersListPage> {
        let mut query = vec![("limit", USERS_PAGE_LIMIT)];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }
        let request = self.client.get(self.endpoint("users.list")).query(&query);
        let value = self.call_api("users.list", request).await?;
        serde_json::from_value(value).context("failed to decode slack users.list page")
    }
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn list_users(&self) -> anyhow::Result<Vec<PlatformUser>> {
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = retry_transient(self.retry, "slack.users.list", || {
                self.users_page(cursor.as_deref())
            })
            .await?;
            let (members, next_cursor) = page.into_parts();
            users.extend(members);
            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(users = users.len(), "listed slack users");
        Ok(users)
    }

    async fn create_channel(&self, name: &str, private: bool) -> anyhow::Result<String> {
        let value = self
            .post_method(
                "conversations.create",
                &serde_json::json!({"name": name, "is_private": private}),
            )
            .await?;
        let created = serde_json::from_value::<ConversationCreated>(value)
            .context("failed to decode slack conversations.create response")?;
        Ok(created.channel.id)
    }

    async fn invite_members(&self, channel_id: &str, user_ids: &[String]) -> anyhow::Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        self.post_method(
            "conversations.invite",
            &serde_json::json!({"channel": channel_id, "users": user_ids.join(",")}),
        )
        .await?;
        Ok(())
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({"channel": channel_id, "text": text});
        retry_transient(self.retry, "slack.chat.postMessage", || {
            self.post_method("chat.postMessage", &payload)
        })
        .await?;
        Ok(())
    }

    async fn respond(&self, response_url: &str, text: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({"response_type": "ephemeral", "text": text});
        let payload = &payload;
        retry_transient(self.retry, "slack.response_url", move || async move {
            let response = self
                .client
                .post(response_url)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await
                .context("failed to post slash command response")?;
            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let message = format!("slash command response_url returned {status}");
            if status.is_server_error() || status.as_u16() == 429 {
                anyhow::bail!(message);
            }
            Err(PermanentFailure(message).into())
        })
        .await
    }
}

impl UsersListPage {
    /// Active members plus the cursor for the next page, if any.
    fn into_parts(self) -> (Vec<PlatformUser>, Option<String>) {
        let members = self
            .members
            .into_iter()
            .filter(|member| !member.deleted)
            .map(|member| PlatformUser {
                id: member.id,
                name: member.name,
                display_name: member
                    .profile
                    .and_then(|profile| normalize_optional_string(profile.display_name)),
            })
            .collect();
        let next_cursor = self
            .response_metadata
            .and_then(|metadata| normalize_optional_string(metadata.next_cursor));
        (members, next_cursor)
    }
}

/// Slack reports API-level failures as HTTP 200 with `ok: false`.
fn check_ok(method: &str, body: &str) -> anyhow::Result<serde_json::Value> {
    let value = serde_json::from_str::<serde_json::Value>(body)
        .with_context(|| format!("failed to decode slack {method} response"))?;
    if value.get("ok").and_then(serde_json::Value::as_bool) == Some(true) {
        return Ok(value);
    }
    let error = value
        .get("error")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown_error");
    if error == "ratelimited" {
        anyhow::bail!("slack {method} failed: {error}");
    }
    Err(PermanentFailure(format!("slack {method} failed: {error}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::is_permanent;

    #[test]
    fn check_ok_passes_successful_responses_through() {
        let value = check_ok("chat.postMessage", r#"{"ok":true,"ts":"1.2"}"#).unwrap();
        assert_eq!(value["ts"], "1.2");
    }

    #[test]
    fn check_ok_marks_platform_errors_permanent() {
        let error = check_ok("conversations.create", r#"{"ok":false,"error":"name_taken"}"#)
            .unwrap_err();
        assert!(is_permanent(&error));
        assert!(error.to_string().contains("name_taken"));
    }

    #[test]
    fn check_ok_lets_rate_limits_retry() {
        let error = check_ok("users.list", r#"{"ok":false,"error":"ratelimited"}"#).unwrap_err();
        assert!(!is_permanent(&error));
    }

    #[test]
    fn users_page_skips_deleted_members_and_blank_display_names() {
        let page: UsersListPage = serde_json::from_value(serde_json::json!({
            "ok": true,
            "members": [
                {"id": "U1", "name": "alice", "profile": {"display_name": "Ali"}},
                {"id": "U2", "name": "bob", "deleted": true},
                {"id": "U3", "name": "carol", "profile": {"display_name": "  "}}
            ],
            "response_metadata": {"next_cursor": "dXNlcjpVMDYxTkZUVDI="}
        }))
        .unwrap();

        let (members, cursor) = page.into_parts();
        assert_eq!(
            members,
            vec![
                PlatformUser {
                    id: "U1".to_string(),
                    name: "alice".to_string(),
                    display_name: Some("Ali".to_string()),
                },
                PlatformUser {
                    id: "U3".to_string(),
                    name: "carol".to_string(),
                    display_name: None,
                },
            ]
        );
        assert_eq!(cursor.as_deref(), Some("dXNlcjpVMDYxTkZUVDI="));
    }

    #[test]
    fn users_page_without_cursor_is_last() {
        let page: UsersListPage = serde_json::from_value(serde_json::json!({
            "ok": true,
            "members": [],
            "response_metadata": {"next_cursor": ""}
        }))
        .unwrap();
        let (_, cursor) = page.into_parts();
        assert!(cursor.is_none());
    }

    #[test]
    fn created_channel_id_is_decoded() {
        let created: ConversationCreated = serde_json::from_value(serde_json::json!({
            "ok": true,
            "channel": {"id": "C0123", "name": "puzzle-game-1-1"}
        }))
        .unwrap();
        assert_eq!(created.channel.id, "C0123");
    }
}
