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

mod config;
mod games;
mod llm;
mod puzzle;
mod retry;
mod rounds;
mod slack;
mod store;
#[cfg(test)]
mod test_support;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{
        State,
        rejection::{FormRejection, JsonRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use lambda_http::run as lambda_run;
use puzzle_common::SubstringVerdictClassifier;
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::{
    config::ServiceConfig,
    games::{GameOrchestrator, GameSettings, InboundMessage, MessageOutcome, start_reply},
    llm::ChatCompletionsClient,
    slack::{ChatPlatform, SlackClient},
    store::InMemorySessionStore,
};

const SLACK_RETRY_HEADER: &str = "x-slack-retry-num";

#[derive(Clone)]
struct AppState {
    games: Arc<GameOrchestrator>,
    platform: Arc<dyn ChatPlatform>,
    slash_command: String,
    /// Lambda freezes the process once the response is sent, so work is
    /// awaited before replying instead of spawned.
    inline_processing: bool,
}

#[derive(Debug, Deserialize)]
struct SlashCommandForm {
    command: String,
    #[serde(default)]
    text: String,
    user_id: String,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SlackEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: SlackEvent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct SlackEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

impl SlackEvent {
    /// Plain user messages and bot messages become inbound messages; joins,
    /// edits and other subtypes are not part of the game.
    fn into_inbound(self) -> Option<InboundMessage> {
        if self.event_type != "message" {
            return None;
        }
        let from_bot = match self.subtype.as_deref() {
            None => self.bot_id.is_some(),
            Some("bot_message") => true,
            Some(_) => return None,
        };
        Some(InboundMessage {
            channel_id: self.channel?,
            user_id: self.user,
            text: self.text.unwrap_or_default(),
            from_bot,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "puzzle_bot_service=debug,tower_http=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let inline_processing = std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok();

    let platform: Arc<dyn ChatPlatform> = Arc::new(SlackClient::new(
        &config.slack,
        config.call_timeout,
        config.retry,
    ));
    let model = Arc::new(ChatCompletionsClient::new(
        &config.llm,
        config.call_timeout,
        config.retry,
    ));
    let games = GameOrchestrator::new(
        platform.clone(),
        Arc::new(InMemorySessionStore::default()),
        model,
        Arc::new(SubstringVerdictClassifier),
        GameSettings::from_config(&config),
    );

    let state = AppState {
        games: Arc::new(games),
        platform,
        slash_command: config.slack.slash_command.clone(),
        inline_processing,
    };

    let app = build_router(state);

    if inline_processing {
        info!("AWS Lambda runtime detected; running puzzle-bot-service in lambda mode");
        lambda_run(app)
            .await
            .map_err(|e| anyhow::Error::msg(format!("lambda runtime error: {e}")))?;
        return Ok(());
    }

    let bind_addr = parse_bind_addr("PUZZLE_BOT_BIND", "0.0.0.0:3000")?;
    info!(%bind_addr, slash_command = %config.slack.slash_command, "puzzle-bot-service listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/slack/commands", post(slash_command_handler))
        .route("/slack/events", post(events_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn parse_bind_addr(var_name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    let value = std::env::var(var_name)
        .ok()
        .unwrap_or_else(|| default.to_string());
    value.parse().context(format!("invalid {var_name}"))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"ok": true, "service": "puzzle-bot-service"}))
}

async fn slash_command_handler(
    State(state): State<AppState>,
    form: Result<Form<SlashCommandForm>, FormRejection>,
) -> Result<Response, ApiError> {
    let Form(form) = form.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    if form.command.trim() != state.slash_command {
        debug!(command = %form.command, "ignoring unknown slash command");
        return Ok(StatusCode::OK.into_response());
    }

    info!(
        user_id = %form.user_id,
        channel_id = ?form.channel_id,
        "start puzzle command received"
    );

    let response_url = form.response_url.filter(|url| !url.trim().is_empty());
    match response_url {
        Some(response_url) if !state.inline_processing => {
            tokio::spawn(async move {
                let result = state.games.start_games(&form.user_id, &form.text).await;
                log_start_result(&form.user_id, &result);
                if let Err(error) = state
                    .platform
                    .respond(&response_url, start_reply(&result))
                    .await
                {
                    warn!(
                        user_id = %form.user_id,
                        error = %format!("{error:#}"),
                        "failed to deliver slash command response"
                    );
                }
            });
            Ok(StatusCode::OK.into_response())
        }
        _ => {
            let result = state.games.start_games(&form.user_id, &form.text).await;
            log_start_result(&form.user_id, &result);
            Ok(Json(serde_json::json!({
                "response_type": "ephemeral",
                "text": start_reply(&result),
            }))
            .into_response())
        }
    }
}

fn log_start_result(
    requester_id: &str,
    result: &Result<games::StartOutcome, puzzle_common::GameError>,
) {
    match result {
        Ok(outcome) => {
            for group in &outcome.groups {
                info!(
                    requester_id = %requester_id,
                    channel_id = ?group.channel_id,
                    members = ?group.members,
                    status = ?group.status,
                    "puzzle group provisioned"
                );
            }
            info!(
                requester_id = %requester_id,
                groups = outcome.groups.len(),
                unresolved = ?outcome.unresolved,
                "start puzzle command finished"
            );
        }
        Err(error) => warn!(
            requester_id = %requester_id,
            error = %error,
            "start puzzle command rejected"
        ),
    }
}

async fn events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SlackEnvelope>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(envelope) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let event = match envelope {
        SlackEnvelope::UrlVerification { challenge } => {
            return Ok(Json(serde_json::json!({"challenge": challenge})));
        }
        SlackEnvelope::EventCallback { event } => event,
        SlackEnvelope::Other => return Ok(Json(serde_json::json!({"ok": true}))),
    };

    if let Some(retry_num) = headers.get(SLACK_RETRY_HEADER) {
        debug!(retry_num = ?retry_num, "acknowledging redelivered slack event");
        return Ok(Json(serde_json::json!({"ok": true})));
    }

    let Some(message) = event.into_inbound() else {
        return Ok(Json(serde_json::json!({"ok": true})));
    };

    if state.inline_processing {
        dispatch_message(&state.games, message).await;
    } else {
        let games = state.games.clone();
        tokio::spawn(async move { dispatch_message(&games, message).await });
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn dispatch_message(games: &GameOrchestrator, message: InboundMessage) {
    let channel_id = message.channel_id.clone();
    match games.handle_message(message).await {
        Ok(MessageOutcome::Handled { posted }) => {
            debug!(channel_id = %channel_id, posted, "message handled");
        }
        Ok(outcome) => debug!(channel_id = %channel_id, outcome = ?outcome, "message not handled"),
        Err(error) => error!(channel_id = %channel_id, error = %error, "failed to handle message"),
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, message = %self.message, "request failed");
        (
            self.status,
            Json(serde_json::json!({"error": self.message})),
        )
            .into_response()
    }
}
