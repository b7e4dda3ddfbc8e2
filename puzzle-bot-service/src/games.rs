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

use std::sync::Arc;

use chrono::Utc;
use puzzle_common::{
    DEFAULT_CHANNEL_PREFIX, DEFAULT_GENERATION_MAX_TOKENS, DEFAULT_GENERATION_PROMPT,
    DEFAULT_HINT_THRESHOLD, DEFAULT_JUDGE_MAX_TOKENS, DEFAULT_JUDGE_PROMPT, GAMES_FAILED_MESSAGE,
    GAMES_STARTED_MESSAGE, GameError, INSUFFICIENT_PARTICIPANTS_MESSAGE, InviteeToken,
    MIN_PARTICIPANTS, Session, VerdictClassifier, WELCOME_MESSAGE, channel_name,
    parse_invitee_tokens, partition_groups, puzzle_announcement,
};
use tracing::{error, info, warn};

use crate::{
    config::ServiceConfig,
    llm::LanguageModel,
    puzzle::PuzzleGenerator,
    rounds::{RoundMachine, RoundStep},
    slack::{ChatPlatform, PlatformUser},
    store::SessionStore,
};

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub generation_prompt: String,
    pub judge_prompt: String,
    pub generation_max_tokens: u32,
    pub judge_max_tokens: u32,
    pub hint_threshold: u32,
    pub channel_prefix: String,
    pub private_channels: bool,
    /// Invited to each new channel after the members.
    pub bot_user_id: Option<String>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            generation_prompt: DEFAULT_GENERATION_PROMPT.to_string(),
            judge_prompt: DEFAULT_JUDGE_PROMPT.to_string(),
            generation_max_tokens: DEFAULT_GENERATION_MAX_TOKENS,
            judge_max_tokens: DEFAULT_JUDGE_MAX_TOKENS,
            hint_threshold: DEFAULT_HINT_THRESHOLD,
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            private_channels: false,
            bot_user_id: None,
        }
    }
}

impl GameSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            generation_prompt: config.prompts.generation_prompt.clone(),
            judge_prompt: config.prompts.judge_prompt.clone(),
            generation_max_tokens: config.generation_max_tokens,
            judge_max_tokens: config.judge_max_tokens,
            hint_threshold: config.hint_threshold,
            channel_prefix: config.channel_prefix.clone(),
            private_channels: config.private_channels,
            bot_user_id: config.slack.bot_user_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// Channel created, session stored and puzzle announced.
    Ready,
    /// Channel exists but has no session; messages there are ignored.
    PuzzleUnavailable,
    ChannelFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub members: Vec<String>,
    pub channel_id: Option<String>,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    /// Tokens that matched no user and were skipped.
    pub unresolved: Vec<String>,
    pub groups: Vec<GroupReport>,
}

/// Text sent back to whoever issued the start command.
pub fn start_reply(result: &Result<StartOutcome, GameError>) -> &'static str {
    match result {
        Ok(_) => GAMES_STARTED_MESSAGE,
        Err(GameError::InsufficientParticipants { .. }) => INSUFFICIENT_PARTICIPANTS_MESSAGE,
        Err(_) => GAMES_FAILED_MESSAGE,
    }
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: String,
    pub user_id: Option<String>,
    pub text: String,
    pub from_bot: bool,
}

#[derive(Debug)]
pub enum MessageOutcome {
    IgnoredBotMessage,
    NoSession,
    /// Chatter in a solved round; the stored session was left as is.
    Ignored,
    Handled { posted: usize },
    /// The step failed; the session was still written back and nothing posted.
    Dropped { error: GameError },
}

pub struct GameOrchestrator {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<dyn SessionStore>,
    generator: PuzzleGenerator,
    rounds: RoundMachine,
    settings: GameSettings,
}

impl GameOrchestrator {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn SessionStore>,
        model: Arc<dyn LanguageModel>,
        classifier: Arc<dyn VerdictClassifier>,
        settings: GameSettings,
    ) -> Self {
        let generator = PuzzleGenerator::new(
            model.clone(),
            settings.generation_prompt.clone(),
            settings.generation_max_tokens,
        );
        let rounds = RoundMachine::new(
            model,
            classifier,
            generator.clone(),
            settings.judge_prompt.clone(),
            settings.judge_max_tokens,
            settings.hint_threshold,
        );
        Self {
            platform,
            store,
            generator,
            rounds,
            settings,
        }
    }

    pub async fn start_games(
        &self,
        requester_id: &str,
        text: &str,
    ) -> Result<StartOutcome, GameError> {
        let tokens = parse_invitee_tokens(text);
        let (resolved, unresolved) = self.resolve_invitees(&tokens).await?;

        let mut participants = Vec::with_capacity(resolved.len() + 1);
        participants.push(requester_id.to_string());
        participants.extend(resolved);

        if participants.len() < MIN_PARTICIPANTS {
            info!(
                requester_id = %requester_id,
                found = participants.len(),
                "not enough participants to start a game"
            );
            return Err(GameError::InsufficientParticipants {
                found: participants.len(),
            });
        }

        let groups = partition_groups(&participants);
        let started_at = Utc::now().timestamp_millis();
        info!(
            requester_id = %requester_id,
            participants = participants.len(),
            groups = groups.len(),
            "starting puzzle games"
        );

        let mut reports = Vec::with_capacity(groups.len());
        for (index, members) in groups.into_iter().enumerate() {
            let name = channel_name(&self.settings.channel_prefix, started_at, index);
            reports.push(self.provision_group(&name, members).await);
        }

        match self.store.len().await {
            Ok(active) => info!(active_sessions = active, "puzzle groups attempted"),
            Err(error) => warn!(error = %format!("{error:#}"), "failed to count sessions"),
        }

        Ok(StartOutcome {
            unresolved,
            groups: reports,
        })
    }

    /// Escaped mentions are taken as ids; names are matched against the user
    /// name first, then the display name.
    async fn resolve_invitees(
        &self,
        tokens: &[InviteeToken],
    ) -> Result<(Vec<String>, Vec<String>), GameError> {
        let needs_directory = tokens
            .iter()
            .any(|token| matches!(token, InviteeToken::Name(_)));
        let directory: Vec<PlatformUser> = if needs_directory {
            self.platform.list_users().await.map_err(|error| {
                error!(error = %format!("{error:#}"), "failed to list workspace users");
                GameError::transport(error)
            })?
        } else {
            Vec::new()
        };

        let mut resolved = Vec::with_capacity(tokens.len());
        let mut unresolved = Vec::new();
        for token in tokens {
            match token {
                InviteeToken::UserId(id) => resolved.push(id.clone()),
                InviteeToken::Name(name) => match find_user_id(&directory, name) {
                    Some(id) => resolved.push(id),
                    None => {
                        let error = GameError::Resolution(name.clone());
                        warn!(token = %name, error = %error, "skipping unresolved invitee");
                        unresolved.push(name.clone());
                    }
                },
            }
        }
        Ok((resolved, unresolved))
    }

    async fn provision_group(&self, name: &str, members: Vec<String>) -> GroupReport {
        let channel_id = match self
            .platform
            .create_channel(name, self.settings.private_channels)
            .await
        {
            Ok(channel_id) => channel_id,
            Err(error) => {
                let error = GameError::channel_provisioning(error);
                error!(channel_name = %name, members = ?members, error = %error, "abandoning group");
                return GroupReport {
                    members,
                    channel_id: None,
                    status: GroupStatus::ChannelFailed,
                };
            }
        };

        if let Err(error) = self.platform.invite_members(&channel_id, &members).await {
            warn!(
                channel_id = %channel_id,
                members = ?members,
                error = %format!("{error:#}"),
                "failed to invite group members"
            );
        }
        if let Some(bot_user_id) = &self.settings.bot_user_id {
            let bot = std::slice::from_ref(bot_user_id);
            if let Err(error) = self.platform.invite_members(&channel_id, bot).await {
                warn!(
                    channel_id = %channel_id,
                    bot_user_id = %bot_user_id,
                    error = %format!("{error:#}"),
                    "failed to invite bot user"
                );
            }
        }
        self.post_best_effort(&channel_id, WELCOME_MESSAGE).await;

        let status = match self.start_session(&channel_id).await {
            Ok(()) => GroupStatus::Ready,
            Err(error) => {
                error!(
                    channel_id = %channel_id,
                    members = ?members,
                    error = %error,
                    "group has a channel but no game"
                );
                GroupStatus::PuzzleUnavailable
            }
        };

        GroupReport {
            members,
            channel_id: Some(channel_id),
            status,
        }
    }

    async fn start_session(&self, channel_id: &str) -> Result<(), GameError> {
        let puzzle = self.generator.generate().await?;
        let announcement = puzzle_announcement(&puzzle.prompt);
        let session = Session::new(channel_id, puzzle);
        let round_id = session.round_id;
        self.store
            .put(session)
            .await
            .map_err(GameError::transport)?;
        info!(channel_id = %channel_id, round_id = %round_id, "puzzle session created");
        self.post_best_effort(channel_id, &announcement).await;
        Ok(())
    }

    pub async fn handle_message(
        &self,
        message: InboundMessage,
    ) -> Result<MessageOutcome, GameError> {
        if message.from_bot {
            return Ok(MessageOutcome::IgnoredBotMessage);
        }

        let Some(mut session) = self
            .store
            .get(&message.channel_id)
            .await
            .map_err(GameError::transport)?
        else {
            return Ok(MessageOutcome::NoSession);
        };

        let result = match self.rounds.step(&mut session, &message.text).await {
            Ok(RoundStep::Ignored) => return Ok(MessageOutcome::Ignored),
            Ok(RoundStep::Advanced(outbound)) => Ok(outbound),
            Err(error) => Err(error),
        };
        let round_id = session.round_id;
        self.store
            .put(session)
            .await
            .map_err(GameError::transport)?;

        let outbound = match result {
            Ok(outbound) => outbound,
            Err(error) => {
                error!(
                    channel_id = %message.channel_id,
                    round_id = %round_id,
                    user_id = ?message.user_id,
                    error = %error,
                    "failed to process message"
                );
                return Ok(MessageOutcome::Dropped { error });
            }
        };

        let mut posted = 0;
        for text in &outbound {
            if self.post_best_effort(&message.channel_id, text).await {
                posted += 1;
            }
        }
        Ok(MessageOutcome::Handled { posted })
    }

    async fn post_best_effort(&self, channel_id: &str, text: &str) -> bool {
        match self.platform.post_message(channel_id, text).await {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    channel_id = %channel_id,
                    error = %format!("{error:#}"),
                    "failed to post message"
                );
                false
            }
        }
    }
}

fn find_user_id(directory: &[PlatformUser], name: &str) -> Option<String> {
    directory
        .iter()
        .find(|user| user.name == name)
        .or_else(|| {
            directory
                .iter()
                .find(|user| user.display_name.as_deref() == Some(name))
        })
        .map(|user| user.id.clone())
}
