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

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use puzzle_common::ChatTurn;

use crate::{
    llm::LanguageModel,
    slack::{ChatPlatform, PlatformUser},
};

pub const PUZZLE_OUTPUT: &str =
    "Prompt: Why is the room dark? Answer: The bulb is broken. It was never replaced.";
pub const NEXT_PUZZLE_OUTPUT: &str = "Prompt: Who rang the bell? Answer: The cat. It was hungry.";

#[derive(Debug, Clone)]
pub struct ModelCall {
    pub system_instructions: String,
    pub conversation: Vec<ChatTurn>,
    pub max_output_tokens: u32,
}

/// Answers from a fixed queue; an exhausted queue is an error.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
    calls: Mutex<Vec<ModelCall>>,
}

impl ScriptedModel {
    pub fn with_replies(replies: impl IntoIterator<Item = anyhow::Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: anyhow::Result<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn push_text(&self, reply: &str) {
        self.push_reply(Ok(reply.to_string()));
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(
        &self,
        system_instructions: &str,
        conversation: &[ChatTurn],
        max_output_tokens: u32,
    ) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(ModelCall {
            system_instructions: system_instructions.to_string(),
            conversation: conversation.to_vec(),
            max_output_tokens,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("scripted model has no reply left")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedChannel {
    pub name: String,
    pub private: bool,
}

/// In-memory workspace that records every call. Channel ids are `C1`, `C2`, ...
#[derive(Default)]
pub struct RecordingPlatform {
    pub users: Vec<PlatformUser>,
    pub fail_list_users: bool,
    /// 1-based creation attempts that fail.
    pub fail_create_attempts: HashSet<usize>,
    pub fail_invites: bool,
    pub fail_posts: bool,
    create_attempts: Mutex<usize>,
    created: Mutex<Vec<CreatedChannel>>,
    invites: Mutex<Vec<(String, Vec<String>)>>,
    posts: Mutex<Vec<(String, String)>>,
    responses: Mutex<Vec<(String, String)>>,
}

impl RecordingPlatform {
    pub fn with_users(users: &[(&str, &str, Option<&str>)]) -> Self {
        Self {
            users: users
                .iter()
                .map(|(id, name, display_name)| PlatformUser {
                    id: id.to_string(),
                    name: name.to_string(),
                    display_name: display_name.map(str::to_string),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<CreatedChannel> {
        self.created.lock().unwrap().clone()
    }

    pub fn invites(&self) -> Vec<(String, Vec<String>)> {
        self.invites.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn posts_in(&self, channel_id: &str) -> Vec<String> {
        self.posts()
            .into_iter()
            .filter(|(channel, _)| channel == channel_id)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn responses(&self) -> Vec<(String, String)> {
        self.responses.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn list_users(&self) -> anyhow::Result<Vec<PlatformUser>> {
        if self.fail_list_users {
            anyhow::bail!("users.list unavailable");
        }
        Ok(self.users.clone())
    }

    async fn create_channel(&self, name: &str, private: bool) -> anyhow::Result<String> {
        let attempt = {
            let mut attempts = self.create_attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if self.fail_create_attempts.contains(&attempt) {
            anyhow::bail!("conversations.create failed: restricted_action");
        }
        let mut created = self.created.lock().unwrap();
        created.push(CreatedChannel {
            name: name.to_string(),
            private,
        });
        Ok(format!("C{}", created.len()))
    }

    async fn invite_members(&self, channel_id: &str, user_ids: &[String]) -> anyhow::Result<()> {
        self.invites
            .lock()
            .unwrap()
            .push((channel_id.to_string(), user_ids.to_vec()));
        if self.fail_invites {
            anyhow::bail!("conversations.invite failed: cant_invite");
        }
        Ok(())
    }

    async fn post_message(&self, channel_id: &str, text: &str) -> anyhow::Result<()> {
        if self.fail_posts {
            anyhow::bail!("chat.postMessage failed: not_in_channel");
        }
        self.posts
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn respond(&self, response_url: &str, text: &str) -> anyhow::Result<()> {
        self.responses
            .lock()
            .unwrap()
            .push((response_url.to_string(), text.to_string()));
        Ok(())
    }
}
