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

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use puzzle_common::Session;
use tokio::sync::RwLock;

/// Sessions keyed by channel id.
///
/// Callers load a copy, step it, and write it back. Two messages handled
/// concurrently in one channel race and the later `put` wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, channel_id: &str) -> anyhow::Result<Option<Session>>;
    /// Inserts or replaces the session for `session.channel_id`.
    async fn put(&self, session: Session) -> anyhow::Result<()>;
    async fn len(&self) -> anyhow::Result<usize>;
}

/// Process-lifetime store; a restart forgets every game.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, channel_id: &str) -> anyhow::Result<Option<Session>> {
        Ok(self.sessions.read().await.get(channel_id).cloned())
    }

    async fn put(&self, session: Session) -> anyhow::Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.channel_id.clone(), session);
        Ok(())
    }

    async fn len(&self) -> anyhow::Result<usize> {
        Ok(self.sessions.read().await.len())
    }
}
