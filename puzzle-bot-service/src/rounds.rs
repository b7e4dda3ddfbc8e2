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

use puzzle_common::{
    GameError, RoundState, Session, VerdictClassifier, is_restart_request,
    new_puzzle_announcement,
};
use tracing::{debug, info};

use crate::{llm::LanguageModel, puzzle::PuzzleGenerator};

/// Result of feeding one message to a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundStep {
    /// The session changed; post these messages in order.
    Advanced(Vec<String>),
    /// The round is solved and the message was not a restart request. The
    /// session is untouched and must not be written back.
    Ignored,
}

/// Advances one channel's round by a single human message.
#[derive(Clone)]
pub struct RoundMachine {
    model: Arc<dyn LanguageModel>,
    classifier: Arc<dyn VerdictClassifier>,
    generator: PuzzleGenerator,
    judge_prompt: String,
    judge_max_tokens: u32,
    hint_threshold: u32,
}

impl RoundMachine {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        classifier: Arc<dyn VerdictClassifier>,
        generator: PuzzleGenerator,
        judge_prompt: impl Into<String>,
        judge_max_tokens: u32,
        hint_threshold: u32,
    ) -> Self {
        Self {
            model,
            classifier,
            generator,
            judge_prompt: judge_prompt.into(),
            judge_max_tokens,
            hint_threshold,
        }
    }

    /// On error the session keeps whatever was already applied: a failed
    /// judge call leaves the guess in history, a failed restart leaves the
    /// round solved.
    pub async fn step(&self, session: &mut Session, text: &str) -> Result<RoundStep, GameError> {
        match session.state {
            RoundState::AwaitingGuess => self
                .evaluate_guess(session, text)
                .await
                .map(RoundStep::Advanced),
            RoundState::Solved if is_restart_request(text) => {
                self.restart(session).await.map(RoundStep::Advanced)
            }
            RoundState::Solved => {
                debug!(channel_id = %session.channel_id, "ignoring message in solved round");
                Ok(RoundStep::Ignored)
            }
        }
    }

    async fn evaluate_guess(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<String>, GameError> {
        session.record_guess(text);
        let reply = self
            .model
            .complete(
                &self.judge_prompt,
                &session.evaluation_conversation(),
                self.judge_max_tokens,
            )
            .await
            .map_err(GameError::generation)?;

        let verdict = self.classifier.classify(&reply);
        let outbound = session.apply_reply(&reply, verdict, self.hint_threshold);
        debug!(
            channel_id = %session.channel_id,
            round_id = %session.round_id,
            verdict = ?verdict,
            no_count = session.no_count,
            "evaluated guess"
        );
        Ok(outbound)
    }

    async fn restart(&self, session: &mut Session) -> Result<Vec<String>, GameError> {
        let puzzle = self.generator.generate().await?;
        let announcement = new_puzzle_announcement(&puzzle.prompt);
        session.start_next_round(puzzle);
        info!(
            channel_id = %session.channel_id,
            round_id = %session.round_id,
            rounds_completed = session.rounds_completed,
            "started next round"
        );
        Ok(vec![announcement])
    }
}
