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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{GuessVerdict, Puzzle, SOLVED_MESSAGE};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundState {
    AwaitingGuess,
    Solved,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-channel round state. Owned by the session store; handlers work on a
/// clone and write it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub channel_id: String,
    pub round_id: Uuid,
    pub puzzle: Puzzle,
    pub history: Vec<ChatTurn>,
    /// Consecutive "no" verdicts since the last reset.
    pub no_count: u32,
    pub state: RoundState,
    pub rounds_completed: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(channel_id: impl Into<String>, puzzle: Puzzle) -> Self {
        let now = Utc::now();
        Self {
            channel_id: channel_id.into(),
            round_id: Uuid::new_v4(),
            puzzle,
            history: Vec::new(),
            no_count: 0,
            state: RoundState::AwaitingGuess,
            rounds_completed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.state == RoundState::Solved
    }

    pub fn record_guess(&mut self, text: &str) {
        self.history.push(ChatTurn::user(text));
        self.updated_at = Utc::now();
    }

    /// Turns sent to the judge model after its system instruction: the puzzle,
    /// its answer, then the round's history in order.
    pub fn evaluation_conversation(&self) -> Vec<ChatTurn> {
        let mut conversation = Vec::with_capacity(self.history.len() + 2);
        conversation.push(ChatTurn::user(format!(
            "Here is the puzzle: {}",
            self.puzzle.prompt
        )));
        conversation.push(ChatTurn::user(format!(
            "The detailed answer to the puzzle is: {}",
            self.puzzle.answer
        )));
        conversation.extend(self.history.iter().cloned());
        conversation
    }

    /// Record the judge's reply and advance the round.
    ///
    /// Returns the messages to post, in order: the reply itself, then the
    /// congratulation when solved, then a hint when the run of "no" verdicts
    /// reaches `hint_threshold` (0 disables hints).
    pub fn apply_reply(
        &mut self,
        reply: &str,
        verdict: GuessVerdict,
        hint_threshold: u32,
    ) -> Vec<String> {
        self.history.push(ChatTurn::assistant(reply));
        self.updated_at = Utc::now();

        let mut outbound = vec![reply.to_string()];
        match verdict {
            GuessVerdict::Solved => {
                self.state = RoundState::Solved;
                self.rounds_completed += 1;
                outbound.push(SOLVED_MESSAGE.to_string());
            }
            GuessVerdict::NotSolved => self.no_count += 1,
            GuessVerdict::Unclear => self.no_count = 0,
        }

        if hint_threshold > 0 && self.no_count == hint_threshold {
            outbound.push(self.puzzle.hint());
            self.no_count = 0;
        }

        outbound
    }

    pub fn start_next_round(&mut self, puzzle: Puzzle) {
        self.puzzle = puzzle;
        self.history.clear();
        self.no_count = 0;
        self.state = RoundState::AwaitingGuess;
        self.round_id = Uuid::new_v4();
        self.updated_at = Utc::now();
    }
}

pub fn is_restart_request(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            "C1",
            Puzzle {
                prompt: "Why is the room dark?".to_string(),
                answer: "The bulb is broken. It was never replaced.".to_string(),
            },
        )
    }

    #[test]
    fn new_session_awaits_guesses() {
        let session = session();
        assert_eq!(session.state, RoundState::AwaitingGuess);
        assert!(!session.is_solved());
        assert_eq!(session.no_count, 0);
        assert!(session.history.is_empty());
    }

    #[test]
    fn evaluation_conversation_puts_puzzle_context_before_history() {
        let mut session = session();
        session.record_guess("Is it night?");
        session.apply_reply("No.", GuessVerdict::NotSolved, 5);
        session.record_guess("Is the bulb broken?");

        let conversation = session.evaluation_conversation();
        assert_eq!(conversation.len(), 5);
        assert_eq!(
            conversation[0],
            ChatTurn::user("Here is the puzzle: Why is the room dark?")
        );
        assert_eq!(
            conversation[1],
            ChatTurn::user(
                "The detailed answer to the puzzle is: The bulb is broken. It was never replaced."
            )
        );
        assert_eq!(conversation[2], ChatTurn::user("Is it night?"));
        assert_eq!(conversation[3], ChatTurn::assistant("No."));
        assert_eq!(conversation[4], ChatTurn::user("Is the bulb broken?"));
    }

    #[test]
    fn unclear_reply_resets_no_count() {
        let mut session = session();
        session.apply_reply("No.", GuessVerdict::NotSolved, 5);
        session.apply_reply("No.", GuessVerdict::NotSolved, 5);
        assert_eq!(session.no_count, 2);
        let outbound = session.apply_reply("Yes!", GuessVerdict::Unclear, 5);
        assert_eq!(outbound, vec!["Yes!".to_string()]);
        assert_eq!(session.no_count, 0);
    }

    #[test]
    fn fifth_no_emits_single_hint_and_resets() {
        let mut session = session();
        for _ in 0..4 {
            let outbound = session.apply_reply("No.", GuessVerdict::NotSolved, 5);
            assert_eq!(outbound.len(), 1);
        }
        let outbound = session.apply_reply("No.", GuessVerdict::NotSolved, 5);
        assert_eq!(
            outbound,
            vec![
                "No.".to_string(),
                "Here's a hint to help you out: The bulb is broken.".to_string(),
            ]
        );
        assert_eq!(session.no_count, 0);
        assert_eq!(session.state, RoundState::AwaitingGuess);
    }

    #[test]
    fn zero_threshold_disables_hints() {
        let mut session = session();
        for _ in 0..10 {
            let outbound = session.apply_reply("No.", GuessVerdict::NotSolved, 0);
            assert_eq!(outbound.len(), 1);
        }
        assert_eq!(session.no_count, 10);
    }

    #[test]
    fn solved_reply_congratulates_and_blocks_guesses() {
        let mut session = session();
        let outbound = session.apply_reply("Solved! The bulb was broken.", GuessVerdict::Solved, 5);
        assert_eq!(
            outbound,
            vec![
                "Solved! The bulb was broken.".to_string(),
                SOLVED_MESSAGE.to_string(),
            ]
        );
        assert!(session.is_solved());
        assert_eq!(session.rounds_completed, 1);
    }

    #[test]
    fn next_round_clears_history_and_counters() {
        let mut session = session();
        let first_round = session.round_id;
        session.record_guess("Is it night?");
        session.apply_reply("No.", GuessVerdict::NotSolved, 5);
        session.apply_reply("Solved!", GuessVerdict::Solved, 5);

        let next = Puzzle {
            prompt: "Who rang the bell?".to_string(),
            answer: "The cat.".to_string(),
        };
        session.start_next_round(next.clone());

        assert_eq!(session.puzzle, next);
        assert!(session.history.is_empty());
        assert_eq!(session.no_count, 0);
        assert_eq!(session.state, RoundState::AwaitingGuess);
        assert_ne!(session.round_id, first_round);
        assert_eq!(session.rounds_completed, 1);
    }

    #[test]
    fn restart_request_is_trimmed_and_case_insensitive() {
        assert!(is_restart_request("yes"));
        assert!(is_restart_request("  YeS \n"));
        assert!(!is_restart_request("yes please"));
        assert!(!is_restart_request("no"));
    }

    #[test]
    fn chat_turn_serializes_with_lowercase_role() {
        let value = serde_json::to_value(ChatTurn::assistant("hi")).unwrap();
        assert_eq!(value, serde_json::json!({"role": "assistant", "content": "hi"}));
    }
}
