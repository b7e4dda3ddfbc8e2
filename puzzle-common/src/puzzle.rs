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

use serde::{Deserialize, Serialize};

use crate::GameError;

pub const PROMPT_LABEL: &str = "Prompt:";
pub const ANSWER_LABEL: &str = "Answer:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub prompt: String,
    /// Never posted verbatim; only [`Puzzle::hint`] reveals part of it.
    pub answer: String,
}

impl Puzzle {
    /// First sentence segment of the answer, as posted after repeated misses.
    pub fn hint(&self) -> String {
        let first = self.answer.split(". ").next().unwrap_or_default();
        format!("Here's a hint to help you out: {first}.")
    }
}

/// Split free-form model output of the shape `Prompt: ... Answer: ...`.
///
/// Only the first `Answer:` label separates the two fields; later occurrences
/// stay inside the answer. Output without the label, or with an empty prompt
/// or answer, is rejected.
pub fn parse_puzzle_output(raw: &str) -> Result<Puzzle, GameError> {
    let Some((head, tail)) = raw.split_once(ANSWER_LABEL) else {
        return Err(GameError::Generation(format!(
            "model output has no `{ANSWER_LABEL}` label"
        )));
    };

    let head = head.trim();
    let prompt = head.strip_prefix(PROMPT_LABEL).unwrap_or(head).trim();
    let answer = tail.trim();

    if prompt.is_empty() {
        return Err(GameError::Generation(
            "model output has an empty puzzle prompt".to_string(),
        ));
    }
    if answer.is_empty() {
        return Err(GameError::Generation(
            "model output has an empty puzzle answer".to_string(),
        ));
    }

    Ok(Puzzle {
        prompt: prompt.to_string(),
        answer: answer.to_string(),
    })
}
