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

use puzzle_common::{GameError, Puzzle, parse_puzzle_output};
use tracing::{debug, warn};

use crate::llm::LanguageModel;

#[derive(Clone)]
pub struct PuzzleGenerator {
    model: Arc<dyn LanguageModel>,
    instruction: String,
    max_output_tokens: u32,
}

impl PuzzleGenerator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        instruction: impl Into<String>,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            model,
            instruction: instruction.into(),
            max_output_tokens,
        }
    }

    /// One model call with the generation instruction and no conversation.
    pub async fn generate(&self) -> Result<Puzzle, GameError> {
        let raw = self
            .model
            .complete(&self.instruction, &[], self.max_output_tokens)
            .await
            .map_err(GameError::generation)?;

        let puzzle = parse_puzzle_output(&raw).inspect_err(|error| {
            warn!(error = %error, raw_len = raw.chars().count(), "model output is not a puzzle");
        })?;
        debug!(prompt_len = puzzle.prompt.chars().count(), "generated puzzle");
        Ok(puzzle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedModel;

    #[tokio::test]
    async fn generate_parses_model_output() {
        let model = Arc::new(ScriptedModel::with_replies([Ok(
            "Prompt: Why is the room dark? Answer: The bulb is broken. It was never replaced."
                .to_string(),
        )]));
        let generator = PuzzleGenerator::new(model.clone(), "make a puzzle", 500);

        let puzzle = generator.generate().await.unwrap();
        assert_eq!(puzzle.prompt, "Why is the room dark?");
        assert_eq!(puzzle.answer, "The bulb is broken. It was never replaced.");

        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system_instructions, "make a puzzle");
        assert!(calls[0].conversation.is_empty());
        assert_eq!(calls[0].max_output_tokens, 500);
    }

    #[tokio::test]
    async fn generate_rejects_output_without_answer() {
        let model = Arc::new(ScriptedModel::with_replies([Ok(
            "Prompt: A riddle with no solution".to_string(),
        )]));
        let generator = PuzzleGenerator::new(model, "make a puzzle", 500);

        let error = generator.generate().await.unwrap_err();
        assert!(matches!(error, GameError::Generation(_)));
    }

    #[tokio::test]
    async fn generate_maps_model_failure() {
        let model = Arc::new(ScriptedModel::with_replies([Err(anyhow::anyhow!(
            "endpoint unavailable"
        ))]));
        let generator = PuzzleGenerator::new(model, "make a puzzle", 500);

        let error = generator.generate().await.unwrap_err();
        match error {
            GameError::Generation(message) => assert!(message.contains("endpoint unavailable")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
