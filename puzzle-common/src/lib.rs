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

use std::sync::LazyLock;

use regex::Regex;

mod error;
mod groups;
mod puzzle;
mod session;
mod verdict;

pub use error::GameError;
pub use groups::{GROUP_SIZE, MIN_PARTICIPANTS, ORPHAN_DROP_THRESHOLD, partition_groups};
pub use puzzle::{ANSWER_LABEL, PROMPT_LABEL, Puzzle, parse_puzzle_output};
pub use session::{ChatRole, ChatTurn, RoundState, Session, is_restart_request};
pub use verdict::{GuessVerdict, SubstringVerdictClassifier, VerdictClassifier};

pub const DEFAULT_HINT_THRESHOLD: u32 = 5;
pub const DEFAULT_GENERATION_MAX_TOKENS: u32 = 500;
pub const DEFAULT_JUDGE_MAX_TOKENS: u32 = 300;
pub const DEFAULT_CHANNEL_PREFIX: &str = "puzzle-game";
pub const MAX_CHANNEL_NAME_LEN: usize = 80;

pub const DEFAULT_GENERATION_PROMPT: &str = "Generate a creative, interesting, engaging, but not too complex or lengthy situation puzzle. The puzzle prompt should be less than 120 characters. Provide a prompt and a detailed answer. Please provide the output in the following format: 'Prompt: <puzzle prompt> \n Answer: <detailed answer>'.";

pub const DEFAULT_JUDGE_PROMPT: &str = "You are the host of a situation puzzle game played in a group chat. You know the puzzle and its detailed answer; the players do not. Players ask yes-or-no questions or propose explanations. Answer each question briefly with yes, no, or irrelevant, without revealing the answer. When the players have explained the key facts of the answer, tell them the puzzle is solved and restate the full answer.";

pub const WELCOME_MESSAGE: &str = "Welcome to the Situation Puzzle Game!";
pub const SOLVED_MESSAGE: &str =
    "Congratulations! You've solved the puzzle! Reply with 'yes' to start a new puzzle.";
pub const INSUFFICIENT_PARTICIPANTS_MESSAGE: &str = "Please invite at least 2 other users along with yourself for a total of at least 3 participants.";
pub const GAMES_STARTED_MESSAGE: &str = "Games started successfully.";
pub const GAMES_FAILED_MESSAGE: &str = "Failed to start the games.";

pub fn puzzle_announcement(prompt: &str) -> String {
    format!("Here is your puzzle: {prompt}")
}

pub fn new_puzzle_announcement(prompt: &str) -> String {
    format!("Here is your new puzzle: {prompt}")
}

/// One whitespace-separated entry from the "start game" command text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteeToken {
    /// Already a platform identifier (escaped mention such as `<@U123|bob>`).
    UserId(String),
    /// A user name that still has to be looked up, with any `@` sigil removed.
    Name(String),
}

impl InviteeToken {
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserId(id) => id,
            Self::Name(name) => name,
        }
    }
}

static ESCAPED_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<@([A-Z0-9]+)(?:\|[^>]*)?>$").expect("escaped mention pattern is valid")
});

static ENV_VAR_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
});

pub fn parse_invitee_tokens(text: &str) -> Vec<InviteeToken> {
    text.split_whitespace()
        .filter_map(|raw| {
            if let Some(caps) = ESCAPED_MENTION.captures(raw) {
                return Some(InviteeToken::UserId(caps[1].to_string()));
            }
            let name = raw.strip_prefix('@').unwrap_or(raw).trim();
            if name.is_empty() {
                None
            } else {
                Some(InviteeToken::Name(name.to_string()))
            }
        })
        .collect()
}

/// Channel names must be unique per workspace; the millisecond clock plus the
/// group index keeps names distinct within one start request.
///
/// The prefix is lowercased, anything outside `[a-z0-9_-]` becomes `-`, and it
/// is cut so the whole name fits in [`MAX_CHANNEL_NAME_LEN`].
pub fn channel_name(prefix: &str, unix_millis: i64, group_index: usize) -> String {
    let suffix = format!("-{}-{}", unix_millis, group_index + 1);
    let budget = MAX_CHANNEL_NAME_LEN.saturating_sub(suffix.len());
    let sanitized: String = prefix
        .trim()
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '_' | '-') => c,
            _ => '-',
        })
        .take(budget)
        .collect();
    let sanitized = sanitized.trim_matches('-');
    let prefix = if sanitized.is_empty() {
        DEFAULT_CHANNEL_PREFIX
    } else {
        sanitized
    };
    format!("{prefix}{suffix}")
}

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR_REFERENCE
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .into_owned()
}

/// Prompts loaded from files are sent as a single line.
pub fn fold_newlines(input: &str) -> String {
    input.replace(['\r', '\n'], " ").trim().to_string()
}
