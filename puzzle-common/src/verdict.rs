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

/// How a guess-evaluation reply is read by the round state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuessVerdict {
    Solved,
    NotSolved,
    Unclear,
}

pub trait VerdictClassifier: Send + Sync {
    fn classify(&self, reply: &str) -> GuessVerdict;
}

/// Case-insensitive substring policy: "solved" wins, then any "no".
///
/// "no" also matches inside words such as "not" or "know"; that looseness is
/// part of the policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringVerdictClassifier;

impl VerdictClassifier for SubstringVerdictClassifier {
    fn classify(&self, reply: &str) -> GuessVerdict {
        let lowered = reply.to_lowercase();
        if lowered.contains("solved") {
            GuessVerdict::Solved
        } else if lowered.contains("no") {
            GuessVerdict::NotSolved
        } else {
            GuessVerdict::Unclear
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(reply: &str) -> GuessVerdict {
        SubstringVerdictClassifier.classify(reply)
    }

    #[test]
    fn solved_takes_precedence_over_no() {
        assert_eq!(classify("No doubt about it, SOLVED!"), GuessVerdict::Solved);
    }

    #[test]
    fn no_is_matched_case_insensitively_and_inside_words() {
        assert_eq!(classify("No."), GuessVerdict::NotSolved);
        assert_eq!(classify("That is not relevant"), GuessVerdict::NotSolved);
        assert_eq!(classify("I KNOW what you mean"), GuessVerdict::NotSolved);
    }

    #[test]
    fn other_replies_are_unclear() {
        assert_eq!(classify("Yes!"), GuessVerdict::Unclear);
        assert_eq!(classify("Irrelevant."), GuessVerdict::Unclear);
        assert_eq!(classify(""), GuessVerdict::Unclear);
    }
}
