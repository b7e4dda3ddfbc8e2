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

use thiserror::Error;

/// Failures the game flow distinguishes. None of them is fatal to the process.
#[derive(Debug, Error)]
pub enum GameError {
    /// An invitee token did not match any known user; the token is skipped.
    #[error("invitee `{0}` does not match any known user")]
    Resolution(String),

    #[error("at least 3 participants are required, found {found}")]
    InsufficientParticipants { found: usize },

    /// Channel creation failed; the group's game is abandoned.
    #[error("channel provisioning failed: {0}")]
    ChannelProvisioning(String),

    /// The model call failed or its output could not be split into prompt and answer.
    #[error("puzzle generation failed: {0}")]
    Generation(String),

    #[error("external call failed: {0}")]
    Transport(String),
}

impl GameError {
    pub fn generation(error: impl std::fmt::Display) -> Self {
        Self::Generation(format!("{error:#}"))
    }

    pub fn transport(error: impl std::fmt::Display) -> Self {
        Self::Transport(format!("{error:#}"))
    }

    pub fn channel_provisioning(error: impl std::fmt::Display) -> Self {
        Self::ChannelProvisioning(format!("{error:#}"))
    }
}
