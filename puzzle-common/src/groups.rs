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

pub const MIN_PARTICIPANTS: usize = 3;
pub const GROUP_SIZE: usize = 3;
/// A trailing lone participant is dropped once the total exceeds this.
pub const ORPHAN_DROP_THRESHOLD: usize = 4;

/// Split participants (requester first) into game groups of up to three.
///
/// Groups are consecutive windows of the input in original order. A final
/// window of one is kept as its own group when there are at most
/// [`ORPHAN_DROP_THRESHOLD`] participants and dropped otherwise. Returns no
/// groups below [`MIN_PARTICIPANTS`].
pub fn partition_groups<T: Clone>(participants: &[T]) -> Vec<Vec<T>> {
    let total = participants.len();
    if total < MIN_PARTICIPANTS {
        return Vec::new();
    }

    let mut groups = Vec::with_capacity(total.div_ceil(GROUP_SIZE));
    for window in participants.chunks(GROUP_SIZE) {
        if window.len() == 1 && total > ORPHAN_DROP_THRESHOLD {
            break;
        }
        groups.push(window.to_vec());
    }
    groups
}
