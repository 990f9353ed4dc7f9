// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;

use serde::Serialize;

/// The override that steers the next transition. Only one is active at a time; setting a new
/// one replaces whatever was pending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum TransitionMode {
    /// Follow the playlist's looping/random policy.
    #[default]
    Normal,

    /// Land on the named step at the next transition, if it exists.
    ForceNext(String),

    /// Replay the current step until the mode is changed.
    LoopCurrent,

    /// Leave the loop rotation and head for the end steps. Stays pending underneath
    /// force-next and loop overrides until the playlist is started again.
    JumpToEnd,
}

impl TransitionMode {
    /// Returns true for modes that are spent once they've steered a transition.
    pub fn is_one_shot(&self) -> bool {
        matches!(self, TransitionMode::ForceNext(_))
    }
}

impl fmt::Display for TransitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionMode::Normal => write!(f, "normal"),
            TransitionMode::ForceNext(step) => write!(f, "force next ({})", step),
            TransitionMode::LoopCurrent => write!(f, "loop current"),
            TransitionMode::JumpToEnd => write!(f, "jump to end"),
        }
    }
}
