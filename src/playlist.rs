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
use core::fmt;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, span, warn, Level, Span};

use crate::step::Step;
use crate::util::duration_minutes_seconds;

mod error;
mod mode;
mod store;

pub use error::PlaylistError;
pub use mode::TransitionMode;
pub use store::{Schedule, StepId, Store};

/// How many draws random selection makes before settling for the positional successor.
const MAX_RANDOM_ATTEMPTS: usize = 16;

/// Random selection needs at least this many eligible steps to be worth doing.
const MIN_RANDOM_CANDIDATES: usize = 3;

/// A point in time snapshot of a playlist, reported to plugins as JSON.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlaylistStatus {
    pub name: String,
    pub running: bool,
    pub paused: bool,
    pub step: Option<String>,
    pub position: Option<usize>,
    pub steps: usize,
    pub looping: bool,
    pub random: bool,
    pub mode: TransitionMode,
    pub length_ms: u64,
}

/// Playlist sequences the steps of a show and decides which step plays next.
pub struct Playlist {
    /// The display name of the playlist.
    name: String,
    /// The steps in playback order.
    store: Store,
    /// The step that is playing. None when the playlist isn't running.
    current: Option<StepId>,
    /// Wrap back around once the end of the rotation is reached.
    looping: bool,
    /// Pick steps at random rather than positionally.
    random: bool,
    /// The pending transition override.
    mode: TransitionMode,
    /// Set once the show is heading for its end. Disables wrapping and random selection.
    last_loop: bool,
    /// End the playlist when the current step finishes.
    stop_at_end: bool,
    /// Head for the end step at the next positional transition. Survives force-next, loops
    /// and jumps until the next start.
    jump_to_end: bool,
    /// When the playlist was paused.
    paused_at: Option<Instant>,
    /// The first step only plays at the start of a run.
    first_step_only_once: bool,
    /// The last step only plays as an end step.
    last_step_only_once: bool,
    /// Source for random selection.
    rng: StdRng,
    /// The logging span.
    span: Span,
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Playlist {} ({} steps, {}):",
            self.name,
            self.store.len(),
            duration_minutes_seconds(self.length())
        )?;
        for (position, (_, step)) in self.store.iter().enumerate() {
            let mut flags = Vec::new();
            if position == 0 && self.first_step_only_once {
                flags.push("first only once");
            }
            if position + 1 == self.store.len() && self.last_step_only_once {
                flags.push("last only once");
            }

            if flags.is_empty() {
                writeln!(f, "  - {}", step.name())?;
            } else {
                writeln!(f, "  - {} ({})", step.name(), flags.join(", "))?;
            }
        }

        Ok(())
    }
}

impl Clone for Playlist {
    /// Deep copies the steps and configuration. The copy is not running.
    fn clone(&self) -> Self {
        let mut playlist = Playlist::new(&self.name);
        playlist.store = self.store.clone();
        playlist.store.clear_dirty();
        playlist.first_step_only_once = self.first_step_only_once;
        playlist.last_step_only_once = self.last_step_only_once;
        playlist
    }
}

impl Playlist {
    /// Creates a new, empty playlist.
    pub fn new(name: &str) -> Playlist {
        Playlist::with_rng(name, StdRng::from_entropy())
    }

    /// Creates a new, empty playlist whose random selection is reproducible.
    pub fn with_seed(name: &str, seed: u64) -> Playlist {
        Playlist::with_rng(name, StdRng::seed_from_u64(seed))
    }

    /// Reseeds random selection so that a run can be reproduced.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn with_rng(name: &str, rng: StdRng) -> Playlist {
        Playlist {
            name: name.to_string(),
            store: Store::new(),
            current: None,
            looping: false,
            random: false,
            mode: TransitionMode::Normal,
            last_loop: false,
            stop_at_end: false,
            jump_to_end: false,
            paused_at: None,
            first_step_only_once: false,
            last_step_only_once: false,
            rng,
            span: span!(Level::INFO, "playlist", name = name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        self.store.mark_dirty();
    }

    pub fn first_step_only_once(&self) -> bool {
        self.first_step_only_once
    }

    /// Reserves the first step for the start of a run.
    pub fn set_first_step_only_once(&mut self, first_step_only_once: bool) {
        self.first_step_only_once = first_step_only_once;
        self.store.mark_dirty();
    }

    pub fn last_step_only_once(&self) -> bool {
        self.last_step_only_once
    }

    /// Reserves the last step for the end of a run.
    pub fn set_last_step_only_once(&mut self, last_step_only_once: bool) {
        self.last_step_only_once = last_step_only_once;
        self.store.mark_dirty();
    }

    /// The steps of the playlist, in playback order.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns true if the playlist has changed since it was last marked clean.
    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn clear_dirty(&mut self) {
        self.store.clear_dirty();
    }

    /// Inserts a step at the given position. Positions past the end append.
    pub fn add_step(&mut self, step: Box<dyn Step>, position: usize) -> StepId {
        self.store.add_step(step, position)
    }

    /// Appends a step.
    pub fn push_step(&mut self, step: Box<dyn Step>) -> StepId {
        self.store.add_step(step, usize::MAX)
    }

    /// Removes a step. If it is playing it is stopped first and the playlist stops running.
    pub fn remove_step(&mut self, id: StepId) -> Option<Box<dyn Step>> {
        let _enter = self.span.enter();

        let mut step = self.store.remove_step(id)?;
        if self.current == Some(id) {
            info!(
                step = step.name_no_time(),
                "Removed the playing step, stopping playlist."
            );
            step.stop();
            self.current = None;
            self.paused_at = None;
        }
        Some(step)
    }

    /// Moves a step directly after the anchor, or to the front if there is no anchor.
    pub fn move_after(&mut self, id: StepId, anchor: Option<StepId>) -> Result<(), PlaylistError> {
        self.store.move_after(id, anchor)
    }

    /// Adds a schedule. Schedules play no part in sequencing.
    pub fn add_schedule(&mut self, schedule: Schedule) {
        self.store.add_schedule(schedule);
    }

    pub fn remove_schedule(&mut self, name: &str) -> Option<Schedule> {
        self.store.remove_schedule(name)
    }

    pub fn position_of(&self, id: StepId) -> Option<usize> {
        self.store.position_of(id)
    }

    /// Finds the first step with the given identity name.
    pub fn find(&self, name: &str) -> Option<StepId> {
        self.store.find(name)
    }

    /// The summed nominal length of every step.
    pub fn length(&self) -> Duration {
        self.store.length()
    }

    /// The step that is playing.
    pub fn current(&self) -> Option<StepId> {
        self.current
    }

    /// The step that is playing.
    pub fn current_step(&self) -> Option<&dyn Step> {
        self.current.and_then(|id| self.store.get(id))
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_random(&self) -> bool {
        self.random
    }

    /// The pending transition override.
    pub fn mode(&self) -> &TransitionMode {
        &self.mode
    }

    /// Starts playing from the first step, or a random one. Does nothing if the playlist is
    /// already running or has no steps.
    pub fn start(&mut self, looping: bool, random: bool) {
        if self.is_running() || self.store.is_empty() {
            return;
        }

        let span = self.span.clone();
        let _enter = span.enter();
        info!(looping, random, "Playlist starting to play.");

        self.looping = looping;
        self.random = random;
        self.mode = TransitionMode::Normal;
        self.last_loop = false;
        self.stop_at_end = false;
        self.jump_to_end = false;
        self.paused_at = None;

        let first = if random && !self.first_step_only_once {
            self.with_draws(|playlist, rng| playlist.random_step(rng, None))
        } else {
            self.store.first()
        };
        self.switch_to(first);
    }

    /// Stops the playing step. Does nothing if the playlist isn't running.
    pub fn stop(&mut self) {
        let Some(current) = self.current.take() else {
            return;
        };

        let _enter = self.span.enter();
        info!("Playlist stopping.");

        if let Some(step) = self.store.get_mut(current) {
            step.stop();
        }
        self.paused_at = None;
    }

    /// Renders one frame of the current step. Returns true when the playlist has finished.
    /// While paused nothing renders and the step never advances.
    pub fn frame(&mut self, buffer: &mut [u8]) -> bool {
        let Some(current) = self.current else {
            return false;
        };
        if self.is_paused() {
            return false;
        }

        let step_finished = self
            .store
            .get_mut(current)
            .is_some_and(|step| step.frame(buffer));
        if step_finished {
            return !self.transition();
        }

        false
    }

    /// Decides which step plays when the current one finishes. None means the playlist ends.
    /// In random mode this consumes a draw, so the following transition may pick differently.
    /// Use [Playlist::peek_next_step] to look ahead without disturbing it.
    pub fn next_step(&mut self) -> Option<StepId> {
        self.with_draws(|playlist, rng| playlist.choose_next_step(rng))
    }

    /// The step the next transition will pick if nothing changes before then.
    pub fn peek_next_step(&self) -> Option<StepId> {
        self.choose_next_step(&mut self.rng.clone())
    }

    fn choose_next_step(&self, rng: &mut StdRng) -> Option<StepId> {
        if self.stop_at_end {
            return None;
        }
        let current = self.current?;

        if let TransitionMode::ForceNext(name) = &self.mode {
            if let Some(forced) = self.store.find(name) {
                return Some(forced);
            }
        }

        if self.mode == TransitionMode::LoopCurrent {
            return Some(current);
        }

        if self.random && !self.last_loop {
            return self.random_step(rng, Some(current));
        }

        self.positional_step(current)
    }

    /// The step before the current one, wrapping around to the last step.
    pub fn prior_step(&self) -> Option<StepId> {
        if self.stop_at_end {
            return None;
        }
        let position = self.store.position_of(self.current?)?;

        match position {
            0 => self.store.last(),
            _ => self.store.at(position - 1),
        }
    }

    /// Skips to the next step, dropping any pending force-next or loop override. Returns false
    /// if there was no next step, which means the playlist has finished.
    pub fn jump_to_next_step(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.clear_overrides();
        self.transition()
    }

    /// Goes back to the previous step, dropping any pending force-next or loop override.
    pub fn jump_to_prior_step(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.clear_overrides();
        let prior = self.prior_step();
        self.switch_to(prior)
    }

    /// Plays the named step now. If it is already playing it restarts in place. Returns false
    /// if no step has that name, in which case the current step keeps playing.
    pub fn jump_to_step(&mut self, name: &str) -> bool {
        let span = self.span.clone();
        let _enter = span.enter();

        self.last_loop = false;
        self.clear_overrides();

        if let Some(step) = self.current.and_then(|id| self.store.get_mut(id)) {
            if step.name_no_time() == name {
                info!(step = name, "Restarting step.");
                step.restart();
                Self::rebase_pause(&mut self.paused_at);
                return true;
            }
        }

        let Some(target) = self.store.find(name) else {
            warn!(step = name, "Unable to find step to jump to.");
            return false;
        };

        info!(step = name, "Jumping to step.");
        self.switch_to(Some(target))
    }

    /// Leaves the loop rotation once the current step finishes, heading for the last step if it
    /// is reserved as an end step. Returns true if there is an end step to land on.
    pub fn jump_to_end_steps_at_end_of_current_step(&mut self) -> bool {
        let _enter = self.span.enter();
        info!("Jumping to end steps at end of current step.");

        self.mode = TransitionMode::JumpToEnd;
        self.jump_to_end = true;
        self.last_loop = true;

        self.store.len() > 1 && self.last_step_only_once
    }

    /// Plays the named step repeatedly until another command changes the transition mode.
    /// Playlist looping is switched off. Returns false if no step has that name.
    pub fn loop_step(&mut self, name: &str) -> bool {
        let playing = self
            .current_step()
            .is_some_and(|step| step.name_no_time() == name);
        if !playing && !self.jump_to_step(name) {
            return false;
        }

        let _enter = self.span.enter();
        info!(step = name, "Looping step.");

        self.mode = TransitionMode::LoopCurrent;
        self.last_loop = false;
        self.looping = false;
        true
    }

    /// Makes the next transition land on the named step, if it exists when the transition
    /// happens.
    pub fn force_next_step(&mut self, name: &str) {
        let _enter = self.span.enter();
        info!(step = name, "Forcing next step.");
        self.mode = TransitionMode::ForceNext(name.to_string());
    }

    /// Ends the playlist once the current step finishes.
    pub fn stop_at_end_of_current_step(&mut self) {
        let _enter = self.span.enter();
        info!("Stopping at end of current step.");
        self.stop_at_end = true;
    }

    /// Restarts the current step in place, dropping any pending force-next or loop override.
    pub fn restart_current_step(&mut self) {
        self.clear_overrides();
        if let Some(step) = self.current.and_then(|id| self.store.get_mut(id)) {
            step.restart();
            Self::rebase_pause(&mut self.paused_at);
        }
    }

    /// Toggles pause. Resuming pushes the current step's clock forward by the time spent paused.
    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    /// Toggles pause as of the given instant.
    pub fn pause_at(&mut self, now: Instant) {
        let Some(current) = self.current else {
            return;
        };
        let _enter = self.span.enter();

        match self.paused_at.take() {
            Some(paused_at) => {
                let paused_for = now.saturating_duration_since(paused_at);
                info!(
                    paused_ms = paused_for.as_millis() as u64,
                    "Resuming playlist."
                );
                if let Some(step) = self.store.get_mut(current) {
                    step.adjust_time(paused_for);
                }
            }
            None => {
                info!("Pausing playlist.");
                self.paused_at = Some(now);
            }
        }
    }

    /// Snapshots the playlist's state.
    pub fn status(&self) -> PlaylistStatus {
        PlaylistStatus {
            name: self.name.clone(),
            running: self.is_running(),
            paused: self.is_paused(),
            step: self.current_step().map(|step| step.name_no_time().to_string()),
            position: self.current.and_then(|id| self.store.position_of(id)),
            steps: self.store.len(),
            looping: self.looping,
            random: self.random,
            mode: self.mode.clone(),
            length_ms: u64::try_from(self.length().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Drops the overrides that a manual skip, jump or restart cancels. A pending end-jump
    /// stays in force.
    fn clear_overrides(&mut self) {
        self.mode = self.settled_mode();
    }

    /// The mode the playlist returns to once force-next or loop overrides are gone.
    fn settled_mode(&self) -> TransitionMode {
        if self.jump_to_end {
            TransitionMode::JumpToEnd
        } else {
            TransitionMode::Normal
        }
    }

    /// Moves to the next step as decided by the current policy, spending one-shot overrides.
    fn transition(&mut self) -> bool {
        let next = self.next_step();
        if self.mode.is_one_shot() {
            self.mode = self.settled_mode();
        }
        self.switch_to(next)
    }

    /// Runs a decision that may draw random numbers, keeping the draws it made.
    fn with_draws<T>(&mut self, decide: impl FnOnce(&Self, &mut StdRng) -> T) -> T {
        let mut rng = self.rng.clone();
        let decided = decide(&*self, &mut rng);
        self.rng = rng;
        decided
    }

    /// A step started while paused has only been paused from now on.
    fn rebase_pause(paused_at: &mut Option<Instant>) {
        if paused_at.is_some() {
            *paused_at = Some(Instant::now());
        }
    }

    /// Stops the current step and starts the given one. Returns false if there is no step to
    /// switch to, leaving the playlist stopped.
    fn switch_to(&mut self, next: Option<StepId>) -> bool {
        let _enter = self.span.enter();

        if let Some(step) = self.current.and_then(|id| self.store.get_mut(id)) {
            step.stop();
        }
        self.current = next;

        match next.and_then(|id| self.store.get_mut(id)) {
            Some(step) => {
                info!(step = step.name_no_time(), "Starting step.");
                step.start();
                Self::rebase_pause(&mut self.paused_at);
                true
            }
            None => {
                info!("No next step, playlist finished.");
                self.current = None;
                self.paused_at = None;
                false
            }
        }
    }

    /// The step that follows the current one by position, honouring the looping, end-jump and
    /// once-only policies.
    fn positional_step(&self, current: StepId) -> Option<StepId> {
        let position = self.store.position_of(current)?;
        let len = self.store.len();

        if self.jump_to_end {
            if len == 1 || !self.last_step_only_once || position == len - 1 {
                return None;
            }
            return self.store.last();
        }

        // A reserved last step sits outside of the loop rotation.
        let rotation_end = if self.last_step_only_once && len > 1 {
            len - 1
        } else {
            len
        };
        let successor = position + 1;

        if self.looping && !self.last_loop && successor >= rotation_end {
            let wrap_to = usize::from(self.first_step_only_once);
            if wrap_to >= rotation_end {
                return None;
            }
            return self.store.at(wrap_to);
        }

        self.store.at(successor)
    }

    /// Picks a random step from outside the reserved first and last steps, never the current
    /// step. Falls back to positional order when there are too few steps to choose from.
    fn random_step(&self, rng: &mut StdRng, current: Option<StepId>) -> Option<StepId> {
        let offset = usize::from(self.first_step_only_once);
        let count = self
            .store
            .len()
            .saturating_sub(offset)
            .saturating_sub(usize::from(self.last_step_only_once));

        if count < MIN_RANDOM_CANDIDATES {
            debug!(count, "Too few steps for random selection.");
            return match current {
                Some(current) => self.positional_step(current),
                None => self.store.first(),
            };
        }

        for _ in 0..MAX_RANDOM_ATTEMPTS {
            let selected = self.store.at(offset + rng.gen_range(0..count));
            if selected != current {
                return selected;
            }
        }

        warn!("Random selection kept landing on the current step.");
        current.and_then(|current| self.positional_step(current))
    }
}
