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
use std::time::Duration;

use crate::step::Step;

use super::error::PlaylistError;

/// A stable handle to a step within a store. Handles survive reordering and are never reused
/// by the store that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(u64);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A time based schedule entry. Schedules travel with the playlist but play no part in
/// sequencing.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    pub name: String,
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

#[derive(Clone)]
struct Entry {
    id: StepId,
    step: Box<dyn Step>,
}

/// The ordered steps of a playlist. Order is the playback order; "first" and "last" always
/// mean list position.
#[derive(Clone, Default)]
pub struct Store {
    entries: Vec<Entry>,
    schedules: Vec<Schedule>,
    next_id: u64,
    dirty: bool,
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Store {
        Store::default()
    }

    /// Inserts a step at the given 0-based position. Positions past the end append.
    pub fn add_step(&mut self, step: Box<dyn Step>, position: usize) -> StepId {
        let id = StepId(self.next_id);
        self.next_id += 1;

        let position = position.min(self.entries.len());
        self.entries.insert(position, Entry { id, step });
        self.dirty = true;
        id
    }

    /// Removes the step, handing it back. Removing an unknown step does nothing.
    pub fn remove_step(&mut self, id: StepId) -> Option<Box<dyn Step>> {
        let position = self.position_of(id)?;
        self.dirty = true;
        Some(self.entries.remove(position).step)
    }

    /// Moves a step so it sits directly after the anchor, or to the front if there is no anchor.
    pub fn move_after(&mut self, id: StepId, anchor: Option<StepId>) -> Result<(), PlaylistError> {
        if Some(id) == anchor {
            return Ok(());
        }

        let original = self
            .position_of(id)
            .ok_or(PlaylistError::StepNotFound(id))?;
        let entry = self.entries.remove(original);

        // The anchor's position is taken after removal so that later entries have shifted.
        let position = match anchor {
            None => 0,
            Some(anchor) => match self.position_of(anchor) {
                Some(position) => position + 1,
                None => {
                    self.entries.insert(original, entry);
                    return Err(PlaylistError::AnchorNotFound(anchor));
                }
            },
        };

        self.entries.insert(position, entry);
        self.dirty = true;
        Ok(())
    }

    /// Returns the 0-based position of the step.
    pub fn position_of(&self, id: StepId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Finds the first step whose identity name matches.
    pub fn find(&self, name: &str) -> Option<StepId> {
        self.entries
            .iter()
            .find(|entry| entry.step.name_no_time() == name)
            .map(|entry| entry.id)
    }

    /// Gets the step with the given handle.
    pub fn get(&self, id: StepId) -> Option<&dyn Step> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.step.as_ref())
    }

    /// Gets the step with the given handle for playback.
    pub fn get_mut(&mut self, id: StepId) -> Option<&mut Box<dyn Step>> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id)
            .map(|entry| &mut entry.step)
    }

    /// The handle of the step at the given position.
    pub fn at(&self, position: usize) -> Option<StepId> {
        self.entries.get(position).map(|entry| entry.id)
    }

    pub fn first(&self) -> Option<StepId> {
        self.entries.first().map(|entry| entry.id)
    }

    pub fn last(&self) -> Option<StepId> {
        self.entries.last().map(|entry| entry.id)
    }

    /// Iterates over the steps in playback order.
    pub fn iter(&self) -> impl Iterator<Item = (StepId, &dyn Step)> {
        self.entries
            .iter()
            .map(|entry| (entry.id, entry.step.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The summed nominal length of every step.
    pub fn length(&self) -> Duration {
        self.entries.iter().map(|entry| entry.step.length()).sum()
    }

    /// Adds a schedule to the end of the schedule list.
    pub fn add_schedule(&mut self, schedule: Schedule) {
        self.schedules.push(schedule);
        self.dirty = true;
    }

    /// Removes the first schedule with the given name.
    pub fn remove_schedule(&mut self, name: &str) -> Option<Schedule> {
        let position = self
            .schedules
            .iter()
            .position(|schedule| schedule.name == name)?;
        self.dirty = true;
        Some(self.schedules.remove(position))
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    /// Returns true if the store has been mutated since it was last marked clean.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flags a change to playlist level settings that live outside of the store.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
