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
use std::time::{Duration, Instant};

use tracing::debug;

use crate::util::duration_minutes_seconds;

#[cfg(test)]
pub mod mock;

/// A single playable unit of a playlist. The playlist owns its steps and drives them through
/// this contract; steps must never call back into the playlist that owns them.
pub trait Step: Send {
    /// Begins playback from the start of the step.
    fn start(&mut self);

    /// Halts playback and releases any transient render state.
    fn stop(&mut self);

    /// Resets the playback position without a stop/start boundary.
    fn restart(&mut self);

    /// Renders one frame into the buffer. Returns true once the step has reached its natural end.
    fn frame(&mut self, buffer: &mut [u8]) -> bool;

    /// Shifts the step's internal clock forward so that an external pause isn't counted as
    /// playback time.
    fn adjust_time(&mut self, by: Duration);

    /// The display name of the step, decorated with its length.
    fn name(&self) -> String;

    /// The identity name of the step.
    fn name_no_time(&self) -> &str;

    /// The nominal length of the step.
    fn length(&self) -> Duration;

    /// Deep copies the step.
    fn box_clone(&self) -> Box<dyn Step>;
}

impl Clone for Box<dyn Step> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// A step that plays for a fixed length of wall clock time, optionally flooding every frame
/// with a single channel value.
#[derive(Clone)]
pub struct TimedStep {
    /// The identity name of the step.
    name: String,
    /// How long the step plays for.
    length: Duration,
    /// The value written to every channel of each frame, if any.
    fill: Option<u8>,
    /// When playback started. None while stopped.
    started_at: Option<Instant>,
}

impl TimedStep {
    /// Creates a new timed step.
    pub fn new(name: &str, length: Duration) -> TimedStep {
        TimedStep {
            name: name.to_string(),
            length,
            fill: None,
            started_at: None,
        }
    }

    /// Sets the value written to every channel of each frame.
    pub fn with_fill(mut self, fill: u8) -> TimedStep {
        self.fill = Some(fill);
        self
    }

    /// Returns true if the step is playing.
    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    /// How much of the step has played.
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    fn elapsed_at(&self, now: Instant) -> Duration {
        self.started_at
            .map_or(Duration::ZERO, |started_at| {
                now.saturating_duration_since(started_at)
            })
    }
}

impl fmt::Display for TimedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Step::name(self))
    }
}

impl Step for TimedStep {
    fn start(&mut self) {
        debug!(step = self.name, "Starting step.");
        self.started_at = Some(Instant::now());
    }

    fn stop(&mut self) {
        debug!(step = self.name, "Stopping step.");
        self.started_at = None;
    }

    fn restart(&mut self) {
        debug!(step = self.name, "Restarting step.");
        self.started_at = Some(Instant::now());
    }

    fn frame(&mut self, buffer: &mut [u8]) -> bool {
        if self.started_at.is_none() {
            return false;
        }

        if let Some(fill) = self.fill {
            buffer.fill(fill);
        }

        self.elapsed() >= self.length
    }

    fn adjust_time(&mut self, by: Duration) {
        if let Some(started_at) = self.started_at {
            self.started_at = Some(started_at + by);
        }
    }

    fn name(&self) -> String {
        format!("{} [{}]", self.name, duration_minutes_seconds(self.length))
    }

    fn name_no_time(&self) -> &str {
        &self.name
    }

    fn length(&self) -> Duration {
        self.length
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }
}
