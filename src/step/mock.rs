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
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

/// The calls a mock step has received.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Start,
    Stop,
    Restart,
    AdjustTime(Duration),
}

/// A mock step. Doesn't render anything, and only finishes when told to. Clones share their
/// call history and finish flag so tests can keep a handle after giving a step to a playlist.
#[derive(Clone)]
pub struct Step {
    name: String,
    length: Duration,
    finish: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Step {
    /// Gets a new mock step.
    pub fn get(name: &str) -> Step {
        Step {
            name: name.to_string(),
            length: Duration::from_secs(30),
            finish: Arc::new(AtomicBool::new(false)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes the next frame report that the step has finished.
    pub fn finish(&self) {
        self.finish.store(true, Ordering::Relaxed);
    }

    /// Gets all calls made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("unable to get calls lock").clone()
    }

    /// Clears the call history.
    pub fn reset_calls(&self) {
        self.calls.lock().expect("unable to get calls lock").clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("unable to get calls lock").push(call);
    }
}

impl super::Step for Step {
    fn start(&mut self) {
        self.record(Call::Start);
    }

    fn stop(&mut self) {
        self.record(Call::Stop);
    }

    fn restart(&mut self) {
        self.record(Call::Restart);
    }

    fn frame(&mut self, _buffer: &mut [u8]) -> bool {
        self.finish.swap(false, Ordering::Relaxed)
    }

    fn adjust_time(&mut self, by: Duration) {
        self.record(Call::AdjustTime(by));
    }

    fn name(&self) -> String {
        format!("{} [0:30]", self.name)
    }

    fn name_no_time(&self) -> &str {
        &self.name
    }

    fn length(&self) -> Duration {
        self.length
    }

    fn box_clone(&self) -> Box<dyn super::Step> {
        Box::new(self.clone())
    }
}
