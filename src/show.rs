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
use std::time::Duration;

use tokio::sync::mpsc::Receiver;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, span, Level, Span};

use crate::playlist::{Playlist, StepId};
use crate::plugin::PluginHost;

/// Commands that steer a running show. They are applied between frames, never during one.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Starts the playlist if it isn't running.
    Play { looping: bool, random: bool },

    /// Stops the playlist.
    Stop,

    /// Skips to the next step.
    Next,

    /// Goes back to the previous step.
    Prev,

    /// Restarts the current step.
    Restart,

    /// Plays the named step now.
    JumpTo(String),

    /// Plays the named step repeatedly.
    LoopStep(String),

    /// Lands on the named step at the next transition.
    ForceNext(String),

    /// Heads for the end steps once the current step finishes.
    JumpToEnd,

    /// Ends the playlist once the current step finishes.
    StopAtEnd,

    /// Toggles pause.
    Pause,
}

/// A show drives one playlist frame by frame and hands each frame to its plugins.
pub struct Show {
    /// The playlist being played.
    playlist: Playlist,
    /// The plugins watching the show.
    plugins: PluginHost,
    /// The frame buffer.
    buffer: Vec<u8>,
    /// The state last reported to the plugins.
    reported: Option<(Option<StepId>, bool)>,
    /// The logging span.
    span: Span,
}

impl Show {
    /// Creates a new show.
    pub fn new(playlist: Playlist, plugins: PluginHost, buffer_size: usize) -> Show {
        Show {
            playlist,
            plugins,
            buffer: vec![0; buffer_size],
            reported: None,
            span: span!(Level::INFO, "show"),
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn plugins(&self) -> &PluginHost {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginHost {
        &mut self.plugins
    }

    /// The most recently rendered frame.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Renders one frame. Returns true if the playlist finished during this frame.
    pub fn tick(&mut self) -> bool {
        if !self.playlist.is_running() {
            return false;
        }

        // A paused playlist renders nothing. The frame a step finishes on is still its last.
        let paused = self.playlist.is_paused();
        let finished = self.playlist.frame(&mut self.buffer);
        if !paused {
            self.plugins.manipulate_buffer(&mut self.buffer);
        }
        if finished {
            let _enter = self.span.enter();
            info!(playlist = self.playlist.name(), "Playlist finished.");
        }

        self.report_status();
        finished
    }

    /// Applies a command to the playlist. Returns false if the command had nothing to act on.
    pub fn apply(&mut self, command: Command) -> bool {
        {
            let _enter = self.span.enter();
            info!(command = format!("{:?}", command), "Applying command.");
        }

        let applied = match command {
            Command::Play { looping, random } => {
                self.playlist.start(looping, random);
                self.playlist.is_running()
            }
            Command::Stop => {
                let running = self.playlist.is_running();
                self.playlist.stop();
                running
            }
            Command::Next => self.playlist.jump_to_next_step(),
            Command::Prev => self.playlist.jump_to_prior_step(),
            Command::Restart => {
                self.playlist.restart_current_step();
                self.playlist.is_running()
            }
            Command::JumpTo(step) => self.playlist.jump_to_step(&step),
            Command::LoopStep(step) => self.playlist.loop_step(&step),
            Command::ForceNext(step) => {
                self.playlist.force_next_step(&step);
                self.playlist.find(&step).is_some()
            }
            Command::JumpToEnd => self.playlist.jump_to_end_steps_at_end_of_current_step(),
            Command::StopAtEnd => {
                self.playlist.stop_at_end_of_current_step();
                self.playlist.is_running()
            }
            Command::Pause => {
                self.playlist.pause();
                self.playlist.is_running()
            }
        };

        self.report_status();
        applied
    }

    /// Runs the show until the command channel closes, rendering a frame every interval.
    /// Frames and commands are handled on this one task so they never interleave.
    pub async fn run(mut self, mut commands: Receiver<Command>, frame_interval: Duration) -> Show {
        let mut interval = tokio::time::interval(frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                command = commands.recv() => match command {
                    Some(command) => {
                        self.apply(command);
                    }
                    None => {
                        let _enter = self.span.enter();
                        info!("Command channel closed, stopping show.");
                        break;
                    }
                },
            }
        }

        self.playlist.stop();
        self.report_status();
        self
    }

    /// Tells the plugins about the playlist's status if it changed since the last report.
    fn report_status(&mut self) {
        let state = (self.playlist.current(), self.playlist.is_paused());
        if self.reported == Some(state) {
            return;
        }
        self.reported = Some(state);

        match serde_json::to_string(&self.playlist.status()) {
            Ok(status) => self.plugins.notify_status(&status),
            Err(e) => {
                let _enter = self.span.enter();
                error!(err = %e, "Unable to serialize playlist status.");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::playlist::Playlist;
    use crate::plugin::test::RecordingPlugin;
    use crate::plugin::PluginHost;
    use crate::step::{mock, TimedStep};

    use super::{Command, Show};

    fn show_of(names: &[&str]) -> (Show, Vec<mock::Step>, RecordingPlugin) {
        let mut playlist = Playlist::with_seed("Test", 7);
        let steps: Vec<mock::Step> = names.iter().map(|name| mock::Step::get(name)).collect();
        for step in steps.iter() {
            playlist.push_step(Box::new(step.clone()));
        }

        let plugin = RecordingPlugin::new("recorder");
        let mut plugins = PluginHost::new(Path::new("/show"));
        plugins.register(Box::new(plugin.clone()));
        (Show::new(playlist, plugins, 4), steps, plugin)
    }

    fn current_name(show: &Show) -> Option<String> {
        show.playlist().status().step
    }

    #[test]
    fn test_tick_and_commands() {
        let (mut show, steps, plugin) = show_of(&["A", "B", "C"]);

        // Nothing renders until the playlist is started.
        assert!(!show.tick());
        assert!(plugin.statuses().is_empty());

        assert!(show.apply(Command::Play {
            looping: false,
            random: false
        }));
        assert_eq!(Some("A".to_string()), current_name(&show));

        // The plugin inverts the zeroed buffer.
        assert!(!show.tick());
        assert_eq!(&[255u8; 4], show.buffer());

        steps[0].finish();
        assert!(!show.tick());
        assert_eq!(Some("B".to_string()), current_name(&show));

        assert!(show.apply(Command::JumpTo("C".to_string())));
        assert!(!show.apply(Command::JumpTo("Nope".to_string())));
        assert!(!show.apply(Command::Next));
        assert!(!show.playlist().is_running());
        assert!(!show.apply(Command::Stop));
    }

    #[test]
    fn test_status_reports() {
        let (mut show, steps, plugin) = show_of(&["A", "B"]);
        show.apply(Command::Play {
            looping: false,
            random: false,
        });
        show.tick();
        show.tick();
        assert_eq!(1, plugin.statuses().len());

        show.apply(Command::Pause);
        show.apply(Command::Pause);
        assert_eq!(3, plugin.statuses().len());

        steps[0].finish();
        show.tick();
        steps[1].finish();
        assert!(show.tick());

        let statuses = plugin.statuses();
        assert_eq!(5, statuses.len());
        let last: serde_json::Value =
            serde_json::from_str(statuses.last().expect("status")).expect("json");
        assert_eq!(false, last["running"]);
        let first: serde_json::Value = serde_json::from_str(&statuses[0]).expect("json");
        assert_eq!("A", first["step"]);
    }

    #[test]
    fn test_paused_frames_skip_plugins() {
        let (mut show, _steps, _plugin) = show_of(&["A"]);
        show.apply(Command::Play {
            looping: true,
            random: false,
        });
        show.apply(Command::Pause);
        show.tick();
        assert_eq!(&[0u8; 4], show.buffer());
    }

    #[test]
    fn test_plugins_see_last_frame() {
        let (mut show, steps, _plugin) = show_of(&["A"]);
        show.apply(Command::Play {
            looping: false,
            random: false,
        });
        steps[0].finish();

        // The finishing frame still passes through the plugin, which inverts the zeroed buffer.
        assert!(show.tick());
        assert_eq!(&[255u8; 4], show.buffer());
        assert!(!show.playlist().is_running());
    }

    #[test]
    fn test_loop_and_force_commands() {
        let (mut show, steps, _plugin) = show_of(&["A", "B", "C"]);
        show.apply(Command::Play {
            looping: true,
            random: false,
        });
        assert!(show.apply(Command::LoopStep("B".to_string())));
        steps[1].finish();
        show.tick();
        assert_eq!(Some("B".to_string()), current_name(&show));

        assert!(show.apply(Command::ForceNext("A".to_string())));
        steps[1].finish();
        show.tick();
        assert_eq!(Some("A".to_string()), current_name(&show));

        assert!(!show.apply(Command::JumpToEnd));
        assert!(show.apply(Command::Restart));
        steps[0].finish();
        assert!(show.tick());
    }

    #[tokio::test]
    async fn test_run() {
        let mut playlist = Playlist::new("Timed");
        playlist.push_step(Box::new(
            TimedStep::new("Flash", Duration::from_millis(20)).with_fill(100),
        ));
        playlist.push_step(Box::new(
            TimedStep::new("Hold", Duration::from_secs(60)).with_fill(200),
        ));
        let show = Show::new(playlist, PluginHost::new(Path::new("/show")), 8);

        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(show.run(rx, Duration::from_millis(5)));

        tx.send(Command::Play {
            looping: false,
            random: false,
        })
        .await
        .expect("send");
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(Command::StopAtEnd).await.expect("send");
        drop(tx);

        let show = handle.await.expect("join");
        assert!(!show.playlist().is_running());
        assert_eq!(&[200u8; 8], show.buffer());
    }
}
