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
use std::path::Path;
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::step::TimedStep;

/// The configuration for a playlist.
#[derive(Deserialize)]
pub struct Playlist {
    /// The name of the playlist. Defaults to the file name.
    name: Option<String>,
    /// The first step only plays at the start of a run.
    #[serde(default)]
    first_once: bool,
    /// The last step only plays as an end step.
    #[serde(default)]
    last_once: bool,
    /// The steps, in playback order.
    steps: Vec<Step>,
    /// Schedules that travel with the playlist.
    #[serde(default)]
    schedules: Vec<Schedule>,
}

/// The configuration for a single timed step.
#[derive(Deserialize)]
pub struct Step {
    /// The name of the step.
    name: String,
    /// How long the step plays for, e.g. "30s" or "2m".
    duration: String,
    /// The value written to every channel while the step plays.
    fill: Option<u8>,
}

#[derive(Deserialize)]
pub struct Schedule {
    name: String,
    enabled: Option<bool>,
    start: String,
    end: String,
}

impl Step {
    /// Creates a new step configuration.
    pub fn new(name: &str, duration: &str, fill: Option<u8>) -> Step {
        Step {
            name: name.to_string(),
            duration: duration.to_string(),
            fill,
        }
    }

    fn length(&self) -> Result<Duration, ConfigError> {
        Ok(DurationString::from_string(self.duration.clone())
            .map_err(|e| ConfigError::duration(&format!("step '{}'", self.name), &self.duration, e))?
            .into())
    }

    fn to_step(&self) -> Result<TimedStep, ConfigError> {
        let step = TimedStep::new(&self.name, self.length()?);
        Ok(match self.fill {
            Some(fill) => step.with_fill(fill),
            None => step,
        })
    }
}

impl Playlist {
    /// Creates a new playlist configuration.
    pub fn new(name: Option<&str>, first_once: bool, last_once: bool, steps: Vec<Step>) -> Playlist {
        Playlist {
            name: name.map(str::to_string),
            first_once,
            last_once,
            steps,
            schedules: Vec::new(),
        }
    }

    /// Parse a playlist from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Playlist, ConfigError> {
        let mut playlist = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Playlist>()?;

        if playlist.name.is_none() {
            playlist.name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string);
        }
        Ok(playlist)
    }

    /// Builds a playlist from the configuration. Steps keep the order they were listed in.
    pub fn to_playlist(&self) -> Result<crate::playlist::Playlist, ConfigError> {
        let mut playlist = crate::playlist::Playlist::new(self.name.as_deref().unwrap_or(""));
        playlist.set_first_step_only_once(self.first_once);
        playlist.set_last_step_only_once(self.last_once);

        for step in self.steps.iter() {
            playlist.push_step(Box::new(step.to_step()?));
        }
        for schedule in self.schedules.iter() {
            playlist.add_schedule(crate::playlist::Schedule {
                name: schedule.name.clone(),
                enabled: schedule.enabled.unwrap_or(true),
                start: schedule.start.clone(),
                end: schedule.end.clone(),
            });
        }

        playlist.clear_dirty();
        Ok(playlist)
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, time::Duration};

    use super::{Playlist, Step};

    #[test]
    fn test_deserialize() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("xmas.yaml");
        fs::write(
            &path,
            r#"
first_once: true
steps:
  - name: Welcome
    duration: 15s
  - name: Chase
    duration: 2m
    fill: 128
  - name: Alpha
    duration: 90s
  - name: Goodnight
    duration: 10s
schedules:
  - name: Evenings
    start: "18:00"
    end: "23:00"
"#,
        )?;

        let playlist = Playlist::deserialize(&path)?.to_playlist()?;
        assert_eq!("xmas", playlist.name());
        assert!(playlist.first_step_only_once());
        assert!(!playlist.last_step_only_once());
        assert!(!playlist.is_dirty());

        // Order is kept exactly as listed, not sorted.
        let names: Vec<&str> = playlist
            .store()
            .iter()
            .map(|(_, step)| step.name_no_time())
            .collect();
        assert_eq!(vec!["Welcome", "Chase", "Alpha", "Goodnight"], names);
        assert_eq!(Duration::from_secs(235), playlist.length());

        let schedules = playlist.store().schedules();
        assert_eq!(1, schedules.len());
        assert!(schedules[0].enabled);
        assert_eq!("18:00", schedules[0].start);
        Ok(())
    }

    #[test]
    fn test_explicit_name() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("playlist.yaml");
        fs::write(
            &path,
            "name: Halloween\nlast_once: true\nsteps:\n  - name: Spooky\n    duration: 5s\n",
        )?;

        let playlist = Playlist::deserialize(&path)?.to_playlist()?;
        assert_eq!("Halloween", playlist.name());
        assert!(playlist.last_step_only_once());
        Ok(())
    }

    #[test]
    fn test_bad_duration() {
        let config = Playlist::new(None, false, false, vec![Step::new("Broken", "soon", None)]);
        let err = config.to_playlist().err().expect("duration should not parse");
        assert!(err.to_string().contains("step 'Broken'"));
    }
}
