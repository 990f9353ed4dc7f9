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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::controller::Controller;
use super::error::ConfigError;
use crate::util::resolve_relative;

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_BUFFER_SIZE: usize = 512;

/// The configuration for running a show.
#[derive(Deserialize)]
pub struct Show {
    /// The controller configuration.
    controller: Controller,
    /// The path to the playlist, relative to this file.
    playlist: String,
    /// How often a frame is rendered, e.g. "25ms". Defaults to 50ms.
    frame_interval: Option<String>,
    /// The number of channels in each frame. Defaults to one DMX universe.
    buffer_size: Option<usize>,
    /// The directory handed to plugins. Defaults to the directory holding this file.
    show_dir: Option<String>,
    /// The path this configuration was read from.
    #[serde(skip)]
    path: PathBuf,
}

impl Show {
    /// Parse a show configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Show, ConfigError> {
        let mut show = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Show>()?;
        show.path = path.to_path_buf();
        Ok(show)
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// The resolved path to the playlist.
    pub fn playlist_path(&self) -> PathBuf {
        resolve_relative(&self.path, &self.playlist)
    }

    /// The resolved show directory.
    pub fn show_dir(&self) -> PathBuf {
        match &self.show_dir {
            Some(show_dir) => resolve_relative(&self.path, show_dir),
            None => resolve_relative(&self.path, "."),
        }
    }

    /// Gets the frame interval.
    pub fn frame_interval(&self) -> Result<Duration, ConfigError> {
        self.frame_interval
            .as_ref()
            .map_or(Ok(DEFAULT_FRAME_INTERVAL), |duration| {
                Ok(DurationString::from_string(duration.clone())
                    .map_err(|e| ConfigError::duration("frame_interval", duration, e))?
                    .into())
            })
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, time::Duration};

    use super::{Controller, Show};

    #[test]
    fn test_deserialize() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("show.yaml");
        fs::write(
            &path,
            "controller:\n  kind: keyboard\nplaylist: playlists/main.yaml\nframe_interval: 25ms\nbuffer_size: 1024\n",
        )?;

        let show = Show::deserialize(&path)?;
        assert_eq!(&Controller::Keyboard, show.controller());
        assert_eq!(dir.path().join("playlists/main.yaml"), show.playlist_path());
        assert_eq!(dir.path().join("."), show.show_dir());
        assert_eq!(Duration::from_millis(25), show.frame_interval()?);
        assert_eq!(1024, show.buffer_size());
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("show.yaml");
        fs::write(
            &path,
            "controller:\n  kind: keyboard\nplaylist: /abs/main.yaml\nframe_interval: whenever\n",
        )?;

        let show = Show::deserialize(&path)?;
        assert_eq!(std::path::PathBuf::from("/abs/main.yaml"), show.playlist_path());
        assert_eq!(512, show.buffer_size());
        assert!(show.frame_interval().is_err());
        Ok(())
    }
}
