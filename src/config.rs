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
use std::error::Error;
use std::path::Path;

use tracing::info;

use crate::controller::Controller;
use crate::plugin::PluginHost;

mod controller;
pub mod error;
mod playlist;
mod show;

pub use self::playlist::Playlist;
pub use self::show::Show;

/// Parse a playlist from a YAML file.
pub fn parse_playlist(path: &Path) -> Result<crate::playlist::Playlist, error::ConfigError> {
    Playlist::deserialize(path)?.to_playlist()
}

/// Initializes the show and its controller from the given config file and returns the
/// controller. The controller owns the show, which can be waited on until it exits.
pub fn init_show_and_controller(show_path: &Path) -> Result<Controller, Box<dyn Error>> {
    let show_config = Show::deserialize(show_path)?;
    let playlist = parse_playlist(&show_config.playlist_path())?;
    info!(
        playlist = playlist.name(),
        steps = playlist.store().len(),
        "Loaded playlist."
    );

    let plugins = PluginHost::new(&show_config.show_dir());
    let show = crate::show::Show::new(playlist, plugins, show_config.buffer_size());
    Ok(Controller::new(
        show,
        show_config.controller().driver(),
        show_config.frame_interval()?,
    ))
}
