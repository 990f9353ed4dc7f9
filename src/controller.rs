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
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, span, Level};

use crate::show::{Command, Show};

pub mod keyboard;

/// How many commands can queue up before drivers have to wait for the show.
const COMMAND_BUFFER: usize = 16;

/// A source of commands for a show.
pub trait Driver: Send + Sync + 'static {
    /// Watches for commands and sends them on. The show stops once every sender is dropped.
    fn monitor_events(&self, events_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>>;
}

/// Controls a show.
pub struct Controller {
    handle: JoinHandle<Show>,
}

impl Controller {
    /// Creates a new controller, which starts running the show with commands from the driver.
    pub fn new(show: Show, driver: Arc<dyn Driver>, frame_interval: Duration) -> Controller {
        Controller {
            handle: tokio::spawn(Controller::run(show, driver, frame_interval)),
        }
    }

    /// Join will block until the driver stops and the show winds down, handing the show back.
    pub async fn join(&mut self) -> Result<Show, JoinError> {
        (&mut self.handle).await
    }

    async fn run(show: Show, driver: Arc<dyn Driver>, frame_interval: Duration) -> Show {
        let span = span!(Level::INFO, "controller");

        let (events_tx, events_rx) = mpsc::channel(COMMAND_BUFFER);
        let join_handle = driver.monitor_events(events_tx);

        {
            let _enter = span.enter();
            info!(playlist = show.playlist().name(), "Controller started.");
        }

        let show = show.run(events_rx, frame_interval).await;

        let driver_result = join_handle.await;
        let _enter = span.enter();
        match driver_result {
            Ok(Ok(())) => info!("Controller closing."),
            Ok(Err(e)) => error!(err = %e, "Driver stopped with an error."),
            Err(e) => error!(err = %e, "Error waiting for driver to stop."),
        }
        show
    }
}
