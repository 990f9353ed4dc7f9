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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use crate::show::Command;

const PLAY: &str = "play";
const LOOP: &str = "loop";
const RANDOM: &str = "random";
const STOP: &str = "stop";
const NEXT: &str = "next";
const PREV: &str = "prev";
const RESTART: &str = "restart";
const PAUSE: &str = "pause";
const END: &str = "end";
const STOP_AT_END: &str = "stopend";
const JUMP: &str = "jump";
const LOOP_STEP: &str = "loopstep";
const FORCE: &str = "force";

/// A controller that controls a show using the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Parses one line of input. Step names keep their case; everything else is case
    /// insensitive.
    fn parse(input: &str) -> Option<Command> {
        let input = input.trim();
        let (verb, step) = match input.split_once(char::is_whitespace) {
            Some((verb, step)) => (verb, step.trim()),
            None => (input, ""),
        };

        let command = match (verb.to_lowercase().as_str(), step) {
            (PLAY, "") => Command::Play {
                looping: false,
                random: false,
            },
            (LOOP, "") => Command::Play {
                looping: true,
                random: false,
            },
            (RANDOM, "") => Command::Play {
                looping: true,
                random: true,
            },
            (STOP, "") => Command::Stop,
            (NEXT, "") => Command::Next,
            (PREV, "") => Command::Prev,
            (RESTART, "") => Command::Restart,
            (PAUSE, "") => Command::Pause,
            (END, "") => Command::JumpToEnd,
            (STOP_AT_END, "") => Command::StopAtEnd,
            (JUMP, step) if !step.is_empty() => Command::JumpTo(step.to_string()),
            (LOOP_STEP, step) if !step.is_empty() => Command::LoopStep(step.to_string()),
            (FORCE, step) if !step.is_empty() => Command::ForceNext(step.to_string()),
            _ => return None,
        };
        Some(command)
    }

    /// Reads and forwards one command. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Command>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {} <step>, {} <step>, {} <step>): ",
            PLAY,
            LOOP,
            RANDOM,
            STOP,
            NEXT,
            PREV,
            RESTART,
            PAUSE,
            END,
            STOP_AT_END,
            JUMP,
            LOOP_STEP,
            FORCE,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        match Self::parse(&input) {
            Some(command) => events_tx
                .blocking_send(command)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard input closed.");
            Ok(())
        })
    }
}
