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
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use showlist::config;
use showlist::step::Step as _;
use showlist::util::duration_minutes_seconds;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=lighting show playlist player

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/showlist
ExecStart=/usr/local/bin/showlist start "$SHOWLIST_CONFIG"
ExecReload=/bin/kill -HUP $MAINPID

[Install]
WantedBy=multi-user.target
Alias=showlist.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A lighting show playlist player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verifies a playlist and lists its steps.
    Verify {
        /// The path to the playlist.
        playlist_path: String,
    },
    /// Walks through a playlist's transitions without playing anything.
    Simulate {
        /// The path to the playlist.
        playlist_path: String,
        /// Wrap around at the end of the playlist.
        #[arg(short, long)]
        looping: bool,
        /// Pick steps at random.
        #[arg(short, long)]
        random: bool,
        /// The number of transitions to walk through.
        #[arg(short, long, default_value_t = 20)]
        transitions: usize,
        /// Seeds random selection so runs can be repeated.
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Start will start the show.
    Start {
        /// The path to the show config.
        show_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify { playlist_path } => {
            let playlist = config::parse_playlist(&PathBuf::from(&playlist_path))?;
            if playlist.store().is_empty() {
                println!("No steps found in {}.", playlist_path);
                return Ok(());
            }

            print!("{}", playlist);
            println!(
                "Total length: {}",
                duration_minutes_seconds(playlist.length())
            );
        }
        Commands::Simulate {
            playlist_path,
            looping,
            random,
            transitions,
            seed,
        } => {
            let mut playlist = config::parse_playlist(&PathBuf::from(&playlist_path))?;
            if let Some(seed) = seed {
                playlist.reseed(seed);
            }

            playlist.start(looping, random);
            if !playlist.is_running() {
                println!("Playlist has no steps.");
                return Ok(());
            }

            let mut position = 1;
            while let Some(step) = playlist.current_step() {
                println!("{:>4}. {}", position, step.name());
                if position > transitions || !playlist.jump_to_next_step() {
                    break;
                }
                position += 1;
            }
            playlist.stop();
        }
        Commands::Start { show_path } => {
            let mut controller = config::init_show_and_controller(&PathBuf::from(show_path))?;
            controller.join().await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE);
        }
    };

    Ok(())
}
