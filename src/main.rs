// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod config;
mod display;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use flight_stream::{Client, ClientError, ConnectionState, Notice, Trajectory};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "flightwatch", version, about = "Terminal client for a live flight tracking feed")]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long)]
    url: Option<String>,

    /// User id sent in the join request
    #[arg(long)]
    user_id: Option<String>,

    /// Display name sent in the join request
    #[arg(short = 'n', long)]
    username: Option<String>,

    /// Seconds to wait before reconnecting after an unexpected close
    #[arg(long, value_name = "SECS")]
    reconnect_delay: Option<u64>,

    /// Seconds between status summaries (0 disables them)
    #[arg(long, value_name = "SECS")]
    summary_secs: Option<u64>,

    /// Directory for single-session lock files
    #[arg(long, value_name = "DIR")]
    lock_dir: Option<PathBuf>,

    /// Allow a second local session for the same user id
    #[arg(long, default_value_t = false)]
    no_session_guard: bool,

    /// Replace a leftover session lock
    #[arg(long, default_value_t = false)]
    force: bool,

    /// Persist the effective settings to the config file
    #[arg(long, default_value_t = false)]
    save_config: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.url {
            config.server_url.clone_from(url);
        }
        if let Some(user_id) = &self.user_id {
            config.user_id.clone_from(user_id);
        }
        if let Some(username) = &self.username {
            config.username.clone_from(username);
        }
        if let Some(delay) = self.reconnect_delay {
            config.reconnect_delay_secs = delay;
        }
        if let Some(secs) = self.summary_secs {
            config.summary_interval_secs = secs;
        }
        if self.no_session_guard {
            config.single_session = false;
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {e}");
        AppConfig::default()
    });
    args.apply(&mut config);

    if args.save_config {
        match config.save() {
            Ok(()) => {
                if let Ok(path) = AppConfig::get_config_path() {
                    info!("Configuration saved to {}", path.display());
                }
            }
            Err(e) => warn!("Failed to save config: {e}"),
        }
    }

    if let Err(e) = run(&config, &args).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: &AppConfig, args: &Args) -> Result<(), ClientError> {
    let mut client_config = config.client_config();
    client_config.force_lock = args.force;
    if config.single_session {
        if let Some(dir) = &args.lock_dir {
            client_config.lock_dir = Some(dir.clone());
        }
    }

    info!(
        "Joining {} as '{}' ({})",
        config.server_url, config.username, config.user_id
    );
    let mut client = Client::spawn(client_config)?;
    let mut notices = client.subscribe();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let summary_period = Duration::from_secs(config.summary_interval_secs.max(1));
    let mut summary = tokio::time::interval(summary_period);
    summary.tick().await;
    let mut chat_seen = 0;

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    println!("{}", display::notice_line(&notice));
                    if matches!(notice, Notice::Denied { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {skipped} notices"),
                Err(RecvError::Closed) => break,
            },

            line = input.next_line() => match line {
                Ok(Some(line)) if line.trim() == "/quit" => break,
                Ok(Some(line)) if line.trim() == "/flights" => {
                    print!("{}", display::flight_table(&client.flights()));
                }
                Ok(Some(line)) => {
                    client.send_chat(&line);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read input: {e}");
                    break;
                }
            },

            _ = summary.tick(), if config.summary_interval_secs > 0 => {
                print_summary(&client, &mut chat_seen);
            }

            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for ctrl-c: {e}");
                }
                break;
            }
        }

        if client.connection_state() == ConnectionState::Denied {
            break;
        }
    }

    info!("Shutting down...");
    client.disconnect();
    client.closed().await;
    Ok(())
}

fn print_summary(client: &Client, chat_seen: &mut usize) {
    let (planes, flying) = client
        .with_state(|state| {
            let rows: Vec<_> = state
                .planes()
                .planes()
                .map(|plane| {
                    let points = state
                        .trajectories()
                        .get(&plane.flight_id)
                        .map_or(0, Trajectory::point_count);
                    (plane.clone(), state.heading(&plane.flight_id), points)
                })
                .collect();
            (rows, state.flying_count())
        })
        .unwrap_or_default();
    let stats = client.router_stats();

    println!(
        "-- {} {:?}: {} flights, {} planes ({} flying), {} crash markers, {} frames ({} unknown, {} malformed)",
        chrono::Local::now().format("%X"),
        client.connection_state(),
        client.flights().len(),
        planes.len(),
        flying,
        client.crash_sites().len(),
        stats.routed,
        stats.unknown,
        stats.malformed
    );
    print!("{}", display::plane_lines(&planes));
    for site in client.crash_sites() {
        println!("{}", display::crash_line(&site));
    }

    let chat = client.chat_since(*chat_seen);
    *chat_seen += chat.len();
    for entry in &chat {
        println!("{}", display::chat_line(entry));
    }
}
