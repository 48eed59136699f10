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
use bandhub::client::Client;
use bandhub::config;
use bandhub::controller::{keyboard, Controller};
use bandhub::credentials::CredentialStore;
use bandhub::mixer::MixerState;
use bandhub::playback;
use bandhub::server::{Hub, ObservedLine, Server};
use bandhub::sounds::SoundBank;
use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=instrument trigger hub
After=network.target sound.target

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/bandhub
ExecStart=/usr/local/bin/bandhub start "$BANDHUB_CONFIG"
StandardInput=null

[Install]
WantedBy=multi-user.target
Alias=bandhub.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A trigger-and-playback hub for networked instruments."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will run the hub until interrupted.
    Start {
        /// The path to the hub config.
        config_path: String,
        /// The address to listen on, overriding the config.
        #[arg[short, long]]
        bind: Option<String>,
        /// The port to listen on, overriding the config.
        #[arg[short, long]]
        port: Option<u16>,
        /// Closes connections buffering more than this many bytes without a newline.
        #[arg[short, long]]
        max_line_length: Option<usize>,
        /// Logs triggers instead of playing them.
        #[arg[short, long]]
        dry_run: bool,
    },
    /// Connects to a hub as an instrument and sends commands.
    Send {
        /// The hub address, e.g. 127.0.0.1:5000.
        address: String,
        /// The client id to log in as.
        id: String,
        /// The client password.
        password: String,
        /// Command lines to send, e.g. [PIANO]C. Read from stdin if none are given.
        commands: Vec<String>,
    },
    /// Loads a hub config and verifies its credentials and sounds.
    Check {
        /// The path to the hub config.
        config_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli.command));

    // The keyboard console may still be blocked reading stdin.
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    result
}

async fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Start {
            config_path,
            bind,
            port,
            max_line_length,
            dry_run,
        } => {
            let mut config = config::Hub::deserialize(Path::new(&config_path))?;
            if let Some(bind) = bind {
                config = config.with_bind(&bind);
            }
            if let Some(port) = port {
                config = config.with_port(port);
            }
            if let Some(max_line_length) = max_line_length {
                config = config.with_max_line_length(max_line_length);
            }
            if dry_run {
                config = config.with_playback(config::Playback::Mock);
            }
            start(config).await?
        }
        Commands::Send {
            address,
            id,
            password,
            commands,
        } => {
            let mut client = Client::connect(address.as_str()).await?;
            print!("{}", client.banner());
            client.login(&id, &password).await?;

            if commands.is_empty() {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Some(line) = lines.next_line().await? {
                    client.send_line(&line).await?;
                }
            } else {
                for command in commands.iter() {
                    client.send_line(command).await?;
                }
            }
            client.close().await?;
        }
        Commands::Check { config_path } => check(Path::new(&config_path))?,
        Commands::Devices {} => {
            let devices = playback::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices.iter() {
                println!("- {}", device);
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}

fn sound_bank(config: &config::Hub) -> SoundBank {
    match config.sounds() {
        Some(directory) => SoundBank::from_directory(&directory),
        None => SoundBank::packaged(),
    }
}

/// Runs the hub with a keyboard mixer console until Ctrl-C.
async fn start(config: config::Hub) -> Result<(), Box<dyn Error>> {
    let credentials = CredentialStore::from_path(config.credentials().as_deref())?;
    info!(clients = credentials.len(), "Loaded credentials.");

    let backend = playback::get_backend(&config.playback(), sound_bank(&config))?;
    info!(backend = %backend, "Playback ready.");

    let mixer = Arc::new(MixerState::new());
    let hub = Arc::new(Hub::new(
        credentials,
        mixer.clone(),
        backend,
        config.max_line_length(),
    ));
    let display = tokio::spawn(display_lines(hub.subscribe()));
    let server = Server::start(hub, config.listen_address()?, config.backlog()).await?;
    let _controller = Controller::new(mixer.clone(), Arc::new(keyboard::Driver::new(mixer)))?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down.");
    server.stop().await;
    display.abort();
    Ok(())
}

/// Logs every raw line received by the hub.
async fn display_lines(mut lines: broadcast::Receiver<ObservedLine>) {
    loop {
        match lines.recv().await {
            Ok(observed) => info!(
                connection = %observed.connection,
                peer = %observed.peer,
                line = %observed.line.text(),
                "Received line."
            ),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Line display fell behind."),
            Err(RecvError::Closed) => return,
        }
    }
}

/// Verifies a hub config without starting it.
fn check(config_path: &Path) -> Result<(), Box<dyn Error>> {
    let config = config::Hub::deserialize(config_path)?;
    println!(
        "Listen address: {} (backlog {})",
        config.listen_address()?,
        config.backlog()
    );

    let credentials = CredentialStore::from_path(config.credentials().as_deref())?;
    println!("Credentials: {} client(s)", credentials.len());

    match config.playback() {
        config::Playback::Audio(audio) => println!(
            "Playback: audio on {} at {} Hz",
            audio.device().unwrap_or("the default device"),
            audio.sample_rate()
        ),
        config::Playback::External(external) => println!(
            "Playback: external ({}), temporary files kept for {:?}",
            external.players().join(", "),
            external.cleanup_delay()?
        ),
        config::Playback::Mock => println!("Playback: mock"),
    }

    let mut failures = 0;
    println!("Sounds:");
    for (sound, result) in sound_bank(&config).verify() {
        match result {
            Ok(()) => println!("- {}: ok", sound),
            Err(e) => {
                failures += 1;
                println!("- {}: {}", sound, e);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} sound(s) failed to verify", failures).into());
    }
    Ok(())
}
