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
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use config::{Config, File};
use serde::Deserialize;

use super::{error::ConfigError, playback::Playback};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_BACKLOG: u32 = 50;

/// The configuration for the hub.
#[derive(Deserialize, Clone)]
pub struct Hub {
    /// The address to listen on. Defaults to all interfaces.
    bind: Option<String>,

    /// The TCP port to listen on.
    port: Option<u16>,

    /// The listen backlog.
    backlog: Option<u32>,

    /// Path to the credentials file. Uses the packaged credentials when unset.
    credentials: Option<String>,

    /// Path to a directory of sound assets. Uses the packaged sounds when unset.
    sounds: Option<String>,

    /// Maximum number of buffered bytes without a line terminator before a
    /// connection is closed. Unbounded when unset.
    max_line_length: Option<usize>,

    /// How sounds are played.
    playback: Option<Playback>,

    /// The directory relative paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// Creates a hub configuration with every setting at its default.
    pub fn new() -> Hub {
        Hub {
            bind: None,
            port: None,
            backlog: None,
            credentials: None,
            sounds: None,
            max_line_length: None,
            playback: None,
            base_path: PathBuf::new(),
        }
    }

    /// Parse a hub configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Hub, ConfigError> {
        let mut hub = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Hub>()?;
        hub.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(hub)
    }

    /// Overrides the bind address.
    pub fn with_bind(mut self, bind: &str) -> Hub {
        self.bind = Some(bind.to_string());
        self
    }

    /// Overrides the port.
    pub fn with_port(mut self, port: u16) -> Hub {
        self.port = Some(port);
        self
    }

    /// Overrides the playback strategy.
    pub fn with_playback(mut self, playback: Playback) -> Hub {
        self.playback = Some(playback);
        self
    }

    /// Overrides the line length cap.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Hub {
        self.max_line_length = Some(max_line_length);
        self
    }

    /// Returns the socket address to listen on.
    pub fn listen_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip = match &self.bind {
            Some(bind) => bind
                .trim()
                .parse::<IpAddr>()
                .map_err(|source| ConfigError::Address {
                    address: bind.clone(),
                    source,
                })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        Ok(SocketAddr::new(ip, self.port()))
    }

    /// Returns the TCP port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Returns the listen backlog.
    pub fn backlog(&self) -> u32 {
        self.backlog.unwrap_or(DEFAULT_BACKLOG)
    }

    /// Returns the credentials file, resolved against the config directory.
    pub fn credentials(&self) -> Option<PathBuf> {
        self.credentials.as_deref().map(|path| self.resolve(path))
    }

    /// Returns the sound directory, resolved against the config directory.
    pub fn sounds(&self) -> Option<PathBuf> {
        self.sounds.as_deref().map(|path| self.resolve(path))
    }

    /// Returns the line length cap, if any.
    pub fn max_line_length(&self) -> Option<usize> {
        self.max_line_length
    }

    /// Returns the playback strategy. Defaults to the audio device.
    pub fn playback(&self) -> Playback {
        self.playback.clone().unwrap_or_default()
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.base_path.join(path)
        }
    }
}
