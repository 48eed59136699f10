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

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_PLAYERS: [&str; 3] = ["paplay", "ffplay", "aplay"];

/// Selects how triggered sounds reach the speakers.
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Playback {
    /// Pooled effects mixed in-process on an audio output device.
    Audio(AudioPlayback),
    /// Detached external player processes.
    External(ExternalPlayback),
    /// Records plays without producing sound.
    Mock,
}

impl Default for Playback {
    fn default() -> Self {
        Playback::Audio(AudioPlayback::default())
    }
}

/// Settings for in-process playback.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct AudioPlayback {
    /// The output device name. Uses the host default when unset or "default".
    device: Option<String>,

    /// The output sample rate. Sound assets must match it.
    sample_rate: Option<u32>,
}

impl AudioPlayback {
    /// Returns the device name, or None for the host default.
    pub fn device(&self) -> Option<&str> {
        match self.device.as_deref() {
            None | Some("default") => None,
            Some(device) => Some(device),
        }
    }

    /// Returns the output sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}

/// Settings for external player playback.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ExternalPlayback {
    /// Player commands in priority order.
    players: Option<Vec<String>>,

    /// How long to keep a materialized temporary file around.
    cleanup_delay: Option<String>,
}

impl ExternalPlayback {
    /// Creates an external playback configuration.
    pub fn new(players: Vec<String>, cleanup_delay: Option<&str>) -> ExternalPlayback {
        ExternalPlayback {
            players: Some(players),
            cleanup_delay: cleanup_delay.map(str::to_string),
        }
    }

    /// Returns the player commands in priority order.
    pub fn players(&self) -> Vec<String> {
        match &self.players {
            Some(players) if !players.is_empty() => players.clone(),
            _ => DEFAULT_PLAYERS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Returns the temporary file cleanup delay (default: 10s).
    pub fn cleanup_delay(&self) -> Result<Duration, ConfigError> {
        match &self.cleanup_delay {
            Some(value) => DurationString::from_string(value.clone())
                .map(Duration::from)
                .map_err(|e| ConfigError::Duration {
                    value: value.clone(),
                    reason: e.to_string(),
                }),
            None => Ok(DEFAULT_CLEANUP_DELAY),
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{AudioPlayback, ExternalPlayback};

    #[test]
    fn test_external_defaults() {
        let external = ExternalPlayback::default();
        assert_eq!(external.players(), vec!["paplay", "ffplay", "aplay"]);
        assert_eq!(external.cleanup_delay().ok(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_external_bad_delay() {
        let external = ExternalPlayback::new(vec!["aplay".into()], Some("soon"));
        assert!(external.cleanup_delay().is_err());
    }

    #[test]
    fn test_audio_defaults() {
        let audio = AudioPlayback::default();
        assert_eq!(audio.device(), None);
        assert_eq!(audio.sample_rate(), 44100);
    }
}
