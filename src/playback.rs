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

//! Playback backends. Each one turns `play(sound, gain)` into audible output
//! without blocking the caller.

use std::{error::Error, fmt, io, sync::Arc};

use crate::{config, sounds::SoundBank, sounds::SoundId};

pub mod cpal;
pub mod external;
pub mod mock;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("sound asset {0} not found")]
    MissingAsset(String),

    #[error("unable to read {name}: {source}")]
    Read { name: String, source: io::Error },

    #[error("unable to decode {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("{sound} is unavailable: {reason}")]
    Unavailable { sound: String, reason: String },

    #[error("no audio player found (tried {0})")]
    NoPlayer(String),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("playback runtime unavailable: {0}")]
    Runtime(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub trait Backend: fmt::Display + Send + Sync {
    /// Starts playing the sound at the given linear gain and returns
    /// immediately.
    fn play(&self, sound: SoundId, gain: f32) -> Result<(), PlaybackError>;
}

/// Creates the backend described by the configuration.
pub fn get_backend(
    config: &config::Playback,
    bank: SoundBank,
) -> Result<Arc<dyn Backend>, Box<dyn Error>> {
    Ok(match config {
        config::Playback::Audio(audio) => Arc::new(cpal::Backend::new(audio, &bank)),
        config::Playback::External(external) => Arc::new(external::Backend::new(external, bank)?),
        config::Playback::Mock => Arc::new(mock::Backend::new("mock")),
    })
}

/// Lists the audio output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, Box<dyn Error>> {
    cpal::list()
}
