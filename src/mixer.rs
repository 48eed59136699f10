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

//! Live per-instrument volume and mute state.

use parking_lot::RwLock;
use tracing::info;

use crate::instruments::Instrument;

const MAX_VOLUME: i32 = 100;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum MixerError {
    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),
}

/// The control surface the mixer exposes to the outside world.
pub trait MixerControl: Send + Sync {
    /// Sets an instrument's volume. The percentage is clamped to 0-100.
    fn set_volume(&self, instrument: &str, percent: i32) -> Result<(), MixerError>;

    /// Mutes or unmutes an instrument.
    fn set_mute(&self, instrument: &str, muted: bool) -> Result<(), MixerError>;
}

/// The mixer settings for one instrument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Channel {
    volume_percent: u8,
    muted: bool,
}

impl Default for Channel {
    fn default() -> Self {
        Channel {
            volume_percent: MAX_VOLUME as u8,
            muted: false,
        }
    }
}

impl Channel {
    /// The volume as a percentage in 0-100.
    pub fn volume_percent(&self) -> u8 {
        self.volume_percent
    }

    /// True if the instrument is muted.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// The linear gain to play at, or None if muted.
    pub fn gain(&self) -> Option<f32> {
        if self.muted {
            None
        } else {
            Some(f32::from(self.volume_percent.min(MAX_VOLUME as u8)) / MAX_VOLUME as f32)
        }
    }
}

/// Volume and mute state for every instrument. Writers are serialized; readers
/// always see the latest write.
#[derive(Debug, Default)]
pub struct MixerState {
    channels: RwLock<[Channel; 3]>,
}

impl MixerState {
    pub fn new() -> MixerState {
        MixerState::default()
    }

    /// Returns the current settings for an instrument.
    pub fn channel(&self, instrument: Instrument) -> Channel {
        self.channels.read()[instrument.slot()]
    }

    /// Returns the gain to play the instrument at right now, or None if muted.
    pub fn gain(&self, instrument: Instrument) -> Option<f32> {
        self.channel(instrument).gain()
    }

    /// Returns the settings of every instrument.
    pub fn snapshot(&self) -> Vec<(Instrument, Channel)> {
        let channels = self.channels.read();
        Instrument::ALL
            .into_iter()
            .map(|instrument| (instrument, channels[instrument.slot()]))
            .collect()
    }
}

impl MixerControl for MixerState {
    fn set_volume(&self, instrument: &str, percent: i32) -> Result<(), MixerError> {
        let instrument = instrument.parse::<Instrument>()?;
        let volume_percent = percent.clamp(0, MAX_VOLUME) as u8;
        self.channels.write()[instrument.slot()].volume_percent = volume_percent;
        info!(%instrument, volume_percent, "Mixer volume changed.");
        Ok(())
    }

    fn set_mute(&self, instrument: &str, muted: bool) -> Result<(), MixerError> {
        let instrument = instrument.parse::<Instrument>()?;
        self.channels.write()[instrument.slot()].muted = muted;
        info!(%instrument, muted, "Mixer mute changed.");
        Ok(())
    }
}
