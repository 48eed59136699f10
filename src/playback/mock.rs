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
use std::fmt;

use parking_lot::Mutex;
use tracing::info;

use super::PlaybackError;
use crate::sounds::SoundId;

/// A recorded call to play.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Play {
    pub sound: SoundId,
    pub gain: f32,
}

/// A mock backend. Doesn't actually play anything, just records what it was
/// asked to play.
pub struct Backend {
    name: String,
    plays: Mutex<Vec<Play>>,
}

impl Backend {
    pub fn new(name: &str) -> Backend {
        Backend {
            name: name.to_string(),
            plays: Mutex::new(Vec::new()),
        }
    }

    /// Every play so far, oldest first.
    pub fn plays(&self) -> Vec<Play> {
        self.plays.lock().clone()
    }
}

impl super::Backend for Backend {
    fn play(&self, sound: SoundId, gain: f32) -> Result<(), PlaybackError> {
        info!(backend = self.name, %sound, gain, "Playing sound.");
        self.plays.lock().push(Play { sound, gain });
        Ok(())
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
