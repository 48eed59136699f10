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
    error::Error,
    fmt,
    io::Cursor,
    thread,
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{
    playback::{self, mock, Backend as _, PlaybackError},
    sounds::SoundId,
};

const TIMEOUT: Duration = Duration::from_secs(3);
const TICK: Duration = Duration::from_millis(10);

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    loop {
        if start.elapsed() > TIMEOUT {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(TICK);
    }
}

/// Wait for the given async predicate to return true or fail.
#[inline]
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    loop {
        if start.elapsed() > TIMEOUT {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(TICK).await;
    }
}

/// Encodes mono 16 bit samples as an in-memory WAV file.
pub fn wav_bytes(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )?;
        for sample in samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// A backend that can't play one sound and records every other play.
pub struct FailingBackend {
    failing: SoundId,
    recorder: mock::Backend,
}

impl FailingBackend {
    pub fn new(failing: SoundId) -> FailingBackend {
        FailingBackend {
            failing,
            recorder: mock::Backend::new("failing"),
        }
    }

    pub fn plays(&self) -> Vec<mock::Play> {
        self.recorder.plays()
    }
}

impl playback::Backend for FailingBackend {
    fn play(&self, sound: SoundId, gain: f32) -> Result<(), PlaybackError> {
        if sound == self.failing {
            return Err(PlaybackError::MissingAsset(sound.file_name()));
        }
        self.recorder.play(sound, gain)
    }
}

impl fmt::Display for FailingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Failing)", self.recorder)
    }
}
