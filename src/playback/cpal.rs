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
use std::{error::Error, fmt, io::Cursor, sync::Arc, thread};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, SizedSample,
};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::{error, info, span, warn, Level};

use super::PlaybackError;
use crate::{
    config,
    sounds::{SoundBank, SoundId},
};

/// Input frames handed to the resampler at a time.
const RESAMPLE_BLOCK_SIZE: usize = 1024;

/// One persistent playback handle per sound.
struct Voice {
    samples: Arc<[f32]>,
    /// Next frame to play. Idle once it reaches the end of the samples.
    position: usize,
    gain: f32,
}

impl Voice {
    fn new(samples: Vec<f32>) -> Voice {
        let position = samples.len();
        Voice {
            samples: samples.into(),
            position,
            gain: 0.0,
        }
    }

    fn is_playing(&self) -> bool {
        self.position < self.samples.len()
    }
}

/// The preloaded sound effects and their playback state. Lives on the audio
/// callback; triggers reach it through a channel.
pub(crate) struct EffectPool {
    voices: Vec<Voice>,
}

impl EffectPool {
    /// Decodes every sound in the bank at the output sample rate. A sound that
    /// fails to load gets a silent voice, and its error is returned at its
    /// index.
    pub(crate) fn load(
        bank: &SoundBank,
        sample_rate: u32,
    ) -> (EffectPool, Vec<Option<PlaybackError>>) {
        let mut voices = Vec::with_capacity(SoundId::COUNT);
        let mut failures = Vec::with_capacity(SoundId::COUNT);
        for sound in SoundId::all() {
            let asset = bank.asset(sound);
            match asset
                .load()
                .and_then(|data| decode(&data, &asset.name(), sample_rate))
            {
                Ok(samples) => {
                    voices.push(Voice::new(samples));
                    failures.push(None);
                }
                Err(e) => {
                    warn!(%sound, err = %e, "Unable to load sound, it will not play.");
                    voices.push(Voice::new(Vec::new()));
                    failures.push(Some(e));
                }
            }
        }
        (EffectPool { voices }, failures)
    }

    /// Restarts the sound from the beginning at the given gain, cutting off
    /// whatever it was already playing.
    pub(crate) fn trigger(&mut self, index: usize, gain: f32) {
        if let Some(voice) = self.voices.get_mut(index) {
            voice.position = 0;
            voice.gain = gain;
        }
    }

    /// Mixes the active voices into an interleaved output buffer.
    pub(crate) fn render(&mut self, output: &mut [f32], channels: usize) {
        output.fill(0.0);
        let channels = channels.max(1);
        for voice in self.voices.iter_mut().filter(|voice| voice.is_playing()) {
            for frame in output.chunks_mut(channels) {
                let Some(sample) = voice.samples.get(voice.position) else {
                    break;
                };
                let sample = sample * voice.gain;
                frame.iter_mut().for_each(|out| *out += sample);
                voice.position += 1;
            }
        }
        output
            .iter_mut()
            .for_each(|out| *out = out.clamp(-1.0, 1.0));
    }
}

/// Decodes a WAV file into mono f32 samples at the given sample rate.
fn decode(data: &[u8], name: &str, sample_rate: u32) -> Result<Vec<f32>, PlaybackError> {
    let decode_error = |reason: String| PlaybackError::Decode {
        name: name.to_string(),
        reason,
    };

    let reader = hound::WavReader::new(Cursor::new(data)).map_err(|e| decode_error(e.to_string()))?;
    let spec = reader.spec();

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<f32>, hound::Error>>(),
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|sample| sample as f32 * scale))
                .collect::<Result<Vec<f32>, hound::Error>>()
        }
    }
    .map_err(|e| decode_error(e.to_string()))?;

    let channels = usize::from(spec.channels.max(1));
    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    resample(mono, spec.sample_rate, sample_rate).map_err(decode_error)
}

/// Converts mono samples between sample rates. The resampler's delay is cut
/// off so the sound still starts on its first frame.
fn resample(samples: Vec<f32>, from: u32, to: u32) -> Result<Vec<f32>, String> {
    if from == to || samples.is_empty() {
        return Ok(samples);
    }

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = f64::from(to) / f64::from(from);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, RESAMPLE_BLOCK_SIZE, 1)
        .map_err(|e| format!("unable to resample from {} to {}: {}", from, to, e))?;
    let resample_error = |e: rubato::ResampleError| format!("resampling failed: {}", e);

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay);

    let mut blocks = samples.chunks_exact(RESAMPLE_BLOCK_SIZE);
    for block in blocks.by_ref() {
        let resampled = resampler.process(&[block], None).map_err(resample_error)?;
        output.extend_from_slice(&resampled[0]);
    }
    let remainder = blocks.remainder();
    if !remainder.is_empty() {
        let resampled = resampler
            .process_partial(Some(&[remainder][..]), None)
            .map_err(resample_error)?;
        output.extend_from_slice(&resampled[0]);
    }

    // Flush whatever is still held back by the filter.
    while output.len() < expected + delay {
        let resampled = resampler
            .process_partial::<Vec<f32>>(None, None)
            .map_err(resample_error)?;
        if resampled[0].is_empty() {
            break;
        }
        output.extend_from_slice(&resampled[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

/// Plays sounds through a cpal output device.
pub struct Backend {
    name: String,
    triggers: crossbeam_channel::Sender<(usize, f32)>,
    /// Why each sound failed to load, by sound index.
    unavailable: Vec<Option<String>>,
    /// Set if the output stream could not be started.
    device_error: Option<String>,
    /// Dropped to stop the output thread.
    _shutdown: crossbeam_channel::Sender<()>,
}

impl Backend {
    /// Opens the configured device, preloads every sound and starts the output
    /// stream. Sounds that fail to load and a device that fails to open are
    /// logged here and reported again on every trigger they affect.
    pub fn new(config: &config::AudioPlayback, bank: &SoundBank) -> Backend {
        let sample_rate = config.sample_rate();
        let (pool, failures) = EffectPool::load(bank, sample_rate);
        let unavailable: Vec<Option<String>> = failures
            .into_iter()
            .map(|failure| failure.map(|e| e.to_string()))
            .collect();
        info!(
            sounds = unavailable.iter().filter(|failure| failure.is_none()).count(),
            sample_rate,
            "Loaded sound effects."
        );

        let (triggers, trigger_rx) = crossbeam_channel::unbounded();
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let device_name = config.device().map(str::to_string);

        // cpal streams can't leave the thread that created them.
        thread::spawn(move || {
            let span = span!(Level::INFO, "audio output");
            let _enter = span.enter();

            let stream = match open_stream(device_name.as_deref(), sample_rate, pool, trigger_rx) {
                Ok((name, stream)) => {
                    let _ = ready_tx.send(Ok(name));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            // Returns once the backend is dropped.
            let _ = shutdown_rx.recv();
            drop(stream);
            info!("Audio output stopped.");
        });

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(PlaybackError::Device("audio output thread exited".to_string())));
        let (name, device_error) = match ready {
            Ok(name) => {
                info!(device = name, "Audio output started.");
                (name, None)
            }
            Err(e) => {
                error!(err = %e, "Unable to start audio output, sounds will not play.");
                (
                    config.device().unwrap_or("default").to_string(),
                    Some(e.to_string()),
                )
            }
        };

        Backend {
            name,
            triggers,
            unavailable,
            device_error,
            _shutdown: shutdown,
        }
    }
}

impl super::Backend for Backend {
    fn play(&self, sound: SoundId, gain: f32) -> Result<(), PlaybackError> {
        if let Some(reason) = &self.device_error {
            return Err(PlaybackError::Device(reason.clone()));
        }
        if let Some(Some(reason)) = self.unavailable.get(sound.index()) {
            return Err(PlaybackError::Unavailable {
                sound: sound.to_string(),
                reason: reason.clone(),
            });
        }
        self.triggers
            .send((sound.index(), gain))
            .map_err(|_| PlaybackError::Device(format!("{} is no longer running", self.name)))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (cpal)", self.name)
    }
}

fn find_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, PlaybackError> {
    match name {
        None => host
            .default_output_device()
            .ok_or_else(|| PlaybackError::Device("no default output device".to_string())),
        Some(name) => host
            .output_devices()
            .map_err(|e| PlaybackError::Device(e.to_string()))?
            .find(|device| {
                device
                    .name()
                    .map(|device_name| device_name.trim() == name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| PlaybackError::Device(format!("no device found with name {}", name))),
    }
}

fn open_stream(
    name: Option<&str>,
    sample_rate: u32,
    pool: EffectPool,
    triggers: crossbeam_channel::Receiver<(usize, f32)>,
) -> Result<(String, cpal::Stream), PlaybackError> {
    let host = cpal::default_host();
    let device = find_device(&host, name)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let supported = device
        .default_output_config()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    let config = cpal::StreamConfig {
        channels: supported.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, pool, triggers),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, pool, triggers),
        cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, pool, triggers),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, pool, triggers),
        format => {
            return Err(PlaybackError::Device(format!(
                "unsupported sample format {:?}",
                format
            )))
        }
    }
    .map_err(|e| PlaybackError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;
    Ok((device_name, stream))
}

fn build_stream<T: SizedSample + FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut pool: EffectPool,
    triggers: crossbeam_channel::Receiver<(usize, f32)>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let channels = usize::from(config.channels);
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok((index, gain)) = triggers.try_recv() {
                pool.trigger(index, gain);
            }
            scratch.resize(data.len(), 0.0);
            pool.render(&mut scratch, channels);
            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(*src);
            }
        },
        |err| error!(err = %err, "Audio output stream error."),
        None,
    )
}

/// An output device as reported by cpal.
pub struct DeviceInfo {
    name: String,
    host: String,
    max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Lists the output devices of every available host.
pub fn list() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = configs.map(|config| config.channels()).max().unwrap_or(0);
            if max_channels > 0 {
                devices.push(DeviceInfo {
                    name: device.name()?,
                    host: host_id.name().to_string(),
                    max_channels,
                });
            }
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}
