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
use std::{io, sync::Arc};

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::mixer::MixerState;

const VOLUME: &str = "volume";
const MUTE: &str = "mute";
const UNMUTE: &str = "unmute";
const STATUS: &str = "status";

/// A mixer console on the terminal.
pub struct Driver {
    /// Read for the status display. Changes still go through events.
    mixer: Arc<MixerState>,
}

impl Driver {
    pub fn new(mixer: Arc<MixerState>) -> Driver {
        Driver { mixer }
    }

    /// Writes every channel's volume and mute state.
    fn write_status<W: io::Write>(mixer: &MixerState, writer: &mut W) -> Result<(), io::Error> {
        for (instrument, channel) in mixer.snapshot() {
            writeln!(
                writer,
                "{:<6} {:>3}%{}",
                instrument.key(),
                channel.volume_percent(),
                if channel.is_muted() { " (muted)" } else { "" }
            )?;
        }
        writer.flush()
    }

    /// Parses one console command.
    fn parse(input: &str) -> Option<Event> {
        let words: Vec<&str> = input.split_whitespace().collect();
        match words.as_slice() {
            [command, instrument, percent] if command.eq_ignore_ascii_case(VOLUME) => {
                percent.parse::<i32>().ok().map(|percent| Event::SetVolume {
                    instrument: instrument.to_string(),
                    percent,
                })
            }
            [command, instrument] if command.eq_ignore_ascii_case(MUTE) => Some(Event::SetMute {
                instrument: instrument.to_string(),
                muted: true,
            }),
            [command, instrument] if command.eq_ignore_ascii_case(UNMUTE) => {
                Some(Event::SetMute {
                    instrument: instrument.to_string(),
                    muted: false,
                })
            }
            _ => None,
        }
    }

    /// Reads and handles one command. Returns false once input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mixer: &MixerState,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <instrument> <0-100>, {} <instrument>, {} <instrument>, {}): ",
            VOLUME, MUTE, UNMUTE, STATUS,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        if input.trim().is_empty() {
            return Ok(true);
        }
        if input.trim().eq_ignore_ascii_case(STATUS) {
            Self::write_status(mixer, &mut writer)?;
            return Ok(true);
        }
        match Self::parse(&input) {
            Some(event) => events_tx.blocking_send(event).map_err(io::Error::other)?,
            None => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let mixer = self.mixer.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, &mixer, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard input closed.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use super::{Driver, Event};
    use crate::mixer::{MixerControl, MixerError, MixerState};

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::new());
        let more = Driver::monitor_io(&sender, &MixerState::new(), reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(
            get_event("volume piano 50\n")?,
            (
                true,
                Some(Event::SetVolume {
                    instrument: "piano".to_string(),
                    percent: 50
                })
            )
        );
        assert_eq!(
            get_event("MUTE guitar\n")?,
            (
                true,
                Some(Event::SetMute {
                    instrument: "guitar".to_string(),
                    muted: true
                })
            )
        );
        assert_eq!(
            get_event("unmute DRUM")?,
            (
                true,
                Some(Event::SetMute {
                    instrument: "DRUM".to_string(),
                    muted: false
                })
            )
        );
        // Out of range volumes are left for the mixer to clamp.
        assert_eq!(
            get_event("volume drum -5\n")?.1,
            Some(Event::SetVolume {
                instrument: "drum".to_string(),
                percent: -5
            })
        );
        Ok(())
    }

    #[test]
    fn test_unrecognized_input() -> Result<(), io::Error> {
        assert_eq!(get_event("volume piano loud\n")?, (true, None));
        assert_eq!(get_event("mute\n")?, (true, None));
        assert_eq!(get_event("play\n")?, (true, None));
        assert_eq!(get_event("\n")?, (true, None));
        assert_eq!(get_event("")?, (false, None));
        Ok(())
    }

    #[test]
    fn test_status() -> Result<(), Box<dyn std::error::Error>> {
        let mixer = MixerState::new();
        mixer.set_volume("DRUM", 40)?;
        mixer.set_mute("GUITAR", true)?;

        let (sender, mut receiver) = mpsc::channel::<Event>(1);
        let mut output = Vec::new();
        let more = Driver::monitor_io(
            &sender,
            &mixer,
            BufReader::new(&b" Status\n"[..]),
            &mut output,
        )?;
        drop(sender);
        assert!(more);
        assert_eq!(receiver.blocking_recv(), None);

        let output = String::from_utf8(output)?;
        let status: Vec<&str> = output.lines().skip(1).collect();
        let prompt = output.lines().next().unwrap_or_default();
        assert!(prompt.starts_with("Command ("));
        assert!(prompt.ends_with("PIANO  100%"), "got {:?}", prompt);
        assert_eq!(status, vec!["DRUM    40%", "GUITA  100% (muted)"]);
        Ok(())
    }

    #[test]
    fn test_status_defaults() -> Result<(), io::Error> {
        let mixer = MixerState::new();
        assert!(matches!(
            mixer.set_volume("BASS", 10),
            Err(MixerError::UnknownInstrument(_))
        ));
        let mut output = Vec::new();
        Driver::write_status(&mixer, &mut output)?;
        assert_eq!(
            String::from_utf8_lossy(&output),
            "PIANO  100%\nDRUM   100%\nGUITA  100%\n"
        );
        Ok(())
    }
}
