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

//! Instrument handlers and the router that feeds them.

use std::{fmt, str::FromStr, sync::Arc};

use tracing::{debug, error, info, warn};

use crate::{
    mixer::{MixerError, MixerState},
    playback::Backend,
    protocol::{self, Command},
    sounds::{DrumPiece, GuitarString, PianoNote, SoundId},
};

/// One of the ensemble's instruments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Instrument {
    Piano,
    Drum,
    Guitar,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Piano, Instrument::Drum, Instrument::Guitar];

    /// The wire tag and mixer key for this instrument.
    pub fn key(&self) -> &'static str {
        match self {
            Instrument::Piano => "PIANO",
            Instrument::Drum => "DRUM",
            Instrument::Guitar => "GUITA",
        }
    }

    /// Matches an upper-cased wire tag. Only the canonical keys are tags.
    pub fn from_tag(tag: &str) -> Option<Instrument> {
        Self::ALL.into_iter().find(|instrument| instrument.key() == tag)
    }

    pub(crate) fn slot(&self) -> usize {
        *self as usize
    }
}

impl FromStr for Instrument {
    type Err = MixerError;

    /// Parses a mixer channel name: case-insensitive, surrounding whitespace
    /// ignored, and `GUITAR` accepted for `GUITA`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name.to_uppercase().as_str() {
            "GUITAR" => Ok(Instrument::Guitar),
            key => Self::from_tag(key).ok_or_else(|| MixerError::UnknownInstrument(name.to_string())),
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Resolves an instrument payload to the sound it selects.
///
/// - Piano: the first character, one of C D E F G A B in either case.
/// - Guitar: the first character, one of G D C in either case.
/// - Drum: the trimmed payload as a slot number from 0 to 4.
pub fn resolve(instrument: Instrument, payload: &str) -> Option<SoundId> {
    match instrument {
        Instrument::Piano => payload
            .chars()
            .next()
            .and_then(PianoNote::from_char)
            .map(SoundId::Piano),
        Instrument::Guitar => payload
            .chars()
            .next()
            .and_then(GuitarString::from_char)
            .map(SoundId::Guitar),
        Instrument::Drum => payload
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DrumPiece::from_slot)
            .map(SoundId::Drum),
    }
}

/// What became of a trigger.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Trigger {
    /// The sound was handed to the playback backend at this gain.
    Played(SoundId, f32),
    /// The instrument is muted.
    Muted(SoundId),
    /// The payload did not select a sound.
    Invalid,
    /// The backend could not play the sound.
    Failed(SoundId),
}

/// Routes authenticated command lines to the instrument handlers.
pub struct Router {
    mixer: Arc<MixerState>,
    backend: Arc<dyn Backend>,
}

impl Router {
    pub fn new(mixer: Arc<MixerState>, backend: Arc<dyn Backend>) -> Router {
        Router { mixer, backend }
    }

    /// Parses and dispatches one command line. Unparseable lines are dropped.
    pub fn route(&self, line: &str) -> Option<Trigger> {
        match protocol::parse_command(line) {
            Ok(command) => {
                debug!(
                    tag = %command.instrument,
                    payload = command.payload,
                    syntax = ?command.syntax,
                    "Parsed command."
                );
                Some(self.dispatch(&command))
            }
            Err(e) => {
                warn!(err = %e, "Dropping line.");
                None
            }
        }
    }

    /// Runs a parsed command through its instrument handler.
    pub fn dispatch(&self, command: &Command<'_>) -> Trigger {
        let instrument = command.instrument;
        let Some(sound) = resolve(instrument, command.payload) else {
            warn!(%instrument, payload = command.payload, "Invalid payload.");
            return Trigger::Invalid;
        };

        // Read fresh on every trigger so mixer changes apply immediately.
        let Some(gain) = self.mixer.gain(instrument) else {
            info!(%instrument, %sound, "Instrument muted, skipping.");
            return Trigger::Muted(sound);
        };

        match self.backend.play(sound, gain) {
            Ok(()) => {
                debug!(%sound, gain, "Triggered sound.");
                Trigger::Played(sound, gain)
            }
            Err(e) => {
                error!(err = %e, %sound, backend = %self.backend, "Unable to play sound.");
                Trigger::Failed(sound)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{resolve, Instrument, Router, Trigger};
    use crate::{
        mixer::{MixerControl, MixerError, MixerState},
        playback::mock,
        sounds::{DrumPiece, GuitarString, PianoNote, SoundId},
        testutil::FailingBackend,
    };

    fn router() -> (Router, Arc<MixerState>, Arc<mock::Backend>) {
        let mixer = Arc::new(MixerState::new());
        let backend = Arc::new(mock::Backend::new("mock-backend"));
        (
            Router::new(mixer.clone(), backend.clone()),
            mixer,
            backend,
        )
    }

    #[test]
    fn test_instrument_names() {
        assert_eq!("piano".parse::<Instrument>(), Ok(Instrument::Piano));
        assert_eq!(" DRUM ".parse::<Instrument>(), Ok(Instrument::Drum));
        assert_eq!("GUITAR".parse::<Instrument>(), Ok(Instrument::Guitar));
        assert_eq!("guita".parse::<Instrument>(), Ok(Instrument::Guitar));
        assert_eq!(
            "tuba".parse::<Instrument>(),
            Err(MixerError::UnknownInstrument("tuba".to_string()))
        );
        assert_eq!(Instrument::from_tag("GUITAR"), None);
        assert_eq!(Instrument::Guitar.to_string(), "GUITA");
    }

    #[test]
    fn test_piano_payloads() {
        for payload in ["c", "C", "Cx", "c#"] {
            assert_eq!(
                resolve(Instrument::Piano, payload),
                Some(SoundId::Piano(PianoNote::C)),
                "payload {}",
                payload
            );
        }
        assert_eq!(resolve(Instrument::Piano, ""), None);
        assert_eq!(resolve(Instrument::Piano, "H"), None);
        assert_eq!(resolve(Instrument::Piano, " C"), None);
        let notes: Vec<Option<SoundId>> = "CDEFGAB"
            .chars()
            .map(|note| resolve(Instrument::Piano, &note.to_string()))
            .collect();
        assert_eq!(
            notes,
            PianoNote::ALL
                .into_iter()
                .map(|note| Some(SoundId::Piano(note)))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_guitar_payloads() {
        assert_eq!(
            resolve(Instrument::Guitar, "g"),
            Some(SoundId::Guitar(GuitarString::G))
        );
        assert_eq!(
            resolve(Instrument::Guitar, "Dm"),
            Some(SoundId::Guitar(GuitarString::D))
        );
        assert_eq!(
            resolve(Instrument::Guitar, "C"),
            Some(SoundId::Guitar(GuitarString::C))
        );
        assert_eq!(resolve(Instrument::Guitar, "E"), None);
        assert_eq!(resolve(Instrument::Guitar, ""), None);
    }

    #[test]
    fn test_drum_payloads() {
        let sounds: Vec<Option<SoundId>> = ["0", "1", "2", "3", "4"]
            .into_iter()
            .map(|payload| resolve(Instrument::Drum, payload))
            .collect();
        assert_eq!(
            sounds,
            DrumPiece::ALL
                .into_iter()
                .map(|piece| Some(SoundId::Drum(piece)))
                .collect::<Vec<_>>()
        );
        assert_eq!(
            resolve(Instrument::Drum, " 3 "),
            Some(SoundId::Drum(DrumPiece::Kick))
        );
        for payload in ["5", "-1", "x", "", "1.0", "99999999999999999999"] {
            assert_eq!(resolve(Instrument::Drum, payload), None, "payload {}", payload);
        }
    }

    #[test]
    fn test_syntax_insensitive_routing() {
        let (router, _, backend) = router();
        for line in ["[piano]c", "[PIANO]C", "PIANO:C"] {
            assert_eq!(
                router.route(line),
                Some(Trigger::Played(SoundId::Piano(PianoNote::C), 1.0))
            );
        }
        assert_eq!(backend.plays().len(), 3);
    }

    #[test]
    fn test_invalid_lines_do_not_play() {
        let (router, _, backend) = router();
        assert_eq!(router.route("[DRUM]5"), Some(Trigger::Invalid));
        assert_eq!(router.route("DRUM:-1"), Some(Trigger::Invalid));
        assert_eq!(router.route("[DRUM]x"), Some(Trigger::Invalid));
        assert_eq!(router.route("[PIANO]"), Some(Trigger::Invalid));
        assert_eq!(router.route("[BASS]E"), None);
        assert_eq!(router.route("no tag here"), None);
        assert!(backend.plays().is_empty());
    }

    #[test]
    fn test_mute_and_volume() -> Result<(), MixerError> {
        let (router, mixer, backend) = router();

        mixer.set_mute("DRUM", true)?;
        assert_eq!(
            router.route("[DRUM]3"),
            Some(Trigger::Muted(SoundId::Drum(DrumPiece::Kick)))
        );
        assert!(backend.plays().is_empty());

        mixer.set_mute("DRUM", false)?;
        router.route("[DRUM]3");
        assert_eq!(backend.plays().len(), 1);

        mixer.set_volume("PIANO", 50)?;
        router.route("PIANO:E");
        let plays = backend.plays();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[1].sound, SoundId::Piano(PianoNote::E));
        assert!((plays[1].gain - 0.5).abs() < 1e-6);

        mixer.set_volume("GUITAR", 25)?;
        router.route("[GUITA]G");
        let plays = backend.plays();
        assert!((plays[2].gain - 0.25).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_playback_failure_is_handled() {
        let mixer = Arc::new(MixerState::new());
        let backend = Arc::new(FailingBackend::new(SoundId::Piano(PianoNote::B)));
        let router = Router::new(mixer, backend.clone());

        assert_eq!(
            router.route("[PIANO]B"),
            Some(Trigger::Failed(SoundId::Piano(PianoNote::B)))
        );
        assert_eq!(
            router.route("PIANO:A"),
            Some(Trigger::Played(SoundId::Piano(PianoNote::A), 1.0))
        );
        assert_eq!(
            router.route("[PIANO]b"),
            Some(Trigger::Failed(SoundId::Piano(PianoNote::B)))
        );
        assert_eq!(
            router.route("[DRUM]0"),
            Some(Trigger::Played(SoundId::Drum(DrumPiece::TomHi), 1.0))
        );

        let plays = backend.plays();
        assert_eq!(plays.len(), 2);
        assert_eq!(plays[0].sound, SoundId::Piano(PianoNote::A));
        assert_eq!(plays[1].sound, SoundId::Drum(DrumPiece::TomHi));
    }
}
