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

//! The fixed sound bank: every playable sound and where its asset lives.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use crate::{assets, playback::PlaybackError};

/// A piano key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PianoNote {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl PianoNote {
    pub const ALL: [PianoNote; 7] = [
        PianoNote::C,
        PianoNote::D,
        PianoNote::E,
        PianoNote::F,
        PianoNote::G,
        PianoNote::A,
        PianoNote::B,
    ];

    /// Maps a note letter, in either case, to a key.
    pub fn from_char(c: char) -> Option<PianoNote> {
        match c.to_ascii_uppercase() {
            'C' => Some(PianoNote::C),
            'D' => Some(PianoNote::D),
            'E' => Some(PianoNote::E),
            'F' => Some(PianoNote::F),
            'G' => Some(PianoNote::G),
            'A' => Some(PianoNote::A),
            'B' => Some(PianoNote::B),
            _ => None,
        }
    }

    fn letter(&self) -> char {
        match self {
            PianoNote::C => 'c',
            PianoNote::D => 'd',
            PianoNote::E => 'e',
            PianoNote::F => 'f',
            PianoNote::G => 'g',
            PianoNote::A => 'a',
            PianoNote::B => 'b',
        }
    }
}

/// A guitar string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuitarString {
    G,
    D,
    C,
}

impl GuitarString {
    pub const ALL: [GuitarString; 3] = [GuitarString::G, GuitarString::D, GuitarString::C];

    /// Maps a string letter, in either case, to a string.
    pub fn from_char(c: char) -> Option<GuitarString> {
        match c.to_ascii_uppercase() {
            'G' => Some(GuitarString::G),
            'D' => Some(GuitarString::D),
            'C' => Some(GuitarString::C),
            _ => None,
        }
    }

    fn letter(&self) -> char {
        match self {
            GuitarString::G => 'g',
            GuitarString::D => 'd',
            GuitarString::C => 'c',
        }
    }
}

/// A slot in the five piece drum kit, in slot order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrumPiece {
    TomHi,
    TomMid,
    CymbalLeft,
    Kick,
    CymbalRight,
}

impl DrumPiece {
    pub const ALL: [DrumPiece; 5] = [
        DrumPiece::TomHi,
        DrumPiece::TomMid,
        DrumPiece::CymbalLeft,
        DrumPiece::Kick,
        DrumPiece::CymbalRight,
    ];

    /// Maps a slot index to a piece. Valid slots are 0 through 4.
    pub fn from_slot(slot: i64) -> Option<DrumPiece> {
        usize::try_from(slot)
            .ok()
            .and_then(|slot| Self::ALL.get(slot).copied())
    }

    fn name(&self) -> &'static str {
        match self {
            DrumPiece::TomHi => "tom_hi",
            DrumPiece::TomMid => "tom_mid",
            DrumPiece::CymbalLeft => "cymbal_left",
            DrumPiece::Kick => "kick",
            DrumPiece::CymbalRight => "cymbal_right",
        }
    }
}

/// Identifies one sound in the bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundId {
    Piano(PianoNote),
    Guitar(GuitarString),
    Drum(DrumPiece),
}

impl SoundId {
    /// The number of sounds in the bank.
    pub const COUNT: usize = PianoNote::ALL.len() + GuitarString::ALL.len() + DrumPiece::ALL.len();

    /// Every sound in the bank, ordered by index.
    pub fn all() -> impl Iterator<Item = SoundId> {
        PianoNote::ALL
            .into_iter()
            .map(SoundId::Piano)
            .chain(GuitarString::ALL.into_iter().map(SoundId::Guitar))
            .chain(DrumPiece::ALL.into_iter().map(SoundId::Drum))
    }

    /// A dense index in `0..COUNT`, stable for the lifetime of the program.
    pub fn index(&self) -> usize {
        match self {
            SoundId::Piano(note) => *note as usize,
            SoundId::Guitar(string) => PianoNote::ALL.len() + *string as usize,
            SoundId::Drum(piece) => {
                PianoNote::ALL.len() + GuitarString::ALL.len() + *piece as usize
            }
        }
    }

    /// The file name of this sound's asset.
    pub fn file_name(&self) -> String {
        match self {
            SoundId::Piano(note) => format!("piano_{}.wav", note.letter()),
            SoundId::Guitar(string) => format!("guitar_{}.wav", string.letter()),
            SoundId::Drum(piece) => format!("drum_{}.wav", piece.name()),
        }
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundId::Piano(note) => write!(f, "PIANO/{:?}", note),
            SoundId::Guitar(string) => write!(f, "GUITA/{:?}", string),
            SoundId::Drum(piece) => write!(f, "DRUM/{}", piece.name()),
        }
    }
}

/// Where a sound's bytes come from.
#[derive(Clone, Debug, PartialEq)]
pub enum Asset {
    /// A resource compiled into the binary.
    Packaged(String),
    /// A file on disk.
    File(PathBuf),
}

impl Asset {
    /// Reads the whole asset.
    pub fn load(&self) -> Result<Vec<u8>, PlaybackError> {
        match self {
            Asset::Packaged(name) => assets::get(name)
                .map(|data| data.into_owned())
                .ok_or_else(|| PlaybackError::MissingAsset(name.clone())),
            Asset::File(path) => fs::read(path).map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => PlaybackError::MissingAsset(path.display().to_string()),
                _ => PlaybackError::Read {
                    name: path.display().to_string(),
                    source,
                },
            }),
        }
    }

    /// The file extension, used by players for format detection.
    pub fn extension(&self) -> &str {
        let path = match self {
            Asset::Packaged(name) => Path::new(name),
            Asset::File(path) => path.as_path(),
        };
        path.extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("wav")
    }

    /// A displayable name for logs.
    pub fn name(&self) -> String {
        match self {
            Asset::Packaged(name) => format!("packaged:{}", name),
            Asset::File(path) => path.display().to_string(),
        }
    }
}

/// Resolves sound ids to assets, either packaged or from a directory.
#[derive(Clone, Debug, Default)]
pub struct SoundBank {
    directory: Option<PathBuf>,
}

impl SoundBank {
    /// A bank backed by the packaged sounds.
    pub fn packaged() -> SoundBank {
        SoundBank { directory: None }
    }

    /// A bank backed by a directory containing the asset files.
    pub fn from_directory(directory: &Path) -> SoundBank {
        SoundBank {
            directory: Some(directory.to_path_buf()),
        }
    }

    /// Returns the asset for the given sound.
    pub fn asset(&self, sound: SoundId) -> Asset {
        match &self.directory {
            Some(directory) => Asset::File(directory.join(sound.file_name())),
            None => Asset::Packaged(format!("{}/{}", assets::SOUNDS_DIR, sound.file_name())),
        }
    }

    /// Checks that every sound's asset can be read and decoded.
    pub fn verify(&self) -> Vec<(SoundId, Result<(), PlaybackError>)> {
        SoundId::all()
            .map(|sound| {
                let asset = self.asset(sound);
                let result = asset.load().and_then(|data| {
                    hound::WavReader::new(io::Cursor::new(data))
                        .map(|_| ())
                        .map_err(|e| PlaybackError::Decode {
                            name: asset.name(),
                            reason: e.to_string(),
                        })
                });
                (sound, result)
            })
            .collect()
    }
}
