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
use std::borrow::Cow;

use rust_embed::RustEmbed;

/// The packaged credential source used when no credentials file is configured.
pub(crate) const CREDENTIALS: &str = "idpasswd.txt";

/// The directory within the packaged assets that holds the sound bank.
pub(crate) const SOUNDS_DIR: &str = "sounds";

/// Resources compiled into the binary.
#[derive(RustEmbed)]
#[folder = "assets/"]
struct Packaged;

/// Returns the contents of a packaged resource, if it exists.
pub(crate) fn get(name: &str) -> Option<Cow<'static, [u8]>> {
    Packaged::get(name).map(|file| file.data)
}

#[cfg(test)]
mod test {
    #[test]
    fn test_packaged_resources_present() {
        assert!(super::get(super::CREDENTIALS).is_some());
        assert!(super::get("sounds/piano_c.wav").is_some());
        assert!(super::get("sounds/missing.wav").is_none());
    }
}
