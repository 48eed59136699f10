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

//! A trigger-and-playback hub for networked instrument clients.
//!
//! Clients connect over TCP, log in with a shared secret and send tagged
//! trigger lines (`[PIANO]C`, `DRUM:3`, ...). The hub resolves each trigger to
//! a sound and plays it at the gain dictated by the live mixer.

mod assets;
pub mod client;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod instruments;
pub mod mixer;
pub mod playback;
pub mod protocol;
pub mod server;
pub mod session;
pub mod sounds;
#[cfg(test)]
mod testutil;
