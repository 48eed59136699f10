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

//! The line protocol spoken by instrument clients.
//!
//! Every message is a line terminated by `\n` (a trailing `\r` is tolerated).
//! The server greets each connection with [`WELCOME_BANNER`]; the client then
//! sends `<id>:<password>` until it is logged in, followed by trigger lines in
//! either `[TAG]payload` or `TAG:payload` form.

mod command;
mod framer;
mod login;

pub use command::{parse_command, Command, CommandError, Syntax};
pub use framer::{FrameError, LineFramer, RawLine};
pub use login::{parse_login, Login};

/// Sent to every client as soon as it connects.
pub const WELCOME_BANNER: &str = "Welcome. Please login with 'id:pw'\n";
