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
use crate::instruments::Instrument;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unrecognized line '{0}'")]
    Unrecognized(String),

    #[error("unknown tag '{tag}' (payload '{payload}')")]
    UnknownTag { tag: String, payload: String },
}

/// The surface syntax a command arrived in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Syntax {
    /// `[TAG] payload`
    Bracket,
    /// `TAG:payload`
    Colon,
}

/// A tagged trigger addressed to an instrument.
#[derive(Debug, PartialEq)]
pub struct Command<'a> {
    pub instrument: Instrument,
    pub payload: &'a str,
    pub syntax: Syntax,
}

/// Parses a command line. The bracket form is tried first; its payload is
/// trimmed. The colon form splits on the first colon and keeps the payload
/// as sent. Tags are matched case-insensitively.
pub fn parse_command(line: &str) -> Result<Command<'_>, CommandError> {
    let (tag, payload, syntax) = match split_bracket(line) {
        Some((tag, payload)) => (tag, payload, Syntax::Bracket),
        None => match line.find(':') {
            Some(pos) => (line[..pos].trim(), &line[pos + 1..], Syntax::Colon),
            None => return Err(CommandError::Unrecognized(line.to_string())),
        },
    };

    let tag = tag.to_uppercase();
    match Instrument::from_tag(&tag) {
        Some(instrument) => Ok(Command {
            instrument,
            payload,
            syntax,
        }),
        None => Err(CommandError::UnknownTag {
            tag,
            payload: payload.to_string(),
        }),
    }
}

/// Matches `^\s*\[\s*([A-Za-z0-9_]+)\s*\]\s*(.*?)\s*$`.
fn split_bracket(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start().strip_prefix('[')?.trim_start();
    let tag_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if tag_len == 0 {
        return None;
    }

    let (tag, rest) = rest.split_at(tag_len);
    let payload = rest.trim_start().strip_prefix(']')?;
    Some((tag, payload.trim()))
}
