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

/// A login attempt.
#[derive(Debug, PartialEq)]
pub struct Login<'a> {
    pub id: &'a str,
    pub password: &'a str,
}

/// Splits `<id>:<password>` on the first colon, trimming both halves. Returns
/// None if the line has no colon or starts with one.
pub fn parse_login(line: &str) -> Option<Login<'_>> {
    match line.find(':') {
        Some(pos) if pos > 0 => Some(Login {
            id: line[..pos].trim(),
            password: line[pos + 1..].trim(),
        }),
        _ => None,
    }
}
