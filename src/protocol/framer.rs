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

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("{buffered} bytes buffered without a line terminator (limit {limit})")]
    Overflow { limit: usize, buffered: usize },
}

/// A line exactly as it arrived, terminator included.
#[derive(Clone, Debug, PartialEq)]
pub struct RawLine(Vec<u8>);

impl RawLine {
    /// The bytes as received, including the trailing `\n`.
    pub fn raw(&self) -> &[u8] {
        &self.0
    }

    /// The line with one trailing `\n` and then one trailing `\r` removed.
    pub fn content(&self) -> &[u8] {
        let line = self.0.strip_suffix(b"\n").unwrap_or(&self.0[..]);
        line.strip_suffix(b"\r").unwrap_or(line)
    }

    /// The content decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content())
    }
}

/// Splits an ordered byte stream into lines.
///
/// Chunks are appended with [`LineFramer::push`]; complete lines are taken off
/// the front with [`LineFramer::next_line`]. Each byte is handed out in exactly
/// one line and never scanned again once it has been searched for a terminator.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
    /// Bytes at the front of the buffer known not to contain a terminator.
    scanned: usize,
    max_line_length: Option<usize>,
}

impl LineFramer {
    /// Creates a framer. With a limit, [`LineFramer::check_bound`] fails once
    /// more than that many bytes are waiting for a terminator.
    pub fn new(max_line_length: Option<usize>) -> LineFramer {
        LineFramer {
            buffer: Vec::new(),
            scanned: 0,
            max_line_length,
        }
    }

    /// Appends a chunk of received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Removes and returns the next complete line, if there is one.
    pub fn next_line(&mut self) -> Option<RawLine> {
        match self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset + 1;
                let line: Vec<u8> = self.buffer.drain(..end).collect();
                self.scanned = 0;
                Some(RawLine(line))
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Checks the unterminated remainder against the configured limit.
    pub fn check_bound(&self) -> Result<(), FrameError> {
        match self.max_line_length {
            Some(limit) if self.buffer.len() > limit => Err(FrameError::Overflow {
                limit,
                buffered: self.buffer.len(),
            }),
            _ => Ok(()),
        }
    }

    /// The number of bytes waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod test {
    use super::{FrameError, LineFramer, RawLine};

    fn drain(framer: &mut LineFramer) -> Vec<RawLine> {
        let mut lines = Vec::new();
        while let Some(line) = framer.next_line() {
            lines.push(line);
        }
        lines
    }

    fn frame_in_chunks(stream: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
        let mut framer = LineFramer::new(None);
        let mut lines = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            framer.push(chunk);
            lines.extend(drain(&mut framer).iter().map(|line| line.raw().to_vec()));
        }
        lines
    }

    #[test]
    fn test_single_chunk() {
        let mut framer = LineFramer::new(None);
        framer.push(b"GUITA:PASSWD\r\n[GUITA]G\npartial");

        let lines = drain(&mut framer);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].raw(), b"GUITA:PASSWD\r\n");
        assert_eq!(lines[0].content(), b"GUITA:PASSWD");
        assert_eq!(lines[1].raw(), b"[GUITA]G\n");
        assert_eq!(lines[1].text(), "[GUITA]G");
        assert_eq!(framer.buffered(), b"partial".len());

        framer.push(b" line\n");
        let lines = drain(&mut framer);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text(), "partial line");
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn test_fragmentation_invariance() {
        let stream = b"PIANO:PASSWD\n[PIANO]C\r\nDRUM:3\n\n\r\n[piano] e \nPIANO:";
        let whole = frame_in_chunks(stream, stream.len());
        assert_eq!(whole.len(), 6);
        for chunk_size in 1..stream.len() {
            assert_eq!(
                frame_in_chunks(stream, chunk_size),
                whole,
                "chunk size {} changed the framing",
                chunk_size
            );
        }
    }

    #[test]
    fn test_only_one_terminator_stripped() {
        let mut framer = LineFramer::new(None);
        framer.push(b"a\r\r\n\r\n\n");
        let lines = drain(&mut framer);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].content(), b"a\r");
        assert_eq!(lines[1].content(), b"");
        assert_eq!(lines[2].content(), b"");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut framer = LineFramer::new(None);
        framer.push(b"[PIANO]\xffC\n");
        let line = framer.next_line().map(|line| line.text().into_owned());
        assert_eq!(line.as_deref(), Some("[PIANO]\u{fffd}C"));
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut framer = LineFramer::new(None);
        framer.push(&vec![b'x'; 1 << 20]);
        assert!(framer.next_line().is_none());
        assert_eq!(framer.check_bound(), Ok(()));
    }

    #[test]
    fn test_bound() {
        let mut framer = LineFramer::new(Some(8));
        framer.push(b"12345678\n12345678");
        assert!(framer.next_line().is_some());
        assert!(framer.next_line().is_none());
        assert_eq!(framer.check_bound(), Ok(()));

        framer.push(b"9");
        assert!(framer.next_line().is_none());
        assert_eq!(
            framer.check_bound(),
            Err(FrameError::Overflow {
                limit: 8,
                buffered: 9
            })
        );
    }
}
