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

//! The instrument side of the protocol: connect, log in, send triggers.

use std::io;

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream, ToSocketAddrs,
    },
};
use tracing::debug;

use crate::instruments::Instrument;

/// A connection to a hub.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    banner: String,
}

impl Client {
    /// Connects and waits for the welcome banner.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Client> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut banner = String::new();
        if reader.read_line(&mut banner).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before the welcome banner",
            ));
        }
        debug!(banner = banner.trim_end(), "Connected to hub.");

        Ok(Client {
            reader,
            writer,
            banner,
        })
    }

    /// The banner the hub greeted us with, terminator included.
    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Sends a login line. The hub never answers, success or not.
    pub async fn login(&mut self, id: &str, password: &str) -> io::Result<()> {
        self.send_line(&format!("{}:{}", id, password)).await
    }

    /// Sends a trigger in bracket form.
    pub async fn trigger(&mut self, instrument: Instrument, payload: &str) -> io::Result<()> {
        self.send_line(&format!("[{}]{}", instrument.key(), payload))
            .await
    }

    /// Sends one line, appending the terminator.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Waits for the hub to close the connection. Anything it sends is
    /// discarded.
    pub async fn closed(&mut self) -> io::Result<()> {
        let mut discard = String::new();
        while self.reader.read_line(&mut discard).await? > 0 {
            discard.clear();
        }
        Ok(())
    }

    /// Closes our side of the connection.
    pub async fn close(mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}
