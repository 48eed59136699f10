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

//! Per-connection state and the table that owns it.

use std::{
    collections::HashMap,
    fmt,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;

use crate::protocol::LineFramer;

/// Identifies a live connection. Never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Server-side state for one connection.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    peer: SocketAddr,
    client_id: Option<String>,
    framer: LineFramer,
}

impl Session {
    fn new(id: ConnectionId, peer: SocketAddr, max_line_length: Option<usize>) -> Session {
        Session {
            id,
            peer,
            client_id: None,
            framer: LineFramer::new(max_line_length),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_authenticated(&self) -> bool {
        self.client_id.is_some()
    }

    /// The id the client logged in as.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Marks the session as logged in. Authentication is permanent, so later
    /// calls are ignored.
    pub fn authenticate(&mut self, client_id: &str) {
        if self.client_id.is_none() {
            self.client_id = Some(client_id.to_string());
        }
    }

    /// The session's receive buffer.
    pub fn framer(&mut self) -> &mut LineFramer {
        &mut self.framer
    }
}

/// Every live session, keyed by connection id.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<ConnectionId, Session>>,
    next_id: AtomicU64,
}

impl SessionTable {
    pub fn new() -> SessionTable {
        SessionTable::default()
    }

    /// Creates and inserts a session for a newly accepted connection.
    pub fn open(&self, peer: SocketAddr, max_line_length: Option<usize>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sessions
            .lock()
            .insert(id, Session::new(id, peer, max_line_length));
        id
    }

    /// Removes a session, returning it if it was present.
    pub fn close(&self, id: ConnectionId) -> Option<Session> {
        self.sessions.lock().remove(&id)
    }

    /// Removes every session, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let count = sessions.len();
        sessions.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    /// Returns None for unknown connections.
    pub fn is_authenticated(&self, id: ConnectionId) -> Option<bool> {
        self.sessions.lock().get(&id).map(Session::is_authenticated)
    }

    /// Runs the function against a session while holding the table lock.
    /// Returns None if there is no such session.
    pub fn with_session<F, R>(&self, id: ConnectionId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Session) -> R,
    {
        self.sessions.lock().get_mut(&id).map(f)
    }
}
