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

//! The TCP listener and the per-connection protocol engine.
//!
//! [`Hub`] holds everything shared between connections and turns received
//! bytes into logins and triggers. [`Server`] accepts connections and feeds
//! each one's bytes to the hub in arrival order.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpSocket, TcpStream},
    select,
    sync::{broadcast, watch},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, error, info, span, warn, Instrument, Level};

use crate::{
    credentials::CredentialStore,
    instruments::Router,
    mixer::MixerState,
    playback::Backend,
    protocol::{self, FrameError, RawLine, WELCOME_BANNER},
    session::{ConnectionId, Session, SessionTable},
};

const READ_BLOCK_SIZE: usize = 1024;
const OBSERVER_CAPACITY: usize = 256;

/// Pause after a failed accept, doubled for each failure in a row.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("unable to listen on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },
}

/// A received line, as handed to observers before it is interpreted.
#[derive(Clone, Debug)]
pub struct ObservedLine {
    pub connection: ConnectionId,
    pub peer: SocketAddr,
    pub line: RawLine,
}

/// State shared by every connection.
pub struct Hub {
    credentials: CredentialStore,
    router: Router,
    sessions: SessionTable,
    observer: broadcast::Sender<ObservedLine>,
    max_line_length: Option<usize>,
}

impl Hub {
    pub fn new(
        credentials: CredentialStore,
        mixer: Arc<MixerState>,
        backend: Arc<dyn Backend>,
        max_line_length: Option<usize>,
    ) -> Hub {
        let (observer, _) = broadcast::channel(OBSERVER_CAPACITY);
        Hub {
            credentials,
            router: Router::new(mixer, backend),
            sessions: SessionTable::new(),
            observer,
            max_line_length,
        }
    }

    /// Subscribes to every line received from any connection. Slow
    /// subscribers miss lines rather than holding up connections.
    pub fn subscribe(&self) -> broadcast::Receiver<ObservedLine> {
        self.observer.subscribe()
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Registers a newly accepted connection.
    pub fn connect(&self, peer: SocketAddr) -> ConnectionId {
        let id = self.sessions.open(peer, self.max_line_length);
        info!(connection = %id, %peer, "Client connected.");
        id
    }

    /// Forgets a connection.
    pub fn disconnect(&self, id: ConnectionId) {
        if let Some(mut session) = self.sessions.close(id) {
            let unterminated = session.framer().buffered();
            info!(
                connection = %id,
                peer = %session.peer(),
                client = session.client_id().unwrap_or("-"),
                unterminated,
                "Client disconnected."
            );
        }
    }

    /// Handles a chunk of bytes received on a connection. Complete lines are
    /// observed, then used as login attempts until the session is logged in
    /// and routed as commands after that. Fails if the connection has exceeded
    /// the line length limit.
    pub fn receive(&self, id: ConnectionId, chunk: &[u8]) -> Result<(), FrameError> {
        let mut commands = Vec::new();
        let bound = self.sessions.with_session(id, |session| {
            session.framer().push(chunk);
            while let Some(line) = session.framer().next_line() {
                let _ = self.observer.send(ObservedLine {
                    connection: id,
                    peer: session.peer(),
                    line: line.clone(),
                });

                let text = line.text();
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if session.is_authenticated() {
                    commands.push(text.to_string());
                } else {
                    self.login(session, text);
                }
            }
            session.framer().check_bound()
        });

        // Playback happens outside of the session lock.
        for command in commands {
            self.router.route(&command);
        }

        bound.unwrap_or(Ok(()))
    }

    fn login(&self, session: &mut Session, line: &str) {
        let Some(login) = protocol::parse_login(line) else {
            warn!(connection = %session.id(), line, "Expected a login of the form id:pw.");
            return;
        };

        if self.credentials.verify(login.id, login.password) {
            session.authenticate(login.id);
            info!(connection = %session.id(), client = login.id, "Client logged in.");
        } else {
            warn!(connection = %session.id(), client = login.id, "Login failed.");
        }
    }
}

/// A running listener.
pub struct Server {
    hub: Arc<Hub>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept: JoinHandle<()>,
}

impl Server {
    /// Binds the address and starts accepting connections.
    pub async fn start(hub: Arc<Hub>, addr: SocketAddr, backlog: u32) -> Result<Server, ListenError> {
        let bind_error = |source| ListenError::Bind { addr, source };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(backlog).map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        info!(addr = %local_addr, backlog, "Listening for instruments.");

        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept = tokio::spawn(
            accept_connections(hub.clone(), listener, shutdown_rx)
                .instrument(span!(Level::INFO, "listener")),
        );

        Ok(Server {
            hub,
            local_addr,
            shutdown,
            accept,
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, drops every connection and clears the session table.
    /// Playback already under way is left alone.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.accept.await {
            error!(err = %e, "Error waiting for the listener to stop.");
        }
        let cleared = self.hub.sessions().clear();
        info!(sessions = cleared, "Server stopped.");
    }
}

async fn accept_connections(
    hub: Arc<Hub>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    let mut failures = 0;
    loop {
        select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    failures = 0;
                    let hub = hub.clone();
                    connections.spawn(
                        serve(hub, stream, peer).instrument(span!(Level::INFO, "connection", %peer)),
                    );
                }
                Err(e) => {
                    // Running out of file descriptors fails every accept until
                    // a connection closes.
                    let backoff = accept_backoff(failures);
                    failures = failures.saturating_add(1);
                    warn!(err = %e, ?backoff, "Unable to accept connection.");
                    select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    debug!(connections = connections.len(), "Closing connections.");
    connections.shutdown().await;
}

fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF
        .saturating_mul(1 << failures.min(16))
        .min(MAX_ACCEPT_BACKOFF)
}

async fn serve(hub: Arc<Hub>, mut stream: TcpStream, peer: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!(err = %e, "Unable to set TCP_NODELAY.");
    }

    let id = hub.connect(peer);
    if let Err(e) = read_lines(&hub, id, &mut stream).await {
        debug!(connection = %id, err = %e, "Connection ended with an error.");
    }
    hub.disconnect(id);
}

async fn read_lines(hub: &Hub, id: ConnectionId, stream: &mut TcpStream) -> io::Result<()> {
    stream.write_all(WELCOME_BANNER.as_bytes()).await?;

    let mut block = [0u8; READ_BLOCK_SIZE];
    loop {
        let read = stream.read(&mut block).await?;
        if read == 0 {
            return Ok(());
        }
        if let Err(e) = hub.receive(id, &block[..read]) {
            warn!(connection = %id, err = %e, "Dropping connection.");
            return Ok(());
        }
    }
}
