use std::io;
use std::net;
use std::time;

use tracing::warn;

use crate::endpoint::{Config, Endpoint, HostContext};
use crate::error::SendError;
use crate::socket;

/// Writes frames produced by a session's endpoint to its socket.
pub struct SocketContext {
    socket_tx: socket::ConnectedSocketTx,
}

impl HostContext for SocketContext {
    fn send_frame(&mut self, frame_bytes: &[u8], _user: u64) -> i32 {
        match self.socket_tx.send(frame_bytes) {
            Ok(len) => len as i32,
            Err(_) => -1,
        }
    }
}

fn handle_frame(endpoint: &mut Endpoint<SocketContext>, frame_bytes: &[u8]) {
    if let Err(err) = endpoint.input(frame_bytes) {
        warn!(conv = endpoint.conv(), %err, "dropping malformed packet");
    }
}

/// A conversation carried over a connected UDP socket.
///
/// The session owns the clock of its endpoint: whenever it is polled, pending datagrams are fed
/// to the endpoint and the endpoint is updated with the number of milliseconds elapsed since the
/// session was created.
pub struct Session {
    // Protocol state, writes straight to the socket
    endpoint: Endpoint<SocketContext>,
    // Timestamps are computed relative to this instant
    time_ref: time::Instant,
    // Socket receive handle
    socket_rx: socket::ConnectedSocketRx,
}

impl Session {
    /// Equivalent to calling [`Session::connect_with_config`] with default configuration.
    pub fn connect<A, B>(bind_addr: A, peer_addr: B, conv: u32) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
        B: net::ToSocketAddrs,
    {
        Self::connect_with_config(bind_addr, peer_addr, conv, Default::default())
    }

    /// Binds a UDP socket to `bind_addr`, connects it to `peer_addr`, and returns a new session
    /// for conversation `conv`. Socket errors are forwarded to the caller, and an invalid
    /// configuration is reported as [`io::ErrorKind::InvalidInput`].
    pub fn connect_with_config<A, B>(
        bind_addr: A,
        peer_addr: B,
        conv: u32,
        config: Config,
    ) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
        B: net::ToSocketAddrs,
    {
        config
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        let (socket_tx, socket_rx) = socket::new_connected(bind_addr, peer_addr, config.mtu)?;

        let endpoint = Endpoint::with_config(conv, 0, SocketContext { socket_tx }, config)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        Ok(Self {
            endpoint,
            time_ref: time::Instant::now(),
            socket_rx,
        })
    }

    /// Returns the number of whole milliseconds elapsed since the session was created.
    fn time_now_ms(&self) -> u32 {
        self.time_ref.elapsed().as_millis() as u32
    }

    pub fn endpoint(&self) -> &Endpoint<SocketContext> {
        &self.endpoint
    }

    pub fn is_dead(&self) -> bool {
        self.endpoint.is_dead()
    }

    pub fn local_addr(&self) -> net::SocketAddr {
        self.socket_rx.local_addr()
    }

    pub fn peer_addr(&self) -> net::SocketAddr {
        self.socket_rx.peer_addr()
    }

    /// Queues a message and flushes immediately.
    pub fn send(&mut self, message: &[u8]) -> Result<(), SendError> {
        self.endpoint.send(message)?;

        let now_ms = self.time_now_ms();
        if !self.endpoint.update(now_ms) {
            self.endpoint.flush();
        }

        Ok(())
    }

    /// Reads and processes as many frames as possible from the socket without blocking.
    fn handle_frames(&mut self) -> io::Result<()> {
        loop {
            match self.socket_rx.try_read_frame() {
                Ok(Some(frame_bytes)) => handle_frame(&mut self.endpoint, frame_bytes),
                Ok(None) => return Ok(()),
                // The peer is not listening (yet), lost segments are retransmitted
                Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn try_recv(&mut self) -> Option<Box<[u8]>> {
        let size = self.endpoint.peek_size()?;

        let mut message = vec![0; size].into_boxed_slice();
        let len = self.endpoint.recv(&mut message).ok()?;
        debug_assert_eq!(len, size);

        Some(message)
    }

    /// Processes inbound frames and timers without blocking, and returns the next complete
    /// message if there is one.
    pub fn poll_message(&mut self) -> io::Result<Option<Box<[u8]>>> {
        self.handle_frames()?;

        let now_ms = self.time_now_ms();
        self.endpoint.update(now_ms);

        Ok(self.try_recv())
    }

    /// Processes inbound frames and timers until a complete message is available, or until
    /// `timeout` has elapsed. Returns `Ok(None)` on timeout.
    pub fn wait_message_timeout(
        &mut self,
        timeout: time::Duration,
    ) -> io::Result<Option<Box<[u8]>>> {
        let deadline = time::Instant::now() + timeout;

        loop {
            if let Some(message) = self.poll_message()? {
                return Ok(Some(message));
            }

            let now = time::Instant::now();

            if now >= deadline {
                return Ok(None);
            }

            // Sleep until the endpoint next needs attention, or a frame arrives
            let now_ms = self.time_now_ms();
            let next_ms = self.endpoint.check(now_ms);
            let wait = time::Duration::from_millis(next_ms.wrapping_sub(now_ms) as u64)
                .min(deadline - now);

            match self.socket_rx.wait_for_frame(Some(wait)) {
                Ok(Some(frame_bytes)) => handle_frame(&mut self.endpoint, frame_bytes),
                Ok(None) => (),
                Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => (),
                Err(err) => return Err(err),
            }
        }
    }
}
