//! # Network Module
//!
//! This module provides networking abstractions over WebSockets, which the driving simulator uses to
//! exchange telemetry and commands with the controller. The simulator is the client, the controller
//! binds a server and accepts one connection per simulator instance.
//!
//! All operations are blocking. Each accepted connection is expected to be served on its own
//! thread.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::net::{SocketAddr, TcpListener, TcpStream};
use log::debug;
use tungstenite::{Message, WebSocket};

// Export tungstenite
pub use tungstenite;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A bidirectional text frame transport.
///
/// Implemented by [`SimConnection`], and by in-memory transports in tests.
pub trait FrameTransport {
    /// Block until the next event on the transport.
    fn recv(&mut self) -> Result<ConnEvent, NetError>;

    /// Send a text frame.
    fn send(&mut self, payload: String) -> Result<(), NetError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Server accepting WebSocket connections from the simulator.
pub struct SimServer {
    listener: TcpListener
}

/// A single WebSocket connection to a simulator.
pub struct SimConnection {
    socket: WebSocket<TcpStream>,

    peer_addr: SocketAddr
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Events which can be received on a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnEvent {
    /// A text frame was received.
    Text(String),

    /// The peer closed the connection, or the connection was lost.
    Closed
}

#[derive(thiserror::Error, Debug)]
pub enum NetError {
    #[error("Could not bind the server to {0}: {1}")]
    BindError(String, std::io::Error),

    #[error("Could not accept a connection: {0}")]
    AcceptError(std::io::Error),

    #[error("WebSocket handshake failed: {0}")]
    HandshakeError(String),

    #[error("Could not send to the peer: {0}")]
    SendError(tungstenite::Error),

    #[error("Could not recieve from the peer: {0}")]
    RecvError(tungstenite::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServer {
    /// Bind a new server to the given endpoint, such as `"0.0.0.0:4567"`.
    ///
    /// This function will not wait for a connection before returning.
    pub fn bind(endpoint: &str) -> Result<Self, NetError> {
        let listener = TcpListener::bind(endpoint)
            .map_err(|e| NetError::BindError(endpoint.into(), e))?;

        Ok(Self { listener })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Block until a simulator connects, then perform the WebSocket handshake.
    pub fn accept(&self) -> Result<SimConnection, NetError> {
        let (stream, peer_addr) = self.listener.accept()
            .map_err(NetError::AcceptError)?;

        debug!("TCP connection from {}, performing handshake", peer_addr);

        // Small frames at a high rate, don't let Nagle hold them back
        stream.set_nodelay(true).ok();

        let socket = tungstenite::accept(stream)
            .map_err(|e| NetError::HandshakeError(e.to_string()))?;

        Ok(SimConnection { socket, peer_addr })
    }
}

impl SimConnection {
    /// Address of the connected simulator.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Close the connection, ignoring any error as the peer may already be gone.
    pub fn close(mut self) {
        self.socket.close(None).ok();
        self.socket.flush().ok();
    }
}

impl FrameTransport for SimConnection {
    fn recv(&mut self) -> Result<ConnEvent, NetError> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(s)) => return Ok(ConnEvent::Text(s)),
                Ok(Message::Close(_)) => return Ok(ConnEvent::Closed),
                // Pings are answered by tungstenite on the next read or write, binary frames are
                // not part of the protocol
                Ok(_) => continue,
                Err(e) if is_disconnect(&e) => return Ok(ConnEvent::Closed),
                Err(e) => return Err(NetError::RecvError(e))
            }
        }
    }

    fn send(&mut self, payload: String) -> Result<(), NetError> {
        self.socket.send(Message::Text(payload))
            .map_err(NetError::SendError)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check if the error means the peer has gone away.
fn is_disconnect(e: &tungstenite::Error) -> bool {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake
        ) => true,
        tungstenite::Error::Io(io) => matches!(
            io.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
        ),
        _ => false
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_server_round_trip() {
        let server = SimServer::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        // Echo server on a background thread, uppercasing every frame
        let jh = thread::spawn(move || {
            let mut conn = server.accept().unwrap();
            loop {
                match conn.recv().unwrap() {
                    ConnEvent::Text(s) => conn.send(s.to_uppercase()).unwrap(),
                    ConnEvent::Closed => break
                }
            }
        });

        let (mut client, _) = tungstenite::connect(format!("ws://{}/socket.io/", addr)).unwrap();

        client.send(Message::Text("42[\"manual\",{}]".into())).unwrap();
        match client.read().unwrap() {
            Message::Text(s) => assert_eq!(s, "42[\"MANUAL\",{}]"),
            m => panic!("Unexpected message {:?}", m)
        }

        client.close(None).unwrap();
        // Drive the close handshake until the server acknowledges it
        while client.read().is_ok() {}

        jh.join().unwrap();
    }
}
