//! DHCP server transport
//!
//! This module contains the receive/reply loop:
//! - Socket setup from the configuration
//! - Datagram decoding and dispatch to the state machine
//! - Reply addressing (broadcast or unicast)

use crate::{
    config::ServerConfig,
    error::ServerError,
    network,
    v4::{DhcpMessage, DhcpV4Handler, MessageType},
};
use bytes::Bytes;
use std::{
    convert::Infallible,
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    time::Instant,
};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Largest datagram read from the socket.
const RECV_BUFFER_LEN: usize = 1500;

/// What the transport should do with one inbound datagram.
#[derive(Debug)]
pub enum Action {
    Send(Bytes, SocketAddr),
    Drop,
}

/// Turns a decoded request into the reply to send, if any.
pub trait Responder {
    fn respond(&mut self, request: &DhcpMessage, now: Instant) -> Option<DhcpMessage>;
}

impl Responder for DhcpV4Handler {
    fn respond(&mut self, request: &DhcpMessage, now: Instant) -> Option<DhcpMessage> {
        self.handle(request, now)
    }
}

pub struct DhcpServer {
    client_port: u16,
    socket: UdpSocket,
    responder: Box<dyn Responder + Send>,
}

impl DhcpServer {
    /// Validates the configuration and binds the listening socket.
    /// A failure here is fatal: the server cannot run without its socket.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let address = SocketAddrV4::new(config.bind_address, config.server_port);
        let socket = network::new_server_socket(address, config.interface.as_deref())?;

        info!("DHCP server listening on {}", socket.local_addr()?);
        if let Some(interface) = &config.interface {
            info!("DHCP bound to interface {}", interface);
        }
        info!("Pool {} - {}", config.pool_start, config.pool_end);

        Ok(Self {
            client_port: config.client_port,
            socket,
            responder: Box::new(DhcpV4Handler::new(config)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Decodes one datagram, runs it through the state machine and encodes
    /// the reply. Malformed packets are dropped.
    pub fn handle_datagram(&mut self, data: &[u8], now: Instant) -> Action {
        let request = match DhcpMessage::decode(data) {
            Ok(request) => request,
            Err(e) => {
                debug!("Dropping invalid DHCP packet: {}", e);
                return Action::Drop;
            }
        };

        match self.responder.respond(&request, now) {
            Some(reply) => {
                let destination = reply_destination(&request, &reply, self.client_port);
                Action::Send(reply.encode(), destination)
            }
            None => Action::Drop,
        }
    }

    /// Serves requests one at a time until the process exits.
    /// Per-datagram receive and send failures are logged and skipped.
    pub async fn serve(mut self) -> Infallible {
        let mut buf = [0u8; RECV_BUFFER_LEN];
        loop {
            let (len, src) = match self.socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("DHCP recv error: {}", e);
                    continue;
                }
            };
            debug!("Received {} bytes from {}", len, src);

            let action = self.handle_datagram(&buf[..len], Instant::now());
            if let Action::Send(packet, destination) = action {
                if let Err(e) = self.socket.send_to(&packet, destination).await {
                    warn!("Failed to send DHCP response to {}: {}", destination, e);
                }
            }
        }
    }
}

/// Clients without a usable address (zero `ciaddr` or the broadcast flag
/// set) are answered by broadcast, as is every NAK.
pub fn reply_destination(
    request: &DhcpMessage,
    reply: &DhcpMessage,
    client_port: u16,
) -> SocketAddr {
    let ip = if reply.message_type == MessageType::Nak
        || request.is_broadcast()
        || request.ciaddr.is_unspecified()
    {
        Ipv4Addr::BROADCAST
    } else {
        request.ciaddr
    };
    SocketAddr::V4(SocketAddrV4::new(ip, client_port))
}

/// Binds the server described by `config` and serves forever.
/// Only startup failures are returned.
pub async fn run(config: ServerConfig) -> Result<Infallible, ServerError> {
    let server = DhcpServer::bind(config).await?;
    Ok(server.serve().await)
}
