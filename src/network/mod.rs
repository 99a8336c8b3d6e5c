use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket as StdUdpSocket},
};
use thiserror::Error;
use tokio::net::UdpSocket as TokioUdpSocket;

/// Defines all possible errors for socket operations.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Failed to create a new socket")]
    CreateSocket(#[source] io::Error),

    #[error("Failed to enable broadcast on socket")]
    SetBroadcast(#[source] io::Error),

    #[error("Failed to set SO_REUSEADDR on socket")]
    SetReuseAddress(#[source] io::Error),

    #[error("Failed to set SO_BINDTODEVICE on interface '{interface}'")]
    BindToDevice {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error(
        "Bind address {address} is not assigned to this host; use one of [{}] or 0.0.0.0",
        join_addrs(.available)
    )]
    AddressNotAvailable {
        address: Ipv4Addr,
        available: Vec<Ipv4Addr>,
    },

    #[error("Failed to bind socket to {address}")]
    BindSocket {
        address: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("Failed to set socket to non-blocking mode")]
    SetNonBlocking(#[source] io::Error),

    #[error("Failed to convert socket to TokioUdpSocket")]
    ConvertToTokio(#[source] io::Error),

    #[allow(dead_code)]
    #[error("Binding to a specific device is not implemented on this platform")]
    NotImplemented,
}

fn join_addrs(addrs: &[Ipv4Addr]) -> String {
    addrs
        .iter()
        .map(Ipv4Addr::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Creates the listening `tokio::net::UdpSocket` for the server.
///
/// The socket has `SO_BROADCAST` (replies to unconfigured clients go to
/// 255.255.255.255) and `SO_REUSEADDR` set, and is pinned to `interface`
/// with `SO_BINDTODEVICE` when one is given.
pub fn new_server_socket(
    address: SocketAddrV4,
    interface: Option<&str>,
) -> Result<TokioUdpSocket, SocketError> {
    use socket2::{Domain, Protocol, Socket, Type};

    // Create a socket2 socket, which allows setting options before binding.
    let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(SocketError::CreateSocket)?;

    socket2
        .set_broadcast(true)
        .map_err(SocketError::SetBroadcast)?;
    socket2
        .set_reuse_address(true)
        .map_err(SocketError::SetReuseAddress)?;

    if let Some(interface) = interface {
        bind_to_device(&socket2, interface)?;
    }

    socket2
        .bind(&SocketAddr::V4(address).into())
        .map_err(|source| {
            if source.kind() == io::ErrorKind::AddrNotAvailable {
                SocketError::AddressNotAvailable {
                    address: *address.ip(),
                    available: local_ipv4_addrs(),
                }
            } else {
                SocketError::BindSocket { address, source }
            }
        })?;

    // Convert to a standard socket, then into a Tokio socket.
    let std_socket: StdUdpSocket = socket2.into();
    std_socket
        .set_nonblocking(true)
        .map_err(SocketError::SetNonBlocking)?;
    TokioUdpSocket::from_std(std_socket).map_err(SocketError::ConvertToTokio)
}

#[cfg(target_os = "linux")]
fn bind_to_device(socket: &socket2::Socket, interface: &str) -> Result<(), SocketError> {
    use std::os::fd::AsRawFd;

    // SAFETY: the fd is owned by `socket` and the buffer outlives the call.
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_BINDTODEVICE,
            interface.as_ptr() as *const libc::c_void,
            interface.len() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(SocketError::BindToDevice {
            interface: interface.to_string(),
            source: io::Error::last_os_error(),
        });
    }
    Ok(())
}

/// Fallback for non-Linux systems where `SO_BINDTODEVICE` is not available.
#[cfg(not(target_os = "linux"))]
fn bind_to_device(_socket: &socket2::Socket, _interface: &str) -> Result<(), SocketError> {
    Err(SocketError::NotImplemented)
}

/// IPv4 addresses configured on this host, sorted and deduplicated.
#[cfg(unix)]
pub fn local_ipv4_addrs() -> Vec<Ipv4Addr> {
    let mut addrs = Vec::new();
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: on success getifaddrs hands us a list that we free below.
    if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
        return addrs;
    }

    let mut cursor = ifap;
    while !cursor.is_null() {
        // SAFETY: cursor is a non-null node of the list returned above.
        let ifa = unsafe { &*cursor };
        if !ifa.ifa_addr.is_null() {
            // SAFETY: ifa_addr is non-null and its family tells us the layout.
            let family = i32::from(unsafe { (*ifa.ifa_addr).sa_family });
            if family == libc::AF_INET {
                // SAFETY: the family is AF_INET, so ifa_addr points to a sockaddr_in.
                let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
                addrs.push(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
            }
        }
        cursor = ifa.ifa_next;
    }

    // SAFETY: ifap came from getifaddrs and is freed exactly once.
    unsafe { libc::freeifaddrs(ifap) };

    addrs.sort();
    addrs.dedup();
    addrs
}

#[cfg(not(unix))]
pub fn local_ipv4_addrs() -> Vec<Ipv4Addr> {
    Vec::new()
}
