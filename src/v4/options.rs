//! DHCPv4 options (RFC 2132)
//!
//! Options this server reads or writes get a typed variant. Everything else
//! is carried through as [`DhcpOption::Unknown`] so that nothing a client
//! sends is silently dropped by the codec.

use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

pub const OPT_PAD: u8 = 0;
pub const OPT_SUBNET_MASK: u8 = 1;
pub const OPT_ROUTER: u8 = 3;
pub const OPT_DNS_SERVER: u8 = 6;
pub const OPT_HOSTNAME: u8 = 12;
pub const OPT_REQUESTED_IP: u8 = 50;
pub const OPT_LEASE_TIME: u8 = 51;
pub const OPT_MESSAGE_TYPE: u8 = 53;
pub const OPT_SERVER_ID: u8 = 54;
pub const OPT_PARAM_REQUEST: u8 = 55;
pub const OPT_MESSAGE: u8 = 56;
pub const OPT_CLIENT_ID: u8 = 61;
pub const OPT_END: u8 = 255;

/// Largest payload a single option instance can carry on the wire.
const MAX_OPTION_LEN: usize = u8::MAX as usize;

/// A single entry from the options area, excluding pad, end and the
/// message type (which [`DhcpMessage`](super::DhcpMessage) holds directly).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DhcpOption {
    SubnetMask(Ipv4Addr),
    Router(Vec<Ipv4Addr>),
    DomainNameServer(Vec<Ipv4Addr>),
    Hostname(String),
    RequestedIpAddress(Ipv4Addr),
    AddressLeaseTime(u32),
    ServerIdentifier(Ipv4Addr),
    ParameterRequestList(Vec<u8>),
    Message(String),
    ClientIdentifier(Vec<u8>),
    Unknown { code: u8, data: Vec<u8> },
}

impl DhcpOption {
    pub fn code(&self) -> u8 {
        match self {
            DhcpOption::SubnetMask(_) => OPT_SUBNET_MASK,
            DhcpOption::Router(_) => OPT_ROUTER,
            DhcpOption::DomainNameServer(_) => OPT_DNS_SERVER,
            DhcpOption::Hostname(_) => OPT_HOSTNAME,
            DhcpOption::RequestedIpAddress(_) => OPT_REQUESTED_IP,
            DhcpOption::AddressLeaseTime(_) => OPT_LEASE_TIME,
            DhcpOption::ServerIdentifier(_) => OPT_SERVER_ID,
            DhcpOption::ParameterRequestList(_) => OPT_PARAM_REQUEST,
            DhcpOption::Message(_) => OPT_MESSAGE,
            DhcpOption::ClientIdentifier(_) => OPT_CLIENT_ID,
            DhcpOption::Unknown { code, .. } => *code,
        }
    }

    /// Builds the typed form of an option from its raw payload.
    ///
    /// A payload whose shape does not fit the typed variant (a 3-byte subnet
    /// mask, a hostname that is not UTF-8) is kept as `Unknown` so it still
    /// re-encodes byte for byte.
    pub fn from_raw(code: u8, data: &[u8]) -> Self {
        let typed = match code {
            OPT_SUBNET_MASK => ipv4(data).map(DhcpOption::SubnetMask),
            OPT_ROUTER => ipv4_list(data).map(DhcpOption::Router),
            OPT_DNS_SERVER => ipv4_list(data).map(DhcpOption::DomainNameServer),
            OPT_HOSTNAME => utf8(data).map(DhcpOption::Hostname),
            OPT_REQUESTED_IP => ipv4(data).map(DhcpOption::RequestedIpAddress),
            OPT_LEASE_TIME => data
                .try_into()
                .ok()
                .map(|be: [u8; 4]| DhcpOption::AddressLeaseTime(u32::from_be_bytes(be))),
            OPT_SERVER_ID => ipv4(data).map(DhcpOption::ServerIdentifier),
            OPT_PARAM_REQUEST => Some(DhcpOption::ParameterRequestList(data.to_vec())),
            OPT_MESSAGE => utf8(data).map(DhcpOption::Message),
            OPT_CLIENT_ID => Some(DhcpOption::ClientIdentifier(data.to_vec())),
            _ => None,
        };
        typed.unwrap_or_else(|| DhcpOption::Unknown {
            code,
            data: data.to_vec(),
        })
    }

    /// Raw payload bytes, without the tag and length.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            DhcpOption::SubnetMask(ip)
            | DhcpOption::RequestedIpAddress(ip)
            | DhcpOption::ServerIdentifier(ip) => ip.octets().to_vec(),
            DhcpOption::Router(ips) | DhcpOption::DomainNameServer(ips) => {
                ips.iter().flat_map(|ip| ip.octets()).collect()
            }
            DhcpOption::Hostname(s) | DhcpOption::Message(s) => s.as_bytes().to_vec(),
            DhcpOption::AddressLeaseTime(secs) => secs.to_be_bytes().to_vec(),
            DhcpOption::ParameterRequestList(codes) => codes.clone(),
            DhcpOption::ClientIdentifier(id) => id.clone(),
            DhcpOption::Unknown { data, .. } => data.clone(),
        }
    }

    /// Appends the tag-length-value encoding of this option.
    ///
    /// Payloads longer than 255 bytes are split into consecutive instances
    /// of the same tag (RFC 3396). An `Unknown` carrying pad, end or the
    /// message type tag writes nothing, since the decoder would read it as
    /// framing rather than as an option.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        let code = self.code();
        if matches!(self, DhcpOption::Unknown { .. }) && is_reserved(code) {
            return;
        }
        let payload = self.payload();
        if payload.is_empty() {
            buf.put_u8(code);
            buf.put_u8(0);
            return;
        }
        for chunk in payload.chunks(MAX_OPTION_LEN) {
            buf.put_u8(code);
            buf.put_u8(chunk.len() as u8);
            buf.put_slice(chunk);
        }
    }
}

/// Tags the codec handles itself and never passes through as options.
pub fn is_reserved(code: u8) -> bool {
    matches!(code, OPT_PAD | OPT_MESSAGE_TYPE | OPT_END)
}

fn ipv4(data: &[u8]) -> Option<Ipv4Addr> {
    let octets: [u8; 4] = data.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

fn ipv4_list(data: &[u8]) -> Option<Vec<Ipv4Addr>> {
    if data.len() % 4 != 0 {
        return None;
    }
    data.chunks_exact(4).map(ipv4).collect()
}

fn utf8(data: &[u8]) -> Option<String> {
    String::from_utf8(data.to_vec()).ok()
}
