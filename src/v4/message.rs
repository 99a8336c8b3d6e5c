//! BOOTP/DHCPv4 packet codec (RFC 951, RFC 2131)
//!
//! Wire layout of the fixed section, all multi-byte integers big-endian:
//!
//! ```text
//! op(1) htype(1) hlen(1) hops(1) xid(4) secs(2) flags(2)
//! ciaddr(4) yiaddr(4) siaddr(4) giaddr(4) chaddr(16) sname(64) file(128)
//! ```
//!
//! followed by the magic cookie and the options area.

use super::options::{
    DhcpOption, OPT_END, OPT_MESSAGE_TYPE, OPT_PAD, OPT_REQUESTED_IP, OPT_SERVER_ID,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{fmt, net::Ipv4Addr};
use thiserror::Error;

pub const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

/// Size of the BOOTP fixed section, up to but excluding the cookie.
pub const FIXED_HEADER_LEN: usize = 236;

/// Legacy BOOTP minimum message size; shorter replies are padded.
pub const MIN_PACKET_LEN: usize = 300;

pub const HTYPE_ETHERNET: u8 = 1;

const CHADDR_FIELD_LEN: usize = 16;
const SNAME_LEN: usize = 64;
const FILE_LEN: usize = 128;
const BROADCAST_FLAG: u16 = 0x8000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Packet truncated")]
    Truncated,

    #[error("Missing or invalid DHCP magic cookie")]
    NotDhcp,

    #[error("Unsupported hardware address length {0}")]
    HardwareAddressLength(u8),

    #[error("Invalid BOOTP opcode {0}")]
    InvalidOpcode(u8),

    #[error("No DHCP message type option")]
    MissingMessageType,

    #[error("Invalid DHCP message type option")]
    InvalidMessageType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    BootRequest = 1,
    BootReply = 2,
}

impl TryFrom<u8> for Opcode {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Opcode::BootRequest),
            2 => Ok(Opcode::BootReply),
            other => Err(DecodeError::InvalidOpcode(other)),
        }
    }
}

/// Value of option 53.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => MessageType::Discover,
            2 => MessageType::Offer,
            3 => MessageType::Request,
            4 => MessageType::Decline,
            5 => MessageType::Ack,
            6 => MessageType::Nak,
            7 => MessageType::Release,
            8 => MessageType::Inform,
            _ => return Err(DecodeError::InvalidMessageType),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Discover => "DHCPDISCOVER",
            MessageType::Offer => "DHCPOFFER",
            MessageType::Request => "DHCPREQUEST",
            MessageType::Decline => "DHCPDECLINE",
            MessageType::Ack => "DHCPACK",
            MessageType::Nak => "DHCPNAK",
            MessageType::Release => "DHCPRELEASE",
            MessageType::Inform => "DHCPINFORM",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u16);

impl Flags {
    pub fn new(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn broadcast(self) -> bool {
        self.0 & BROADCAST_FLAG != 0
    }

    pub fn set_broadcast(self) -> Self {
        Self(self.0 | BROADCAST_FLAG)
    }
}

/// An Ethernet (EUI-48) client hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareAddr([u8; 6]);

impl HardwareAddr {
    pub const LEN: usize = 6;

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for HardwareAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// A decoded DHCP message.
///
/// The message type lives in [`DhcpMessage::message_type`] rather than in
/// `options`; the encoder always emits it as the first option. `sname` and
/// `file` are not retained and encode as zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpMessage {
    pub op: Opcode,
    pub htype: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: Flags,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: HardwareAddr,
    pub message_type: MessageType,
    pub options: Vec<DhcpOption>,
}

impl DhcpMessage {
    /// A message with every address zeroed and no options beyond the type.
    pub fn new(op: Opcode, message_type: MessageType, xid: u32, chaddr: HardwareAddr) -> Self {
        Self {
            op,
            htype: HTYPE_ETHERNET,
            hops: 0,
            xid,
            secs: 0,
            flags: Flags::default(),
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            message_type,
            options: Vec::new(),
        }
    }

    /// Starts a BOOTREPLY that echoes this request's correlators
    /// (`xid`, `chaddr`, `flags`, `giaddr`, `htype`).
    pub fn reply(&self, message_type: MessageType) -> Self {
        Self {
            htype: self.htype,
            flags: self.flags,
            giaddr: self.giaddr,
            ..Self::new(Opcode::BootReply, message_type, self.xid, self.chaddr)
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < FIXED_HEADER_LEN {
            return Err(DecodeError::Truncated);
        }
        if data.len() < FIXED_HEADER_LEN + MAGIC_COOKIE.len()
            || data[FIXED_HEADER_LEN..FIXED_HEADER_LEN + MAGIC_COOKIE.len()] != MAGIC_COOKIE
        {
            return Err(DecodeError::NotDhcp);
        }

        let mut buf = data;
        let op = Opcode::try_from(buf.get_u8())?;
        let htype = buf.get_u8();
        let hlen = buf.get_u8();
        if hlen as usize != HardwareAddr::LEN {
            return Err(DecodeError::HardwareAddressLength(hlen));
        }
        let hops = buf.get_u8();
        let xid = buf.get_u32();
        let secs = buf.get_u16();
        let flags = Flags(buf.get_u16());
        let ciaddr = Ipv4Addr::from(buf.get_u32());
        let yiaddr = Ipv4Addr::from(buf.get_u32());
        let siaddr = Ipv4Addr::from(buf.get_u32());
        let giaddr = Ipv4Addr::from(buf.get_u32());
        let mut chaddr = [0u8; HardwareAddr::LEN];
        buf.copy_to_slice(&mut chaddr);
        buf.advance(CHADDR_FIELD_LEN - HardwareAddr::LEN + SNAME_LEN + FILE_LEN);
        buf.advance(MAGIC_COOKIE.len());

        let mut message_type = None;
        let mut raw: Vec<(u8, Vec<u8>)> = Vec::new();
        while buf.has_remaining() {
            let code = buf.get_u8();
            match code {
                OPT_PAD => continue,
                OPT_END => break,
                _ => {}
            }
            if !buf.has_remaining() {
                return Err(DecodeError::Truncated);
            }
            let len = buf.get_u8() as usize;
            if buf.remaining() < len {
                return Err(DecodeError::Truncated);
            }
            let payload = &buf[..len];
            buf.advance(len);

            if code == OPT_MESSAGE_TYPE {
                // The first occurrence wins; later duplicates are dropped.
                if message_type.is_none() {
                    let [value] = payload else {
                        return Err(DecodeError::InvalidMessageType);
                    };
                    message_type = Some(MessageType::try_from(*value)?);
                }
                continue;
            }
            // Consecutive instances of a tag are one long option (RFC 3396).
            match raw.last_mut() {
                Some((last, data)) if *last == code => data.extend_from_slice(payload),
                _ => raw.push((code, payload.to_vec())),
            }
        }
        let options = raw
            .iter()
            .map(|(code, data)| DhcpOption::from_raw(*code, data))
            .collect();

        Ok(Self {
            op,
            htype,
            hops,
            xid,
            secs,
            flags,
            ciaddr,
            yiaddr,
            siaddr,
            giaddr,
            chaddr: HardwareAddr(chaddr),
            message_type: message_type.ok_or(DecodeError::MissingMessageType)?,
            options,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MIN_PACKET_LEN);
        buf.put_u8(self.op as u8);
        buf.put_u8(self.htype);
        buf.put_u8(HardwareAddr::LEN as u8);
        buf.put_u8(self.hops);
        buf.put_u32(self.xid);
        buf.put_u16(self.secs);
        buf.put_u16(self.flags.bits());
        buf.put_slice(&self.ciaddr.octets());
        buf.put_slice(&self.yiaddr.octets());
        buf.put_slice(&self.siaddr.octets());
        buf.put_slice(&self.giaddr.octets());
        buf.put_slice(&self.chaddr.octets());
        buf.put_bytes(0, CHADDR_FIELD_LEN - HardwareAddr::LEN + SNAME_LEN + FILE_LEN);
        buf.put_slice(&MAGIC_COOKIE);

        buf.put_u8(OPT_MESSAGE_TYPE);
        buf.put_u8(1);
        buf.put_u8(self.message_type as u8);
        for option in &self.options {
            option.encode_into(&mut buf);
        }
        buf.put_u8(OPT_END);

        if buf.len() < MIN_PACKET_LEN {
            let pad = MIN_PACKET_LEN - buf.len();
            buf.put_bytes(OPT_PAD, pad);
        }
        buf.freeze()
    }

    /// First option carrying `code`.
    pub fn option(&self, code: u8) -> Option<&DhcpOption> {
        self.options.iter().find(|o| o.code() == code)
    }

    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        match self.option(OPT_REQUESTED_IP)? {
            DhcpOption::RequestedIpAddress(ip) => Some(*ip),
            _ => None,
        }
    }

    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        match self.option(OPT_SERVER_ID)? {
            DhcpOption::ServerIdentifier(ip) => Some(*ip),
            _ => None,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.flags.broadcast()
    }
}

pub fn decode(data: &[u8]) -> Result<DhcpMessage, DecodeError> {
    DhcpMessage::decode(data)
}

pub fn encode(message: &DhcpMessage) -> Bytes {
    message.encode()
}
