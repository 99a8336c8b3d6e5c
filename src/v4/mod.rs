//! DHCPv4 protocol implementation
//!
//! This module contains the DHCPv4-specific implementation including:
//! - Packet encoding and decoding
//! - Typed options
//! - The lease pool
//! - The server state machine

pub mod handler;
pub mod message;
pub mod options;
pub mod pool;


pub use handler::{decide, Decision, DhcpV4Handler, PoolOutcome};
pub use message::{
    decode, encode, DecodeError, DhcpMessage, Flags, HardwareAddr, MessageType, Opcode,
};
pub use options::DhcpOption;
pub use pool::{Confirmation, LeasePool, LeaseRecord, LeaseState, PoolExhausted};
