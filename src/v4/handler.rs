//! DHCPv4 server state machine
//!
//! Each inbound message is handled in two steps. The pool is consulted
//! according to the message type, producing a [`PoolOutcome`]; then the pure
//! [`decide`] table maps `(message type, outcome)` to a [`Decision`], which is
//! rendered into a reply. The only persistent state is the lease records
//! held by the [`LeasePool`].

use super::{
    message::{DhcpMessage, MessageType, Opcode},
    options::DhcpOption,
    pool::{Confirmation, LeasePool, PoolExhausted},
};
use crate::config::ServerConfig;
use std::{net::Ipv4Addr, time::Instant};
use tracing::{debug, info, warn};

const NAK_MESSAGE: &str = "requested address not available";

/// What the lease pool said about an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOutcome {
    Offered(Ipv4Addr),
    Exhausted,
    Confirmed(Ipv4Addr),
    Mismatch,
    Unknown,
    Released,
    NotConsulted,
}

/// Which reply, if any, goes back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Offer(Ipv4Addr),
    Ack(Ipv4Addr),
    Nak,
    InformAck,
    Silent,
}

/// The reply table. Every combination not listed is answered with silence.
pub fn decide(incoming: MessageType, outcome: PoolOutcome) -> Decision {
    match (incoming, outcome) {
        (MessageType::Discover, PoolOutcome::Offered(ip)) => Decision::Offer(ip),
        (MessageType::Discover, PoolOutcome::Exhausted) => Decision::Silent,
        (MessageType::Request, PoolOutcome::Confirmed(ip)) => Decision::Ack(ip),
        (MessageType::Request, PoolOutcome::Mismatch | PoolOutcome::Unknown) => Decision::Nak,
        (MessageType::Decline | MessageType::Release, PoolOutcome::Released) => Decision::Silent,
        (MessageType::Inform, PoolOutcome::NotConsulted) => Decision::InformAck,
        _ => Decision::Silent,
    }
}

pub struct DhcpV4Handler {
    config: ServerConfig,
    pool: LeasePool,
}

impl DhcpV4Handler {
    pub fn new(config: ServerConfig) -> Self {
        let pool = LeasePool::new(config.pool_start, config.pool_end, config.lease_duration());
        Self { config, pool }
    }

    pub fn pool(&self) -> &LeasePool {
        &self.pool
    }

    /// Processes one request to completion and returns the reply to send.
    pub fn handle(&mut self, request: &DhcpMessage, now: Instant) -> Option<DhcpMessage> {
        if request.op != Opcode::BootRequest {
            debug!("Ignoring BOOTREPLY from {}", request.chaddr);
            return None;
        }

        let reclaimed = self.pool.sweep(now);
        if reclaimed > 0 {
            debug!("Reclaimed {} expired lease(s)", reclaimed);
            for record in self.pool.records() {
                debug!("Lease {} -> {} is {:?}", record.hwaddr, record.ip, record.state);
            }
        }

        if let Some(server_id) = request.server_identifier() {
            if server_id != self.config.server_address {
                debug!(
                    "{} from {} addressed to server {}, ignoring",
                    request.message_type, request.chaddr, server_id
                );
                return None;
            }
        }

        let outcome = self.consult_pool(request, now);
        let decision = decide(request.message_type, outcome);
        debug!(
            "{} from {} (xid {:#010x}): {:?} -> {:?}",
            request.message_type, request.chaddr, request.xid, outcome, decision
        );
        self.render(request, decision)
    }

    fn consult_pool(&mut self, request: &DhcpMessage, now: Instant) -> PoolOutcome {
        let hwaddr = request.chaddr;
        match request.message_type {
            MessageType::Discover => {
                info!("DHCPDISCOVER from {}", hwaddr);
                match self.pool.offer(hwaddr, request.requested_ip(), now) {
                    Ok(ip) => PoolOutcome::Offered(ip),
                    Err(PoolExhausted) => {
                        warn!("Pool exhausted, no offer for {}", hwaddr);
                        PoolOutcome::Exhausted
                    }
                }
            }
            MessageType::Request => {
                let Some(ip) = requested_address(request) else {
                    warn!("DHCPREQUEST from {} without requested IP", hwaddr);
                    return PoolOutcome::Mismatch;
                };
                info!("DHCPREQUEST from {} for {}", hwaddr, ip);
                match self.pool.confirm(hwaddr, ip, now) {
                    Confirmation::Bound => PoolOutcome::Confirmed(ip),
                    Confirmation::Mismatch => PoolOutcome::Mismatch,
                    Confirmation::Unknown => PoolOutcome::Unknown,
                }
            }
            MessageType::Decline | MessageType::Release => {
                let kind = request.message_type;
                match self.pool.release(&hwaddr) {
                    Some(ip) => info!("{} from {}, {} returned to pool", kind, hwaddr, ip),
                    None => debug!("{} from {} with no active lease", kind, hwaddr),
                }
                PoolOutcome::Released
            }
            MessageType::Inform => {
                info!("DHCPINFORM from {} ({})", hwaddr, request.ciaddr);
                PoolOutcome::NotConsulted
            }
            MessageType::Offer | MessageType::Ack | MessageType::Nak => PoolOutcome::NotConsulted,
        }
    }

    fn render(&self, request: &DhcpMessage, decision: Decision) -> Option<DhcpMessage> {
        let server = self.config.server_address;
        let reply = match decision {
            Decision::Offer(ip) => {
                info!("DHCPOFFER {} to {}", ip, request.chaddr);
                let mut reply = request.reply(MessageType::Offer);
                reply.yiaddr = ip;
                reply.siaddr = server;
                reply.options = self.reply_options(true);
                reply
            }
            Decision::Ack(ip) => {
                info!("DHCPACK {} to {}", ip, request.chaddr);
                let mut reply = request.reply(MessageType::Ack);
                reply.ciaddr = request.ciaddr;
                reply.yiaddr = ip;
                reply.siaddr = server;
                reply.options = self.reply_options(true);
                reply
            }
            Decision::Nak => {
                info!("DHCPNAK to {}", request.chaddr);
                let mut reply = request.reply(MessageType::Nak);
                reply.options = vec![
                    DhcpOption::ServerIdentifier(server),
                    DhcpOption::Message(NAK_MESSAGE.to_string()),
                ];
                reply
            }
            Decision::InformAck => {
                info!("DHCPACK (inform) to {} at {}", request.chaddr, request.ciaddr);
                let mut reply = request.reply(MessageType::Ack);
                reply.ciaddr = request.ciaddr;
                reply.siaddr = server;
                reply.options = self.reply_options(false);
                reply
            }
            Decision::Silent => return None,
        };
        Some(reply)
    }

    /// Options carried by OFFER and ACK; INFORM replies omit the lease time.
    fn reply_options(&self, with_lease: bool) -> Vec<DhcpOption> {
        let mut options = vec![DhcpOption::ServerIdentifier(self.config.server_address)];
        if with_lease {
            options.push(DhcpOption::AddressLeaseTime(self.config.lease_seconds));
        }
        options.push(DhcpOption::SubnetMask(self.config.subnet_mask));
        if let Some(router) = self.config.router {
            options.push(DhcpOption::Router(vec![router]));
        }
        if !self.config.dns.is_empty() {
            options.push(DhcpOption::DomainNameServer(self.config.dns.clone()));
        }
        options
    }
}

/// The address a REQUEST asks for: option 50, or `ciaddr` when renewing.
fn requested_address(request: &DhcpMessage) -> Option<Ipv4Addr> {
    request
        .requested_ip()
        .or_else(|| (!request.ciaddr.is_unspecified()).then_some(request.ciaddr))
}
