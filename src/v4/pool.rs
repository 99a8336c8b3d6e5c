//! In-memory lease pool
//!
//! Tracks a contiguous address range and the lease record of every hardware
//! address seen. An address is owned by at most one hardware address whose
//! record is `Offered` or `Bound`; `Free` records only remember history and
//! are evicted as soon as their address is handed to someone else.

use super::message::HardwareAddr;
use std::{
    collections::HashMap,
    net::Ipv4Addr,
    time::{Duration, Instant},
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Free,
    Offered,
    Bound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    pub hwaddr: HardwareAddr,
    pub ip: Ipv4Addr,
    pub state: LeaseState,
    pub expires_at: Instant,
}

impl LeaseRecord {
    fn is_active(&self) -> bool {
        self.state != LeaseState::Free
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No available IP addresses in pool")]
pub struct PoolExhausted;

/// Outcome of [`LeasePool::confirm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Bound,
    /// A record exists but for a different address.
    Mismatch,
    /// No outstanding offer or lease for this hardware address.
    Unknown,
}

pub struct LeasePool {
    start: u32,
    end: u32,
    lease_duration: Duration,
    records: HashMap<HardwareAddr, LeaseRecord>,
}

impl LeasePool {
    /// Creates a pool over `[start, end]`. Callers validate `start <= end`;
    /// an inverted range simply has no addresses.
    pub fn new(start: Ipv4Addr, end: Ipv4Addr, lease_duration: Duration) -> Self {
        Self {
            start: u32::from(start),
            end: u32::from(end),
            lease_duration,
            records: HashMap::new(),
        }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (self.start..=self.end).contains(&u32::from(ip))
    }

    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    pub fn record(&self, hwaddr: &HardwareAddr) -> Option<&LeaseRecord> {
        self.records.get(hwaddr)
    }

    pub fn records(&self) -> impl Iterator<Item = &LeaseRecord> {
        self.records.values()
    }

    /// Reserves an address for `hwaddr`.
    ///
    /// Repeated calls without an intervening release return the same address.
    /// A fresh allocation prefers `requested` when it is in range and unowned,
    /// then the lowest free address.
    pub fn offer(
        &mut self,
        hwaddr: HardwareAddr,
        requested: Option<Ipv4Addr>,
        now: Instant,
    ) -> Result<Ipv4Addr, PoolExhausted> {
        if let Some(record) = self.records.get_mut(&hwaddr) {
            match record.state {
                LeaseState::Offered => {
                    record.expires_at = now + self.lease_duration;
                    return Ok(record.ip);
                }
                LeaseState::Bound => return Ok(record.ip),
                LeaseState::Free => {}
            }
        }

        let ip = requested
            .filter(|ip| self.contains(*ip) && self.owner(*ip).is_none())
            .or_else(|| self.first_free())
            .ok_or(PoolExhausted)?;

        // Drop stale history for this address held under another hardware address.
        self.records.retain(|owner, record| *owner == hwaddr || record.ip != ip);
        self.records.insert(
            hwaddr,
            LeaseRecord {
                hwaddr,
                ip,
                state: LeaseState::Offered,
                expires_at: now + self.lease_duration,
            },
        );
        Ok(ip)
    }

    /// Commits an outstanding offer (or renews a lease) for `ip`.
    pub fn confirm(&mut self, hwaddr: HardwareAddr, ip: Ipv4Addr, now: Instant) -> Confirmation {
        let Some(record) = self.records.get_mut(&hwaddr) else {
            return Confirmation::Unknown;
        };
        if !record.is_active() {
            return Confirmation::Unknown;
        }
        if record.ip != ip {
            return Confirmation::Mismatch;
        }
        record.state = LeaseState::Bound;
        record.expires_at = now + self.lease_duration;
        Confirmation::Bound
    }

    /// Returns the address of `hwaddr` to the pool. No-op for unknown clients.
    pub fn release(&mut self, hwaddr: &HardwareAddr) -> Option<Ipv4Addr> {
        let record = self.records.get_mut(hwaddr)?;
        let was_active = record.is_active();
        record.state = LeaseState::Free;
        was_active.then_some(record.ip)
    }

    /// Frees every offer or lease that expired at or before `now`.
    /// Returns how many records were reclaimed.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let mut reclaimed = 0;
        for record in self.records.values_mut() {
            if record.is_active() && record.expires_at <= now {
                record.state = LeaseState::Free;
                reclaimed += 1;
            }
        }
        reclaimed
    }

    fn owner(&self, ip: Ipv4Addr) -> Option<HardwareAddr> {
        self.records
            .values()
            .find(|r| r.is_active() && r.ip == ip)
            .map(|r| r.hwaddr)
    }

    fn first_free(&self) -> Option<Ipv4Addr> {
        (self.start..=self.end)
            .map(Ipv4Addr::from)
            .find(|ip| self.owner(*ip).is_none())
    }
}
