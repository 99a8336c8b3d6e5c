//! # ipmi-dhcpd - A Single-Lease DHCPv4 Responder
//!
//! ipmi-dhcpd hands one IP lease to one directly-connected device, such as a
//! server's IPMI/BMC port on a point-to-point Ethernet link. It answers the
//! DORA (Discover, Offer, Request, Acknowledge) exchange from a small,
//! in-memory address pool.
//!
//! ## Features
//!
//! - BOOTP/DHCPv4 packet codec with typed options
//! - Lease pool with lazy expiry and idempotent offers
//! - Table-driven server state machine
//! - Single-task receive loop on Tokio
//!
//! ## Example
//!
//! ```rust,no_run
//! use ipmi_dhcpd::ServerConfig;
//! use std::net::Ipv4Addr;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new(
//!         Ipv4Addr::new(192, 168, 50, 1),
//!         Ipv4Addr::new(192, 168, 50, 10),
//!         Ipv4Addr::new(192, 168, 50, 10),
//!     );
//!     ipmi_dhcpd::run(config).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod network;
pub mod server;
pub mod v4;

pub use config::{Args, ConfigError, ServerConfig};
pub use error::ServerError;
pub use server::{run, DhcpServer};
