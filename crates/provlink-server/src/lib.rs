//! # provlink-server
//!
//! Connectivity state machine and captive-portal services:
//! - [`ConnectivityManager`] - owns the radios, drives connect/retry/health
//!   policy, and supervises the provisioning services
//! - [`DnsHijackServer`] - UDP responder redirecting every query to the
//!   device's address
//! - [`ProvisioningServer`] - minimal HTTP server serving the provisioning
//!   page and accepting submitted credentials

pub mod dns_server;
pub mod manager;
pub mod portal;
pub mod web_server;

pub use dns_server::DnsHijackServer;
pub use manager::{ConnectivityHandle, ConnectivityManager};
pub use web_server::{ProvisioningServer, RouteHandler};

pub use provlink_core::{ConnectivityState, Credentials, NetConfig};
