//! # provlink-core
//!
//! Core data model for the provlink connectivity subsystem.
//!
//! This crate provides:
//! - Connectivity state and credential types
//! - Timing and access-point configuration
//! - The credential store (trait + file-backed implementation)
//! - Collaborator traits for the radio interfaces and device control
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and embedded targets.

pub mod config;
pub mod radio;
pub mod store;
pub mod types;

pub use config::{ApConfig, NetConfig};
pub use radio::{AccessPointInterface, DeviceControl, StationInterface};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};
pub use types::{ConnectivityState, Credentials, StationStatus};
