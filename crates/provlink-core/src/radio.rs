//! Collaborator traits for the radio interfaces and device control.
//!
//! The connectivity state machine owns one station interface and one
//! access-point interface and is the only component that drives them.
//! All methods are synchronous so implementations can wrap either an
//! embedded HAL or a hosted simulator; waiting and polling cadence are
//! the state machine's responsibility.

use std::net::Ipv4Addr;

use crate::types::StationStatus;

/// Radio in station role: joins an existing wireless network as a client.
pub trait StationInterface: Send {
    /// Power the station interface up or down.
    fn set_active(&mut self, active: bool);

    /// Begin a connection attempt. Completion is observed through
    /// [`is_linked`](Self::is_linked) and [`status`](Self::status).
    fn connect(&mut self, ssid: &str, password: &str);

    /// Drop the current link, if any.
    fn disconnect(&mut self);

    /// Whether the link is established.
    fn is_linked(&self) -> bool;

    /// Driver status of the current or last attempt.
    fn status(&self) -> StationStatus;

    /// Assigned address once linked.
    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Radio in access-point role: the device hosts a local wireless network.
pub trait AccessPointInterface: Send {
    /// Set the SSID and password of the hosted network.
    fn configure(&mut self, ssid: &str, password: &str);

    /// Bring the access point up or down.
    fn set_active(&mut self, active: bool);

    /// Whether the access point reports active.
    fn is_active(&self) -> bool;

    /// Address of the access-point interface.
    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Device-level control used by the provisioning flow.
pub trait DeviceControl: Send + Sync {
    /// Restart the device. Called after credentials are provisioned (so
    /// the state machine boots into station mode) and on factory reset.
    fn restart(&self);
}
