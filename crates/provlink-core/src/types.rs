//! Connectivity data model types.
//!
//! These types are shared between the state machine, the captive-portal
//! services, and the UI layer that renders connectivity status.

use serde::{Deserialize, Serialize};

/// State of the connectivity state machine.
///
/// Exactly one value is active at any instant. The value is owned by the
/// state machine and mutated only by its own transition logic; external
/// callers request a connection or a disconnect, which schedules a
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectivityState {
    /// No connection and no provisioning services running.
    Idle,
    /// A connect attempt (or retry cycle) is in progress.
    Connecting,
    /// The station link is up and health-checked periodically.
    Connected,
    /// All retries exhausted; waiting out the recovery delay.
    Failed,
    /// Hosting the provisioning access point with DNS and HTTP services.
    ApMode,
}

/// WiFi credentials persisted by the credential store.
///
/// A single record: absent until first provisioning, overwritten (not
/// merged) on each save, erased on factory reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Network SSID.
    pub ssid: String,

    /// Network password (empty for open networks).
    pub password: String,
}

impl Credentials {
    /// Create a new credential pair.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

/// Link status reported by the station radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStatus {
    /// Association/authentication still in progress.
    Connecting,
    /// The access point rejected the connection.
    ConnectFail,
    /// No access point with the requested SSID was found.
    NoApFound,
    /// Authentication failed.
    WrongPassword,
    /// Anything else the driver reports.
    Other,
}

impl StationStatus {
    /// Whether this status is an explicit, unrecoverable rejection.
    ///
    /// A rejection short-circuits the connect wait and counts as a failed
    /// attempt immediately instead of waiting out the remaining timeout.
    pub fn is_rejection(self) -> bool {
        matches!(
            self,
            StationStatus::ConnectFail | StationStatus::NoApFound | StationStatus::WrongPassword
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rejection_statuses() {
        assert!(StationStatus::ConnectFail.is_rejection());
        assert!(StationStatus::NoApFound.is_rejection());
        assert!(StationStatus::WrongPassword.is_rejection());
        assert!(!StationStatus::Connecting.is_rejection());
        assert!(!StationStatus::Other.is_rejection());
    }

    #[test]
    fn test_credentials_serialize_shape() {
        let credentials = Credentials::new("MyNet", "secret");
        let json = serde_json::to_value(&credentials).unwrap();
        assert_eq!(json["ssid"], "MyNet");
        assert_eq!(json["password"], "secret");
    }
}
