//! Connectivity configuration.
//!
//! All timing constants of the state machine and the provisioning services
//! are configurable; the defaults match the device firmware behavior.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Access-point settings used while provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApConfig {
    /// SSID of the temporary provisioning network.
    pub ssid: String,

    /// Password of the temporary provisioning network.
    pub password: String,

    /// Address the device assigns itself in AP mode. All hijacked DNS
    /// queries resolve to this address.
    pub address: Ipv4Addr,
}

impl Default for ApConfig {
    fn default() -> Self {
        Self {
            ssid: "Provlink-Setup".to_string(),
            password: "provision123".to_string(),
            address: Ipv4Addr::new(192, 168, 4, 1),
        }
    }
}

/// Timing and service configuration for the connectivity subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConfig {
    /// Connection attempts before entering the failed state.
    pub max_retries: u32,

    /// Bounded wait per connection attempt.
    pub connect_timeout: Duration,

    /// Delay between retries within the connecting state.
    pub retry_delay: Duration,

    /// Wait in the failed state before auto-recovery retries.
    pub fail_recovery_delay: Duration,

    /// Link health-check interval while connected.
    pub health_check_interval: Duration,

    /// Poll interval for link status during a connect attempt.
    pub link_poll_interval: Duration,

    /// Idle tick while the access point is up and services are running.
    pub ap_idle_interval: Duration,

    /// Sleep between state machine loop iterations.
    pub loop_tick: Duration,

    /// Yield interval of the DNS responder when no datagram is pending.
    pub dns_poll_tick: Duration,

    /// TTL of synthesized DNS answers, in seconds.
    pub dns_ttl_secs: u32,

    /// UDP port of the DNS hijack responder.
    pub dns_port: u16,

    /// TCP port of the provisioning HTTP server.
    pub http_port: u16,

    /// Delay between a successful provisioning response and the device
    /// restart, so the HTTP response can flush.
    pub restart_delay: Duration,

    /// Access-point settings.
    pub ap: ApConfig,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            connect_timeout: Duration::from_secs(15),
            retry_delay: Duration::from_secs(2),
            fail_recovery_delay: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(2),
            link_poll_interval: Duration::from_millis(500),
            ap_idle_interval: Duration::from_secs(2),
            loop_tick: Duration::from_millis(100),
            dns_poll_tick: Duration::from_millis(100),
            dns_ttl_secs: 60,
            dns_port: 53,
            http_port: 80,
            restart_delay: Duration::from_secs(3),
            ap: ApConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_timing_constants() {
        let config = NetConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.retry_delay, Duration::from_secs(2));
        assert_eq!(config.fail_recovery_delay, Duration::from_secs(30));
        assert_eq!(config.health_check_interval, Duration::from_secs(2));
        assert_eq!(config.dns_poll_tick, Duration::from_millis(100));
        assert_eq!(config.dns_port, 53);
        assert_eq!(config.http_port, 80);
    }

    #[test]
    fn test_config_round_trip() {
        let config = NetConfig {
            http_port: 8080,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let loaded: NetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.http_port, 8080);
        assert_eq!(loaded.ap.address, Ipv4Addr::new(192, 168, 4, 1));
    }
}
