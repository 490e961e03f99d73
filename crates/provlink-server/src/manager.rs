//! Connectivity state machine.
//!
//! The orchestrator of the subsystem: owns the station and access-point
//! radio interfaces, loads credentials at boot, drives connect attempts
//! with retry and backoff, monitors link health, and starts/stops the
//! DNS and HTTP provisioning services around AP mode.
//!
//! The machine's state is mutated only by its own transition logic.
//! External callers hold a [`ConnectivityHandle`] whose `connect` and
//! `disconnect` write a requested state into the shared cell; every wait
//! loop inside the machine re-checks that cell and abandons its wait when
//! it was redirected, rather than overwriting state monotonically.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use provlink_core::{
    AccessPointInterface, ConnectivityState, CredentialStore, Credentials, DeviceControl,
    NetConfig, StationInterface,
};

use crate::dns_server::DnsHijackServer;
use crate::portal;
use crate::web_server::ProvisioningServer;

/// Errors surfaced by state handlers. They are caught at the loop
/// boundary and treated as transient; the supervisor never terminates.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    /// A provisioning service failed to start.
    #[error("service error: {0}")]
    Service(#[from] std::io::Error),
}

/// State shared between the machine and its handles.
#[derive(Debug)]
struct Shared {
    state: ConnectivityState,
    target: Option<Credentials>,
    retry_count: u32,
    address: Option<Ipv4Addr>,
}

/// Cloneable, non-blocking view of the state machine for the UI layer.
#[derive(Clone)]
pub struct ConnectivityHandle {
    shared: Arc<Mutex<Shared>>,
    store: Arc<dyn CredentialStore>,
    device: Arc<dyn DeviceControl>,
}

impl ConnectivityHandle {
    /// Request a (re)connect with the given credentials, from any state.
    pub fn connect(&self, ssid: &str, password: &str) {
        let mut shared = lock(&self.shared);
        shared.target = Some(Credentials::new(ssid, password));
        shared.retry_count = 0;
        shared.state = ConnectivityState::Connecting;
    }

    /// Request a disconnect. The machine drops the station link and stops
    /// any provisioning services on its next tick. Idempotent.
    pub fn disconnect(&self) {
        let mut shared = lock(&self.shared);
        shared.state = ConnectivityState::Idle;
        shared.retry_count = 0;
    }

    /// Current state, non-blocking.
    pub fn status(&self) -> ConnectivityState {
        lock(&self.shared).state
    }

    /// Address of the active interface, or `None` when unset.
    pub fn current_address(&self) -> Option<Ipv4Addr> {
        lock(&self.shared).address
    }

    /// Erase persisted credentials and restart into provisioning mode.
    /// Returns whether a record existed.
    pub fn factory_reset(&self) -> bool {
        let existed = self.store.erase();
        info!("factory reset requested (record existed: {})", existed);
        self.device.restart();
        existed
    }
}

/// The connectivity state machine. Construct with [`new`](Self::new),
/// grab a [`handle`](Self::handle), then drive it with [`run`](Self::run).
pub struct ConnectivityManager {
    config: NetConfig,
    station: Box<dyn StationInterface>,
    ap: Box<dyn AccessPointInterface>,
    store: Arc<dyn CredentialStore>,
    device: Arc<dyn DeviceControl>,
    dns: DnsHijackServer,
    web: ProvisioningServer,
    shared: Arc<Mutex<Shared>>,
}

impl ConnectivityManager {
    /// Wire up the subsystem: radios, credential store, device control,
    /// and the captive-portal services (kept stopped until AP mode).
    pub fn new(
        config: NetConfig,
        station: Box<dyn StationInterface>,
        ap: Box<dyn AccessPointInterface>,
        store: Arc<dyn CredentialStore>,
        device: Arc<dyn DeviceControl>,
    ) -> Self {
        let dns = DnsHijackServer::new(config.dns_port, config.dns_ttl_secs, config.dns_poll_tick);

        let mut web = ProvisioningServer::new();
        portal::register_routes(&mut web, store.clone(), device.clone(), config.restart_delay);

        let shared = Arc::new(Mutex::new(Shared {
            state: ConnectivityState::Idle,
            target: None,
            retry_count: 0,
            address: None,
        }));

        Self {
            config,
            station,
            ap,
            store,
            device,
            dns,
            web,
            shared,
        }
    }

    /// Get a handle for status queries and connect/disconnect requests.
    pub fn handle(&self) -> ConnectivityHandle {
        ConnectivityHandle {
            shared: self.shared.clone(),
            store: self.store.clone(),
            device: self.device.clone(),
        }
    }

    /// Run the state machine forever.
    ///
    /// Loads credentials once at boot (present: connect; absent: AP mode),
    /// then dispatches to the handler for the current state. Handler
    /// errors are logged and followed by a short sleep.
    pub async fn run(mut self) {
        info!("connectivity state machine started");
        self.load_and_connect();

        loop {
            let state = self.state();
            let result = match state {
                ConnectivityState::Idle => self.handle_idle().await,
                ConnectivityState::Connecting => self.handle_connecting().await,
                ConnectivityState::Connected => self.handle_connected().await,
                ConnectivityState::Failed => self.handle_failed().await,
                ConnectivityState::ApMode => self.handle_ap_mode().await,
            };
            if let Err(err) = result {
                error!("state machine error in {:?}: {}", state, err);
                sleep(Duration::from_secs(5)).await;
            }
            sleep(self.config.loop_tick).await;
        }
    }

    fn state(&self) -> ConnectivityState {
        lock(&self.shared).state
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    /// Boot-time credential load.
    fn load_and_connect(&mut self) {
        match self.store.load() {
            Some(credentials) => {
                info!("found saved credentials for '{}', connecting", credentials.ssid);
                let mut shared = self.shared();
                shared.target = Some(credentials);
                shared.retry_count = 0;
                shared.state = ConnectivityState::Connecting;
            }
            None => {
                info!("no saved credentials, entering provisioning (AP) mode");
                self.shared().state = ConnectivityState::ApMode;
            }
        }
    }

    async fn handle_idle(&mut self) -> Result<(), ConnectivityError> {
        // Idempotent teardown: a second disconnect() finds nothing to do.
        if self.station.is_linked() {
            self.station.disconnect();
        }
        self.stop_ap_services();
        self.shared().address = None;
        sleep(Duration::from_secs(1)).await;
        Ok(())
    }

    async fn handle_connecting(&mut self) -> Result<(), ConnectivityError> {
        self.stop_ap_services();

        let target = self.shared().target.clone();
        let Some(credentials) = target else {
            warn!("connect requested without credentials, returning to idle");
            self.shared().state = ConnectivityState::Idle;
            return Ok(());
        };

        let attempt = self.shared().retry_count + 1;
        info!(
            "connecting to '{}' (attempt {}/{})",
            credentials.ssid, attempt, self.config.max_retries
        );
        self.station.set_active(true);
        self.station.connect(&credentials.ssid, &credentials.password);

        let deadline = Instant::now() + self.config.connect_timeout;
        while Instant::now() < deadline {
            if self.redirected_away_from(&credentials) {
                return Ok(());
            }

            // Link-up and explicit rejection race; first observed wins.
            if self.station.is_linked() {
                let address = self.station.local_address();
                let mut shared = self.shared();
                shared.state = ConnectivityState::Connected;
                shared.retry_count = 0;
                shared.address = address;
                drop(shared);
                info!("connection established ({:?})", address);
                return Ok(());
            }
            let status = self.station.status();
            if status.is_rejection() {
                warn!("connection rejected: {:?}", status);
                break;
            }

            sleep(self.config.link_poll_interval).await;
        }

        if self.redirected_away_from(&credentials) {
            return Ok(());
        }

        let retry_count = {
            let mut shared = self.shared();
            shared.retry_count += 1;
            shared.retry_count
        };

        if retry_count >= self.config.max_retries {
            warn!("connection failed after {} attempts", retry_count);
            self.station.disconnect();
            self.shared().state = ConnectivityState::Failed;
        } else {
            self.station.disconnect();
            sleep(self.config.retry_delay).await;
        }
        Ok(())
    }

    async fn handle_connected(&mut self) -> Result<(), ConnectivityError> {
        if self.station.is_linked() {
            sleep(self.config.health_check_interval).await;
        } else {
            warn!("connection lost, reconnecting");
            self.station.disconnect();
            let mut shared = self.shared();
            shared.retry_count = 0;
            shared.address = None;
            shared.state = ConnectivityState::Connecting;
        }
        Ok(())
    }

    async fn handle_failed(&mut self) -> Result<(), ConnectivityError> {
        let deadline = Instant::now() + self.config.fail_recovery_delay;
        while Instant::now() < deadline {
            // Abort the recovery wait if an external request intervened.
            if self.state() != ConnectivityState::Failed {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }

        info!("failure recovery delay elapsed, retrying");
        let mut shared = self.shared();
        shared.retry_count = 0;
        shared.state = ConnectivityState::Connecting;
        Ok(())
    }

    async fn handle_ap_mode(&mut self) -> Result<(), ConnectivityError> {
        if !self.ap.is_active() {
            info!("enabling access point '{}'", self.config.ap.ssid);
            self.ap
                .configure(&self.config.ap.ssid, &self.config.ap.password);
            self.ap.set_active(true);

            while !self.ap.is_active() {
                if self.state() != ConnectivityState::ApMode {
                    return Ok(());
                }
                sleep(Duration::from_millis(100)).await;
            }

            let address = self.ap.local_address().unwrap_or(self.config.ap.address);
            self.shared().address = Some(address);
            info!("access point active at {}", address);

            self.dns.start(address).await?;
            self.web
                .start(SocketAddr::from((
                    Ipv4Addr::UNSPECIFIED,
                    self.config.http_port,
                )))
                .await?;
        }

        sleep(self.config.ap_idle_interval).await;
        Ok(())
    }

    /// Whether an external call changed the target or left `Connecting`.
    fn redirected_away_from(&self, credentials: &Credentials) -> bool {
        let shared = self.shared();
        shared.state != ConnectivityState::Connecting
            || shared.target.as_ref() != Some(credentials)
    }

    /// Stop the provisioning services and the AP radio. Idempotent.
    fn stop_ap_services(&mut self) {
        self.dns.stop();
        self.web.stop();
        if self.ap.is_active() {
            self.ap.set_active(false);
        }
    }
}

fn lock(shared: &Arc<Mutex<Shared>>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
